//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "blogdeck";
const ENV_PREFIX: &str = "BLOGDECK";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_STORAGE_BUCKET: &str = "images";
const DEFAULT_STORAGE_PREFIX: &str = "posts";
const DEFAULT_MAIL_ENDPOINT: &str = "https://api.emailjs.com/api/v1.0/email/send";
const DEFAULT_HOME_PAGE_SIZE: u32 = 9;
const DEFAULT_ADMIN_PAGE_SIZE: u32 = 10;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 500;
const DEFAULT_AUTH_PROVIDER: &str = "google";
const DEFAULT_CACHE_LIST_CAPACITY: usize = 64;
const DEFAULT_CACHE_ENTRY_CAPACITY: usize = 256;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub backend: BackendSettings,
    pub storage: StorageSettings,
    /// `None` when outbound e-mail is not configured.
    pub mail: Option<MailSettings>,
    pub site: SiteSettings,
    pub auth: AuthSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub url: Url,
    /// Public project key, sent as `apikey` on auth calls.
    pub anon_key: String,
    /// Privileged key used for table and storage calls.
    pub service_key: SecretString,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub bucket: String,
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub endpoint: Url,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    pub private_key: Option<SecretString>,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub public_url: Url,
    pub home_page_size: NonZeroU32,
    pub admin_page_size: NonZeroU32,
    pub search_debounce: Duration,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub provider: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub list_capacity: usize,
    pub entry_capacity: usize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    backend: RawBackendSettings,
    storage: RawStorageSettings,
    mail: RawMailSettings,
    site: RawSiteSettings,
    auth: RawAuthSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.backend_url.as_ref() {
            self.backend.url = Some(url.clone());
        }
        if let Some(seconds) = overrides.backend_request_timeout_seconds {
            self.backend.request_timeout_seconds = Some(seconds);
        }
        if let Some(bucket) = overrides.storage_bucket.as_ref() {
            self.storage.bucket = Some(bucket.clone());
        }
        if let Some(url) = overrides.site_public_url.as_ref() {
            self.site.public_url = Some(url.clone());
        }
        if let Some(size) = overrides.site_home_page_size {
            self.site.home_page_size = Some(size);
        }
        if let Some(size) = overrides.site_admin_page_size {
            self.site.admin_page_size = Some(size);
        }
        if let Some(secure) = overrides.site_secure_cookies {
            self.site.secure_cookies = Some(secure);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            backend,
            storage,
            mail,
            site,
            auth,
            cache,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let backend = build_backend_settings(backend)?;
        let storage = build_storage_settings(storage)?;
        let mail = build_mail_settings(mail)?;
        let site = build_site_settings(site, &server)?;
        let auth = build_auth_settings(auth)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self {
            server,
            logging,
            backend,
            storage,
            mail,
            site,
            auth,
            cache,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_backend_settings(backend: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let url = required(backend.url, "backend.url")?;
    let url = parse_url(&url, "backend.url")?;
    let anon_key = required(backend.anon_key, "backend.anon_key")?;
    let service_key = required(backend.service_key, "backend.service_key")?;

    let timeout_secs = backend
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "backend.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(BackendSettings {
        url,
        anon_key,
        service_key: SecretString::from(service_key),
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let bucket = non_blank(storage.bucket).unwrap_or_else(|| DEFAULT_STORAGE_BUCKET.to_string());
    if bucket.contains('/') {
        return Err(LoadError::invalid(
            "storage.bucket",
            "bucket name must not contain `/`",
        ));
    }
    let prefix = storage
        .prefix
        .map(|prefix| prefix.trim().trim_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_STORAGE_PREFIX.to_string());

    Ok(StorageSettings { bucket, prefix })
}

fn build_mail_settings(mail: RawMailSettings) -> Result<Option<MailSettings>, LoadError> {
    let service_id = non_blank(mail.service_id);
    let template_id = non_blank(mail.template_id);
    let public_key = non_blank(mail.public_key);

    let (Some(service_id), Some(template_id), Some(public_key)) =
        (service_id, template_id, public_key)
    else {
        return Ok(None);
    };

    let endpoint = non_blank(mail.endpoint).unwrap_or_else(|| DEFAULT_MAIL_ENDPOINT.to_string());
    let endpoint = parse_url(&endpoint, "mail.endpoint")?;

    Ok(Some(MailSettings {
        endpoint,
        service_id,
        template_id,
        public_key,
        private_key: non_blank(mail.private_key).map(SecretString::from),
    }))
}

fn build_site_settings(
    site: RawSiteSettings,
    server: &ServerSettings,
) -> Result<SiteSettings, LoadError> {
    let public_url = match non_blank(site.public_url) {
        Some(url) => parse_url(&url, "site.public_url")?,
        None => parse_url(&format!("http://{}", server.addr), "site.public_url")?,
    };

    let home_page_size = non_zero_u32(
        site.home_page_size.unwrap_or(DEFAULT_HOME_PAGE_SIZE).into(),
        "site.home_page_size",
    )?;
    let admin_page_size = non_zero_u32(
        site.admin_page_size.unwrap_or(DEFAULT_ADMIN_PAGE_SIZE).into(),
        "site.admin_page_size",
    )?;

    let debounce_ms = site
        .search_debounce_ms
        .unwrap_or(DEFAULT_SEARCH_DEBOUNCE_MS);

    Ok(SiteSettings {
        public_url,
        home_page_size,
        admin_page_size,
        search_debounce: Duration::from_millis(debounce_ms),
        secure_cookies: site.secure_cookies.unwrap_or(false),
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let provider = non_blank(auth.provider).unwrap_or_else(|| DEFAULT_AUTH_PROVIDER.to_string());
    if !provider
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(LoadError::invalid(
            "auth.provider",
            format!("unsupported provider name `{provider}`"),
        ));
    }
    Ok(AuthSettings { provider })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let list_capacity = cache.list_capacity.unwrap_or(DEFAULT_CACHE_LIST_CAPACITY);
    if list_capacity == 0 {
        return Err(LoadError::invalid(
            "cache.list_capacity",
            "must be greater than zero",
        ));
    }
    let entry_capacity = cache.entry_capacity.unwrap_or(DEFAULT_CACHE_ENTRY_CAPACITY);
    if entry_capacity == 0 {
        return Err(LoadError::invalid(
            "cache.entry_capacity",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        list_capacity,
        entry_capacity,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackendSettings {
    url: Option<String>,
    anon_key: Option<String>,
    service_key: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    bucket: Option<String>,
    prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMailSettings {
    endpoint: Option<String>,
    service_id: Option<String>,
    template_id: Option<String>,
    public_key: Option<String>,
    private_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    public_url: Option<String>,
    home_page_size: Option<u32>,
    admin_page_size: Option<u32>,
    search_debounce_ms: Option<u64>,
    secure_cookies: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    list_capacity: Option<usize>,
    entry_capacity: Option<usize>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{value}`: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LoadError::invalid(
            key,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn required(value: Option<String>, key: &'static str) -> Result<String, LoadError> {
    non_blank(value).ok_or_else(|| LoadError::invalid(key, "value is required"))
}

#[cfg(test)]
mod tests;
