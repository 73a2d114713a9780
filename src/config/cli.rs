use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the blogdeck binary.
#[derive(Debug, Parser)]
#[command(name = "blogdeck", version, about = "blogdeck blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "BLOGDECK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the hosted backend base URL.
    #[arg(long = "backend-url", value_name = "URL")]
    pub backend_url: Option<String>,

    /// Override the remote request timeout.
    #[arg(long = "backend-request-timeout-seconds", value_name = "SECONDS")]
    pub backend_request_timeout_seconds: Option<u64>,

    /// Override the storage bucket for post images.
    #[arg(long = "storage-bucket", value_name = "NAME")]
    pub storage_bucket: Option<String>,

    /// Override the public site URL used in share links and e-mails.
    #[arg(long = "site-public-url", value_name = "URL")]
    pub site_public_url: Option<String>,

    /// Override the home feed page size.
    #[arg(long = "site-home-page-size", value_name = "COUNT")]
    pub site_home_page_size: Option<u32>,

    /// Override the admin table page size.
    #[arg(long = "site-admin-page-size", value_name = "COUNT")]
    pub site_admin_page_size: Option<u32>,

    /// Mark session cookies as Secure.
    #[arg(
        long = "site-secure-cookies",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub site_secure_cookies: Option<bool>,

    /// Enable the query cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,
}
