//! Adapters for the hosted backend: table API, object storage and auth.

mod auth;
mod categories;
mod posts;
mod profiles;
mod storage;
mod util;

pub use auth::HostedIdentityProvider;
pub use storage::HostedImageStore;
pub use util::{map_transport_error, parse_content_range_total};

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::config::BackendSettings;
use crate::infra::error::InfraError;

const APIKEY_HEADER: HeaderName = HeaderName::from_static("apikey");

/// Shared HTTP plumbing for every hosted service.
///
/// `service` carries the privileged key and is used for table and storage
/// calls; `public` carries only the anonymous key and is used for auth calls
/// made on behalf of a user.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    service: reqwest::Client,
    public: reqwest::Client,
    base: String,
}

impl BackendClient {
    pub fn new(settings: &BackendSettings) -> Result<Self, InfraError> {
        Self::from_parts(
            &settings.url,
            &settings.anon_key,
            &settings.service_key,
            settings.request_timeout,
        )
    }

    pub fn from_parts(
        url: &Url,
        anon_key: &str,
        service_key: &SecretString,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let service_key = service_key.expose_secret();

        let mut service_headers = HeaderMap::new();
        service_headers.insert(APIKEY_HEADER, header_value(service_key, "service key")?);
        service_headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {service_key}"), "service key")?,
        );

        let mut public_headers = HeaderMap::new();
        public_headers.insert(APIKEY_HEADER, header_value(anon_key, "anon key")?);

        let service = reqwest::Client::builder()
            .default_headers(service_headers)
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        let public = reqwest::Client::builder()
            .default_headers(public_headers)
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                service,
                public,
                base: url.as_str().trim_end_matches('/').to_string(),
            }),
        })
    }

    pub(crate) fn service(&self) -> &reqwest::Client {
        &self.inner.service
    }

    pub(crate) fn public(&self) -> &reqwest::Client {
        &self.inner.public
    }

    /// `{base}/{path}` where `path` has no leading slash.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}/{path}", self.inner.base))
    }

    pub(crate) fn table(&self, table: &str) -> Result<Url, url::ParseError> {
        self.endpoint(&format!("rest/v1/{table}"))
    }
}

/// Table adapters backed by the hosted data API.
#[derive(Clone)]
pub struct HostedRepositories {
    client: BackendClient,
}

impl HostedRepositories {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue, InfraError> {
    HeaderValue::from_str(value)
        .map_err(|err| InfraError::configuration(format!("invalid {what} header value: {err}")))
}
