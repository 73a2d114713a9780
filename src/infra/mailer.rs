//! Transactional e-mail through a templated mail relay.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use url::Url;

use crate::application::gateways::{GatewayError, Mailer, PostNotificationEmail};
use crate::config::MailSettings;
use crate::infra::error::InfraError;

#[derive(Clone)]
pub struct EmailJsMailer {
    http: reqwest::Client,
    endpoint: Url,
    service_id: String,
    template_id: String,
    public_key: String,
    private_key: Option<SecretString>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: &'a PostNotificationEmail,
}

impl EmailJsMailer {
    pub fn new(settings: &MailSettings, timeout: Duration) -> Result<Self, InfraError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            service_id: settings.service_id.clone(),
            template_id: settings.template_id.clone(),
            public_key: settings.public_key.clone(),
            private_key: settings.private_key.clone(),
        })
    }
}

#[async_trait]
impl Mailer for EmailJsMailer {
    async fn send_post_notification(
        &self,
        message: &PostNotificationEmail,
    ) -> Result<(), GatewayError> {
        let request = SendRequest {
            service_id: &self.service_id,
            template_id: &self.template_id,
            user_id: &self.public_key,
            access_token: self.private_key.as_ref().map(|key| key.expose_secret()),
            template_params: message,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(GatewayError::transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        // The relay answers with a plain-text reason.
        let reason = response.text().await.unwrap_or_default();
        Err(GatewayError::Remote {
            status: status.as_u16(),
            message: if reason.trim().is_empty() {
                status.to_string()
            } else {
                reason.trim().to_string()
            },
        })
    }
}
