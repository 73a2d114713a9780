//! Ports for the hosted services that are not table-shaped: object storage,
//! outbound e-mail and the identity provider.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("credentials rejected")]
    Unauthorized,
    #[error("request to remote service failed: {0}")]
    Transport(String),
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl GatewayError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    /// Object path inside the bucket.
    pub path: String,
    pub public_url: String,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Uploads the blob under `object_name` and returns its public address.
    async fn upload_image(
        &self,
        object_name: &str,
        upload: ImageUpload,
    ) -> Result<StoredImage, GatewayError>;
}

/// One templated "new post" message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostNotificationEmail {
    pub to_email: String,
    pub title: String,
    pub post_url: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_post_notification(
        &self,
        message: &PostNotificationEmail,
    ) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub user: AuthUser,
}

/// PKCE pair for the OAuth code flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Address the browser is sent to for OAuth sign-in.
    fn authorize_url(
        &self,
        redirect_to: &Url,
        challenge: &PkceChallenge,
    ) -> Result<Url, GatewayError>;

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<AuthTokens, GatewayError>;

    /// Resolves the identity behind an access token; `None` when the token is no longer valid.
    async fn current_user(&self, access_token: &str) -> Result<Option<AuthUser>, GatewayError>;

    /// Trades a refresh token for fresh tokens; `None` when the refresh token is spent or revoked.
    async fn refresh(&self, refresh_token: &str) -> Result<Option<AuthTokens>, GatewayError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), GatewayError>;
}
