use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::application::gateways::{
    AuthTokens, AuthUser, GatewayError, IdentityProvider, PkceChallenge,
};

use super::BackendClient;
use super::util::{check_gateway_response, gateway_error, map_gateway_transport};

/// OAuth code flow against the hosted auth service.
#[derive(Clone)]
pub struct HostedIdentityProvider {
    client: BackendClient,
    provider: String,
}

impl HostedIdentityProvider {
    pub fn new(client: BackendClient, provider: impl Into<String>) -> Self {
        Self {
            client,
            provider: provider.into(),
        }
    }

    fn auth_url(&self, path: &str) -> Result<Url, GatewayError> {
        self.client
            .endpoint(&format!("auth/v1/{path}"))
            .map_err(|err| GatewayError::Invalid(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: Uuid,
    email: Option<String>,
}

impl From<UserBody> for AuthUser {
    fn from(body: UserBody) -> Self {
        Self {
            id: body.id,
            email: body.email.filter(|email| !email.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    user: UserBody,
}

#[derive(Debug, Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

impl From<TokenBody> for AuthTokens {
    fn from(body: TokenBody) -> Self {
        Self {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_in: body.expires_in,
            user: body.user.into(),
        }
    }
}

async fn token_body(response: reqwest::Response) -> Result<TokenBody, GatewayError> {
    response
        .json()
        .await
        .map_err(|err| GatewayError::Invalid(format!("token response: {err}")))
}

#[async_trait]
impl IdentityProvider for HostedIdentityProvider {
    fn authorize_url(
        &self,
        redirect_to: &Url,
        challenge: &PkceChallenge,
    ) -> Result<Url, GatewayError> {
        let mut url = self.auth_url("authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", &self.provider)
            .append_pair("redirect_to", redirect_to.as_str())
            .append_pair("code_challenge", &challenge.challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url)
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<AuthTokens, GatewayError> {
        let mut url = self.auth_url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "pkce");

        let response = self
            .client
            .public()
            .post(url)
            .json(&PkceGrant {
                auth_code: code,
                code_verifier: verifier,
            })
            .send()
            .await
            .map_err(map_gateway_transport)?;
        let response = check_gateway_response(response).await?;
        Ok(token_body(response).await?.into())
    }

    async fn current_user(&self, access_token: &str) -> Result<Option<AuthUser>, GatewayError> {
        let url = self.auth_url("user")?;
        let response = self
            .client
            .public()
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_gateway_transport)?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(gateway_error(status, response).await);
        }

        let body: UserBody = response
            .json()
            .await
            .map_err(|err| GatewayError::Invalid(format!("user response: {err}")))?;
        Ok(Some(body.into()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Option<AuthTokens>, GatewayError> {
        let mut url = self.auth_url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let response = self
            .client
            .public()
            .post(url)
            .json(&RefreshGrant { refresh_token })
            .send()
            .await
            .map_err(map_gateway_transport)?;

        // A spent or revoked refresh token answers 400 invalid_grant.
        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(gateway_error(status, response).await);
        }
        Ok(Some(token_body(response).await?.into()))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), GatewayError> {
        let url = self.auth_url("logout")?;
        let response = self
            .client
            .public()
            .post(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_gateway_transport)?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GatewayError::Unauthorized),
            _ => check_gateway_response(response).await.map(|_| ()),
        }
    }
}
