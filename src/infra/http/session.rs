//! Cookie session plumbing: the session layer, the signed-in extractor and
//! one-shot flash toasts.

use std::num::NonZeroUsize;

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration as CookieDuration;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::gateways::AuthTokens;
use crate::application::session::SessionSnapshot;
use crate::application::toast::Toast;

use super::error::{ApiError, codes};
use super::session_store::BoundedMemoryStore;
use super::state::HttpState;

pub const SESSION_COOKIE_NAME: &str = "blogdeck_session";

const SESSION_IDLE_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Most sessions held at once; the least recently used one is dropped beyond this.
pub const SESSION_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

/// Access tokens this close to expiry are refreshed up front.
const EXPIRY_LEEWAY_SECONDS: i64 = 30;

pub mod keys {
    pub const TOKENS: &str = "tokens";
    pub const USER_ID: &str = "user_id";
    pub const PKCE_VERIFIER: &str = "pkce_verifier";
    pub const FLASH: &str = "flash";
}

/// Sessions are held in process memory and end with a restart.
pub fn session_layer(secure: bool) -> SessionManagerLayer<BoundedMemoryStore> {
    SessionManagerLayer::new(BoundedMemoryStore::new(SESSION_CAPACITY))
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(CookieDuration::seconds(
            SESSION_IDLE_SECONDS,
        )))
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

pub(crate) fn session_store_error(err: tower_sessions::session::Error) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        codes::SESSION,
        "Session store unavailable",
    )
    .with_hint(err.to_string())
    .from_source("infra::http::session")
}

/// Provider tokens kept in the cookie session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds; `None` when the provider did not say.
    pub expires_at: Option<i64>,
}

impl SessionTokens {
    /// Captures freshly issued tokens; a grant without a refresh token keeps `previous`.
    pub fn issued(tokens: &AuthTokens, now: OffsetDateTime, previous: Option<String>) -> Self {
        let expires_at = tokens
            .expires_in
            .and_then(|seconds| i64::try_from(seconds).ok())
            .map(|seconds| now.unix_timestamp().saturating_add(seconds));
        Self {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone().or(previous),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .is_some_and(|at| now.unix_timestamp() >= at.saturating_sub(EXPIRY_LEEWAY_SECONDS))
    }
}

/// Signed-in user for the current request; rejects with 401 otherwise.
///
/// An expired or rejected access token is traded for a new one once before
/// the identity is cleared.
pub struct CurrentSession {
    pub snapshot: SessionSnapshot,
    pub session: Session,
}

impl FromRequestParts<HttpState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)?;

        let tokens = stored_tokens(&session)
            .await
            .ok_or_else(ApiError::unauthorized)?;

        let now = OffsetDateTime::now_utc();
        if !tokens.is_expired(now)
            && let Some(snapshot) = state.sessions.resolve(&tokens.access_token).await?
        {
            return Ok(Self { snapshot, session });
        }

        if let Some(refresh_token) = tokens.refresh_token.as_deref()
            && let Some(renewed) = state.sessions.refresh(refresh_token).await?
        {
            let stored = SessionTokens::issued(&renewed.tokens, now, tokens.refresh_token.clone());
            store_tokens(&session, &stored)
                .await
                .map_err(session_store_error)?;
            debug!(
                target = "blogdeck::http::session",
                user_id = %renewed.snapshot.user_id,
                "access token renewed"
            );
            return Ok(Self {
                snapshot: renewed.snapshot,
                session,
            });
        }

        debug!(
            target = "blogdeck::http::session",
            "access token rejected and not renewable; clearing session"
        );
        clear_identity(&session).await;
        Err(ApiError::unauthorized())
    }
}

pub async fn stored_tokens(session: &Session) -> Option<SessionTokens> {
    session
        .get::<SessionTokens>(keys::TOKENS)
        .await
        .ok()
        .flatten()
}

pub async fn store_tokens(
    session: &Session,
    tokens: &SessionTokens,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::TOKENS, tokens).await
}

pub async fn access_token(session: &Session) -> Option<String> {
    stored_tokens(session).await.map(|tokens| tokens.access_token)
}

pub async fn signed_in_user(session: &Session) -> Option<Uuid> {
    session.get::<Uuid>(keys::USER_ID).await.ok().flatten()
}

pub async fn clear_identity(session: &Session) {
    if let Err(err) = session.remove::<SessionTokens>(keys::TOKENS).await {
        warn!(target = "blogdeck::http::session", error = %err, "failed to clear tokens");
    }
    if let Err(err) = session.remove::<Uuid>(keys::USER_ID).await {
        warn!(target = "blogdeck::http::session", error = %err, "failed to clear user id");
    }
}

/// Stores a toast for the next listing response.
pub async fn push_flash(session: &Session, toast: Toast) {
    if let Err(err) = session.insert(keys::FLASH, toast).await {
        warn!(target = "blogdeck::http::session", error = %err, "failed to store flash");
    }
}

pub async fn take_flash(session: &Session) -> Option<Toast> {
    session.remove::<Toast>(keys::FLASH).await.ok().flatten()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::gateways::AuthUser;

    fn grant(refresh_token: Option<&str>, expires_in: Option<u64>) -> AuthTokens {
        AuthTokens {
            access_token: "access".into(),
            refresh_token: refresh_token.map(str::to_string),
            expires_in,
            user: AuthUser {
                id: Uuid::nil(),
                email: None,
            },
        }
    }

    #[test]
    fn issued_tokens_expire_with_leeway() {
        let now = datetime!(2026-03-01 12:00 UTC);
        let tokens = SessionTokens::issued(&grant(Some("refresh"), Some(3600)), now, None);

        assert_eq!(tokens.expires_at, Some(now.unix_timestamp() + 3600));
        assert!(!tokens.is_expired(now));
        assert!(!tokens.is_expired(now + time::Duration::seconds(3569)));
        assert!(tokens.is_expired(now + time::Duration::seconds(3570)));
    }

    #[test]
    fn unknown_expiry_never_expires_locally() {
        let now = datetime!(2026-03-01 12:00 UTC);
        let tokens = SessionTokens::issued(&grant(None, None), now, None);

        assert!(!tokens.is_expired(now + time::Duration::days(30)));
    }

    #[test]
    fn grant_without_refresh_token_keeps_previous() {
        let now = datetime!(2026-03-01 12:00 UTC);
        let tokens = SessionTokens::issued(&grant(None, Some(60)), now, Some("older".into()));

        assert_eq!(tokens.refresh_token.as_deref(), Some("older"));
    }
}
