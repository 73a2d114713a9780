//! Session snapshots and sign-in flow.
//!
//! A [`SessionSnapshot`] is derived from the access token on every request and
//! passed explicitly to services. Changes are announced on the [`SessionHub`]
//! broadcast channel.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::application::gateways::{
    AuthTokens, AuthUser, GatewayError, IdentityProvider, PkceChallenge,
};
use crate::application::repos::{ProfilesRepo, RepoError};
use crate::cache::{QueryCaches, QueryKey};
use crate::domain::types::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub notifications_muted: bool,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("administrator role required")]
pub struct AdminRequired;

impl SessionSnapshot {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn require_admin(&self) -> Result<(), AdminRequired> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AdminRequired)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(SessionSnapshot),
    SignedOut { user_id: Uuid },
    ProfileChanged { user_id: Uuid },
}

#[derive(Clone)]
pub struct SessionHub {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers that will see the event.
    pub fn publish(&self, event: SessionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        Self::from_verifier(verifier)
    }

    /// S256 challenge for an existing verifier.
    pub fn from_verifier(verifier: String) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let digest = hasher.finalize().to_vec();
        let challenge = URL_SAFE_NO_PAD.encode(digest);
        Self {
            verifier,
            challenge,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("identity provider error: {0}")]
    Identity(#[from] GatewayError),
    #[error("profile lookup failed: {0}")]
    Profile(#[from] RepoError),
}

/// Pending OAuth sign-in: where to send the browser and what to remember.
#[derive(Debug, Clone)]
pub struct SignInRequest {
    pub authorize_url: Url,
    pub verifier: String,
}

#[derive(Debug, Clone)]
pub struct SignedIn {
    pub tokens: AuthTokens,
    pub snapshot: SessionSnapshot,
}

#[derive(Clone)]
pub struct SessionService {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfilesRepo>,
    caches: Arc<QueryCaches>,
    hub: SessionHub,
}

impl SessionService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfilesRepo>,
        caches: Arc<QueryCaches>,
        hub: SessionHub,
    ) -> Self {
        Self {
            identity,
            profiles,
            caches,
            hub,
        }
    }

    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }

    pub fn begin_sign_in(&self, redirect_to: &Url) -> Result<SignInRequest, SessionError> {
        let challenge = PkceChallenge::generate();
        let authorize_url = self.identity.authorize_url(redirect_to, &challenge)?;
        Ok(SignInRequest {
            authorize_url,
            verifier: challenge.verifier,
        })
    }

    pub async fn complete_sign_in(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<SignedIn, SessionError> {
        let tokens = self.identity.exchange_code(code, verifier).await?;
        let snapshot = self.snapshot_for(&tokens.user).await?;

        info!(
            target = "blogdeck::session",
            user_id = %snapshot.user_id,
            role = snapshot.role.as_str(),
            "user signed in"
        );
        self.hub.publish(SessionEvent::SignedIn(snapshot.clone()));

        Ok(SignedIn { tokens, snapshot })
    }

    /// Resolves the snapshot for an access token; `None` when the token is not accepted.
    pub async fn resolve(&self, access_token: &str) -> Result<Option<SessionSnapshot>, SessionError> {
        match self.identity.current_user(access_token).await? {
            Some(user) => Ok(Some(self.snapshot_for(&user).await?)),
            None => Ok(None),
        }
    }

    /// Renews an expired session from its refresh token; `None` when the provider refuses it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Option<SignedIn>, SessionError> {
        let Some(tokens) = self.identity.refresh(refresh_token).await? else {
            return Ok(None);
        };
        let snapshot = self.snapshot_for(&tokens.user).await?;
        debug!(
            target = "blogdeck::session",
            user_id = %snapshot.user_id,
            expires_in = ?tokens.expires_in,
            "session refreshed"
        );
        Ok(Some(SignedIn { tokens, snapshot }))
    }

    /// Revokes the token remotely; failures are logged because the local session ends regardless.
    pub async fn sign_out(&self, access_token: &str, user_id: Option<Uuid>) {
        if let Err(err) = self.identity.sign_out(access_token).await {
            warn!(
                target = "blogdeck::session",
                error = %err,
                "remote sign-out failed"
            );
        }
        if let Some(user_id) = user_id {
            self.hub.publish(SessionEvent::SignedOut { user_id });
        }
    }

    async fn snapshot_for(&self, user: &AuthUser) -> Result<SessionSnapshot, SessionError> {
        let profiles = Arc::clone(&self.profiles);
        let id = user.id;
        let profile = self
            .caches
            .profiles
            .get_or_fetch(QueryKey::Profile(id), move || async move {
                profiles.find_profile(id).await
            })
            .await?;

        Ok(match profile {
            Some(profile) => SessionSnapshot {
                user_id: user.id,
                email: profile.email.or_else(|| user.email.clone()),
                role: profile.role,
                notifications_muted: profile.notifications_muted,
            },
            None => SessionSnapshot {
                user_id: user.id,
                email: user.email.clone(),
                role: Role::Member,
                notifications_muted: false,
            },
        })
    }
}
