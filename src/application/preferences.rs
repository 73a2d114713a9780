//! Per-user "new post" e-mail preference with an optimistic toggle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::repos::{ProfilesWriteRepo, RepoError};
use crate::application::session::{SessionEvent, SessionHub, SessionSnapshot};
use crate::application::toast::Toast;
use crate::cache::{QueryCaches, QueryGroup};

/// Two-phase optimistic state for the notification switch.
///
/// The displayed value flips as soon as a change is requested and either
/// stays there on confirmation or snaps back on roll-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PreferenceToggle {
    Settled { enabled: bool },
    Pending { previous: bool, requested: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a preference change is already pending")]
pub struct ToggleBusy;

impl PreferenceToggle {
    pub fn settled(enabled: bool) -> Self {
        Self::Settled { enabled }
    }

    /// Value the user should currently see.
    pub fn displayed(self) -> bool {
        match self {
            Self::Settled { enabled } => enabled,
            Self::Pending { requested, .. } => requested,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn begin(self, requested: bool) -> Result<Self, ToggleBusy> {
        match self {
            Self::Settled { enabled } => Ok(Self::Pending {
                previous: enabled,
                requested,
            }),
            Self::Pending { .. } => Err(ToggleBusy),
        }
    }

    pub fn confirm(self) -> Self {
        match self {
            Self::Pending { requested, .. } => Self::Settled { enabled: requested },
            settled => settled,
        }
    }

    pub fn roll_back(self) -> Self {
        match self {
            Self::Pending { previous, .. } => Self::Settled { enabled: previous },
            settled => settled,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToggleFailure {
    #[error(transparent)]
    Busy(#[from] ToggleBusy),
    #[error(transparent)]
    Remote(#[from] RepoError),
}

#[derive(Debug, Error)]
#[error("{source}")]
pub struct PreferenceError {
    #[source]
    pub source: ToggleFailure,
    /// Toggle after roll-back, so callers can redraw the switch.
    pub state: PreferenceToggle,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceChanged {
    pub state: PreferenceToggle,
    pub toast: Toast,
}

pub fn confirmation_message(enabled: bool) -> &'static str {
    if enabled {
        "Email notifications enabled"
    } else {
        "Email notifications muted"
    }
}

type PendingToggles = Arc<Mutex<HashMap<Uuid, PreferenceToggle>>>;

/// Holds a user's toggle in the pending set until dropped.
struct PendingClaim {
    pending: PendingToggles,
    user_id: Uuid,
    state: PreferenceToggle,
}

impl Drop for PendingClaim {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}

#[derive(Clone)]
pub struct NotificationPreferenceService {
    profiles: Arc<dyn ProfilesWriteRepo>,
    caches: Arc<QueryCaches>,
    hub: SessionHub,
    pending: PendingToggles,
}

impl NotificationPreferenceService {
    pub fn new(
        profiles: Arc<dyn ProfilesWriteRepo>,
        caches: Arc<QueryCaches>,
        hub: SessionHub,
    ) -> Self {
        Self {
            profiles,
            caches,
            hub,
            pending: PendingToggles::default(),
        }
    }

    /// The stored flag means "muted"; the switch shows the inverse. A change
    /// still in flight is reported as pending.
    pub fn current(&self, session: &SessionSnapshot) -> PreferenceToggle {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session.user_id)
            .copied()
            .unwrap_or_else(|| PreferenceToggle::settled(!session.notifications_muted))
    }

    fn claim(
        &self,
        session: &SessionSnapshot,
        enabled: bool,
    ) -> Result<PendingClaim, PreferenceError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let current = pending
            .get(&session.user_id)
            .copied()
            .unwrap_or_else(|| PreferenceToggle::settled(!session.notifications_muted));
        let state = current.begin(enabled).map_err(|busy| {
            debug!(
                target = "blogdeck::application::preferences",
                user_id = %session.user_id,
                "notification preference change already in flight"
            );
            PreferenceError {
                source: busy.into(),
                state: current,
            }
        })?;
        pending.insert(session.user_id, state);

        Ok(PendingClaim {
            pending: Arc::clone(&self.pending),
            user_id: session.user_id,
            state,
        })
    }

    /// Sends one update for `enabled`; the returned state is settled unless
    /// another change for the same user is still in flight.
    pub async fn toggle(
        &self,
        session: &SessionSnapshot,
        enabled: bool,
    ) -> Result<PreferenceChanged, PreferenceError> {
        let claim = self.claim(session, enabled)?;
        let pending = claim.state;

        let written = self
            .profiles
            .set_notifications_muted(session.user_id, !enabled)
            .await;
        drop(claim);

        match written {
            Ok(_) => {
                let state = pending.confirm();
                self.caches
                    .invalidate(&[QueryGroup::Profile(session.user_id)]);
                self.hub.publish(SessionEvent::ProfileChanged {
                    user_id: session.user_id,
                });
                info!(
                    target = "blogdeck::application::preferences",
                    user_id = %session.user_id,
                    enabled,
                    "notification preference updated"
                );
                Ok(PreferenceChanged {
                    state,
                    toast: Toast::success(confirmation_message(enabled)),
                })
            }
            Err(source) => {
                warn!(
                    target = "blogdeck::application::preferences",
                    user_id = %session.user_id,
                    error = %source,
                    "notification preference update failed"
                );
                Err(PreferenceError {
                    source: source.into(),
                    state: pending.roll_back(),
                })
            }
        }
    }
}
