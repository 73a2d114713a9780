use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::application::error::ErrorReport;
use crate::application::preferences::PreferenceToggle;
use crate::infra::http::error::{ApiError, ApiErrorMessage};
use crate::infra::http::session::CurrentSession;
use crate::infra::http::state::HttpState;

#[derive(Debug, Serialize)]
pub struct PreferenceView {
    pub enabled: bool,
    pub state: PreferenceToggle,
}

#[derive(Debug, Deserialize)]
pub struct PreferenceUpdate {
    pub enabled: bool,
}

/// A failed toggle still reports the state the switch should show.
#[derive(Debug, Serialize)]
struct PreferenceFailure {
    error: ApiErrorMessage,
    enabled: bool,
    state: PreferenceToggle,
}

pub async fn notification_preference(
    State(state): State<HttpState>,
    current: CurrentSession,
) -> Json<PreferenceView> {
    let toggle = state.preferences.current(&current.snapshot);
    Json(PreferenceView {
        enabled: toggle.displayed(),
        state: toggle,
    })
}

pub async fn update_notification_preference(
    State(state): State<HttpState>,
    current: CurrentSession,
    Json(update): Json<PreferenceUpdate>,
) -> Response {
    match state
        .preferences
        .toggle(&current.snapshot, update.enabled)
        .await
    {
        Ok(changed) => Json(changed).into_response(),
        Err(err) => {
            let (status, error) = ApiError::from(err.source.clone()).into_message();
            let report = ErrorReport::from_error("infra::http::preferences", status, &err);
            let mut response = (
                status,
                Json(PreferenceFailure {
                    error,
                    enabled: err.state.displayed(),
                    state: err.state,
                }),
            )
                .into_response();
            report.attach(&mut response);
            response
        }
    }
}
