use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::session::SessionSnapshot;
use crate::infra::http::error::ApiError;
use crate::infra::http::session::{
    CurrentSession, SessionTokens, access_token, clear_identity, keys, session_store_error,
    signed_in_user, store_tokens,
};
use crate::infra::http::state::HttpState;

const SOURCE: &str = "infra::http::auth";

/// Starts the OAuth code flow; the PKCE verifier waits in the session.
pub async fn login(State(state): State<HttpState>, session: Session) -> Result<Response, ApiError> {
    let callback = state
        .site
        .callback_url()
        .map_err(|err| ApiError::bad_request(format!("invalid callback address: {err}")))?;
    let request = state.sessions.begin_sign_in(&callback)?;

    session
        .insert(keys::PKCE_VERIFIER, request.verifier)
        .await
        .map_err(session_store_error)?;

    Ok(Redirect::to(request.authorize_url.as_str()).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub async fn callback(
    State(state): State<HttpState>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let verifier = session
        .remove::<String>(keys::PKCE_VERIFIER)
        .await
        .map_err(session_store_error)?;

    let Some(code) = params.code.filter(|code| !code.is_empty()) else {
        let reason = params
            .error_description
            .or(params.error)
            .unwrap_or_else(|| "missing authorization code".to_string());
        return Err(ApiError::bad_request("Sign-in was not completed")
            .with_hint(reason)
            .from_source(SOURCE));
    };
    let Some(verifier) = verifier else {
        return Err(ApiError::bad_request("No sign-in in progress")
            .with_hint("start again from /auth/login")
            .from_source(SOURCE));
    };

    let signed_in = state.sessions.complete_sign_in(&code, &verifier).await?;

    session.cycle_id().await.map_err(session_store_error)?;
    let tokens = SessionTokens::issued(&signed_in.tokens, OffsetDateTime::now_utc(), None);
    store_tokens(&session, &tokens)
        .await
        .map_err(session_store_error)?;
    session
        .insert(keys::USER_ID, signed_in.snapshot.user_id)
        .await
        .map_err(session_store_error)?;

    Ok(Redirect::to("/").into_response())
}

/// Ends the local session even when remote revocation fails.
pub async fn logout(State(state): State<HttpState>, session: Session) -> StatusCode {
    let user_id: Option<Uuid> = signed_in_user(&session).await;
    if let Some(token) = access_token(&session).await {
        state.sessions.sign_out(&token, user_id).await;
    }
    clear_identity(&session).await;
    if let Err(err) = session.flush().await {
        warn!(target = "blogdeck::http::auth", error = %err, "failed to flush session");
    }
    if let Some(user_id) = user_id {
        info!(target = "blogdeck::http::auth", user_id = %user_id, "user signed out");
    }
    StatusCode::NO_CONTENT
}

pub async fn current_session(current: CurrentSession) -> Json<SessionSnapshot> {
    Json(current.snapshot)
}
