use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};

use crate::application::detail::DetailOutcome;
use crate::infra::http::session::{CurrentSession, push_flash};
use crate::infra::http::state::HttpState;

/// Post page. Unknown or unreadable posts answer `303 See Other` to the feed
/// with a flash toast.
pub async fn post_detail(
    State(state): State<HttpState>,
    current: CurrentSession,
    Path(raw_id): Path<String>,
) -> Response {
    match state.detail.open(&raw_id).await {
        DetailOutcome::Displayed(view) => Json(*view).into_response(),
        DetailOutcome::Redirect { location, toast } => {
            push_flash(&current.session, toast).await;
            Redirect::to(location).into_response()
        }
    }
}
