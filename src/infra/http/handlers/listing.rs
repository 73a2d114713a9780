use axum::Json;
use axum::extract::{Query, State};
use serde::Serialize;
use time::OffsetDateTime;

use crate::application::listing::{ListingPage, present_page};
use crate::application::repos::PostListScope;
use crate::application::toast::Toast;
use crate::infra::http::error::ApiError;
use crate::infra::http::session::{CurrentSession, take_flash};
use crate::infra::http::state::HttpState;

use super::ListingParams;

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    #[serde(flatten)]
    pub page: ListingPage,
    /// The refresh failed and this is the last good result for the same query.
    pub stale: bool,
    pub toasts: Vec<Toast>,
    /// How long the search box should wait before re-querying.
    pub search_debounce_ms: u64,
}

/// Reader feed. Falls back to the last cached page when the data API fails.
pub async fn home_feed(
    State(state): State<HttpState>,
    current: CurrentSession,
    Query(params): Query<ListingParams>,
) -> Result<Json<ListingResponse>, ApiError> {
    let query = params.into_query(PostListScope::Home, state.site.home_page_size)?;
    let outcome = state.listing.load(&query).await;

    let Some(page) = outcome.page else {
        return Err(match outcome.error {
            Some(err) => ApiError::from(err),
            None => ApiError::not_found("Listing unavailable"),
        }
        .from_source("infra::http::listing"));
    };

    let mut toasts: Vec<Toast> = take_flash(&current.session).await.into_iter().collect();
    if let Some(err) = &outcome.error {
        toasts.push(Toast::error(err.to_string()));
    }

    Ok(Json(ListingResponse {
        page: present_page(&page, &query, OffsetDateTime::now_utc()),
        stale: outcome.stale,
        toasts,
        search_debounce_ms: state.site.search_debounce_ms(),
    }))
}

pub async fn admin_posts(
    State(state): State<HttpState>,
    current: CurrentSession,
    Query(params): Query<ListingParams>,
) -> Result<Json<ListingResponse>, ApiError> {
    let query = params.into_query(PostListScope::Admin, state.site.admin_page_size)?;
    let page = state.posts.list(&current.snapshot, &query).await?;

    Ok(Json(ListingResponse {
        page: present_page(&page, &query, OffsetDateTime::now_utc()),
        stale: false,
        toasts: Vec::new(),
        search_debounce_ms: state.site.search_debounce_ms(),
    }))
}
