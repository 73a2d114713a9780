//! Route handlers grouped by surface.

mod admin;
mod auth;
mod detail;
mod forms;
mod listing;
mod preferences;

pub use admin::*;
pub use auth::*;
pub use detail::*;
pub use listing::*;
pub use preferences::*;

use std::num::NonZeroU32;

use axum::http::StatusCode;
use serde::Deserialize;

use crate::application::listing::ListingQuery;
use crate::application::repos::PostListScope;
use crate::domain::types::CategoryFilter;

use super::error::ApiError;

/// Listing parameters shared by the feed, the admin table and delete requests.
#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    pub page: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ListingParams {
    pub fn into_query(
        self,
        scope: PostListScope,
        page_size: NonZeroU32,
    ) -> Result<ListingQuery, ApiError> {
        let category = match self.category.as_deref() {
            Some(raw) => raw
                .parse::<CategoryFilter>()
                .map_err(|err| ApiError::bad_request(err.to_string()))?,
            None => CategoryFilter::All,
        };
        Ok(ListingQuery {
            scope,
            page: self.page.unwrap_or(0),
            category,
            search: self.search.unwrap_or_default(),
            page_size,
        })
    }
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
