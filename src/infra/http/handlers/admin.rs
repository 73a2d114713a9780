use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::Multipart;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::admin::posts::{CreatedPost, DeletePostCommand, DeletedPost};
use crate::application::repos::PostListScope;
use crate::domain::entities::{AdminStats, CategoryRecord, PostRecord};
use crate::infra::http::error::ApiError;
use crate::infra::http::session::CurrentSession;
use crate::infra::http::state::HttpState;

use super::ListingParams;
use super::forms::read_post_form;

pub async fn admin_post(
    State(state): State<HttpState>,
    current: CurrentSession,
    Path(id): Path<Uuid>,
) -> Result<Json<PostRecord>, ApiError> {
    state
        .posts
        .load_post(&current.snapshot, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

pub async fn create_post(
    State(state): State<HttpState>,
    current: CurrentSession,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    // Reject members before reading the upload.
    current.snapshot.require_admin().map_err(|_| ApiError::forbidden())?;

    let form = read_post_form(&mut multipart).await?;
    let created: CreatedPost = state
        .posts
        .create_post(&current.snapshot, form.into_create())
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_post(
    State(state): State<HttpState>,
    current: CurrentSession,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<PostRecord>, ApiError> {
    current.snapshot.require_admin().map_err(|_| ApiError::forbidden())?;

    let form = read_post_form(&mut multipart).await?;
    let post = state
        .posts
        .update_post(&current.snapshot, form.into_update(id))
        .await?;

    Ok(Json(post))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirm: bool,
    pub page: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl DeleteParams {
    fn listing(&self) -> ListingParams {
        ListingParams {
            page: self.page,
            category: self.category.clone(),
            search: self.search.clone(),
        }
    }
}

/// Deletes a post and reports the admin table page to show next.
pub async fn delete_post(
    State(state): State<HttpState>,
    current: CurrentSession,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeletedPost>, ApiError> {
    let listing = params
        .listing()
        .into_query(PostListScope::Admin, state.site.admin_page_size)?;
    let deleted = state
        .posts
        .delete_post(
            &current.snapshot,
            DeletePostCommand {
                id,
                confirmed: params.confirm,
                listing: Some(listing),
            },
        )
        .await?;

    Ok(Json(deleted))
}

pub async fn list_categories(
    State(state): State<HttpState>,
    _current: CurrentSession,
) -> Result<Json<Vec<CategoryRecord>>, ApiError> {
    Ok(Json(state.categories.list().await?))
}

#[derive(Debug, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

pub async fn create_category(
    State(state): State<HttpState>,
    current: CurrentSession,
    Json(payload): Json<NewCategory>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .categories
        .create(&current.snapshot, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn admin_stats(
    State(state): State<HttpState>,
    current: CurrentSession,
) -> Result<Json<AdminStats>, ApiError> {
    Ok(Json(state.dashboard.stats(&current.snapshot).await?))
}
