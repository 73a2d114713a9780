use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::gateways::{GatewayError, ImageUpload};
use crate::application::listing::ListingQuery;
use crate::application::notifications::FanoutReport;
use crate::application::repos::RepoError;
use crate::application::session::AdminRequired;
use crate::domain::entities::PostRecord;
use crate::domain::error::FieldErrors;

#[derive(Debug, Error)]
pub enum AdminPostError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("no changes supplied")]
    NothingToUpdate,
    #[error("deleting a post requires confirmation")]
    ConfirmationRequired,
    #[error(transparent)]
    Forbidden(#[from] AdminRequired),
    #[error("image upload failed: {0}")]
    Upload(#[source] GatewayError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub title: String,
    pub summary: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub image: Option<ImageUpload>,
}

/// Partial edit; `None` fields stay as they are.
#[derive(Debug, Clone, Default)]
pub struct UpdatePostCommand {
    pub id: Uuid,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` removes the category.
    pub category_id: Option<Option<Uuid>>,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct DeletePostCommand {
    pub id: Uuid,
    pub confirmed: bool,
    /// Listing the admin was looking at, used to pick the page to return to.
    pub listing: Option<ListingQuery>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedPost {
    pub post: PostRecord,
    pub post_url: String,
    /// `None` when outbound e-mail is not configured.
    pub notifications: Option<FanoutReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedPost {
    pub id: Uuid,
    pub landing_page: Option<u32>,
}
