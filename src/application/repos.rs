//! Repository traits describing the hosted data adapters.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::domain::entities::{CategoryRecord, PostRecord, PostSummaryRecord, ProfileRecord};
use crate::domain::types::{CategoryFilter, SearchField};

/// Failure reported by a data adapter. Remote messages are kept verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoError {
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("duplicate record: {message}")]
    Duplicate { message: String },
    #[error("resource not found")]
    NotFound,
    #[error("request to data API failed: {0}")]
    Transport(String),
    #[error("data API request timed out")]
    Timeout,
    #[error("unexpected data API payload: {0}")]
    Decode(String),
}

impl RepoError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostListScope {
    /// Reader feed; search matches the summary.
    Home,
    /// Admin table; search matches the title.
    Admin,
}

impl PostListScope {
    pub fn search_field(self) -> SearchField {
        match self {
            PostListScope::Home => SearchField::Summary,
            PostListScope::Admin => SearchField::Title,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PostQueryFilter {
    pub category: CategoryFilter,
    pub search: Option<String>,
}

impl PostQueryFilter {
    /// Drops blank search terms so they never reach the data API.
    pub fn new(category: CategoryFilter, search: &str) -> Self {
        let trimmed = search.trim();
        Self {
            category,
            search: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostListPage {
    pub items: Vec<PostSummaryRecord>,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct NewPostParams {
    pub title: String,
    pub summary: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
}

/// Partial post update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` clears the category reference.
    pub category_id: Option<Option<Uuid>>,
    pub image_url: Option<String>,
}

impl PostChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.summary.is_none()
            && self.description.is_none()
            && self.category_id.is_none()
            && self.image_url.is_none()
    }
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn list_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
        window: PageWindow,
    ) -> Result<PostListPage, RepoError>;

    async fn count_posts(
        &self,
        scope: PostListScope,
        filter: &PostQueryFilter,
    ) -> Result<u64, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: NewPostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<PostRecord, RepoError>;

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError>;
}

#[async_trait]
pub trait CategoriesWriteRepo: Send + Sync {
    async fn create_category(&self, name: &str) -> Result<CategoryRecord, RepoError>;
}

#[async_trait]
pub trait ProfilesRepo: Send + Sync {
    async fn find_profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepoError>;

    /// Profiles whose opt-out flag is false or unset.
    async fn list_notification_recipients(&self) -> Result<Vec<ProfileRecord>, RepoError>;

    async fn count_profiles(&self) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait ProfilesWriteRepo: Send + Sync {
    async fn set_notifications_muted(
        &self,
        id: Uuid,
        muted: bool,
    ) -> Result<ProfileRecord, RepoError>;
}
