//! Domain entities mirrored from the hosted tables.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::Role;

/// Post row as read for a listing; the markdown body is not fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummaryRecord {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PostRecord {
    pub fn to_summary(&self) -> PostSummaryRecord {
        PostSummaryRecord {
            id: self.id,
            title: self.title.clone(),
            summary: self.summary.clone(),
            category_id: self.category_id,
            category_name: self.category_name.clone(),
            image_url: self.image_url.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub name: String,
}

/// Application-level user record; `id` equals the auth identity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    /// Opt-out flag; a missing value in storage reads as `false`.
    pub notifications_muted: bool,
}

impl ProfileRecord {
    pub fn receives_notifications(&self) -> bool {
        !self.notifications_muted
            && self
                .email
                .as_deref()
                .is_some_and(|email| !email.trim().is_empty())
    }
}

/// Aggregate counters shown on the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub post_count: u64,
    pub user_count: u64,
}
