//! Paged, filtered post listings for the reader feed and the admin table.

use std::num::NonZeroU32;
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::pagination::{PageSummary, PageWindow};
use crate::application::repos::{
    PostListPage, PostListScope, PostQueryFilter, PostsRepo, RepoError,
};
use crate::cache::{QueryCaches, QueryKey};
use crate::domain::entities::PostSummaryRecord;
use crate::domain::posts::category_label;
use crate::domain::types::CategoryFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub scope: PostListScope,
    pub page: u32,
    pub category: CategoryFilter,
    pub search: String,
    pub page_size: NonZeroU32,
}

impl ListingQuery {
    pub fn first_page(scope: PostListScope, page_size: NonZeroU32) -> Self {
        Self {
            scope,
            page: 0,
            category: CategoryFilter::All,
            search: String::new(),
            page_size,
        }
    }

    pub fn window(&self) -> PageWindow {
        PageWindow::new(self.page, self.page_size)
    }

    pub fn filter(&self) -> PostQueryFilter {
        PostQueryFilter::new(self.category, &self.search)
    }

    pub fn cache_key(&self) -> QueryKey {
        QueryKey::PostList {
            scope: self.scope,
            filter: self.filter(),
            window: self.window(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingItem {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub category_id: Option<Uuid>,
    pub category_label: String,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub age_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingPage {
    pub items: Vec<ListingItem>,
    pub pagination: PageSummary,
}

/// Result of a listing read that may fall back to the previous page.
#[derive(Debug, Clone)]
pub struct ListingOutcome {
    pub page: Option<PostListPage>,
    /// True when `page` is a cached result served because the refresh failed.
    pub stale: bool,
    pub error: Option<RepoError>,
}

#[derive(Clone)]
pub struct ListingService {
    posts: Arc<dyn PostsRepo>,
    caches: Arc<QueryCaches>,
}

impl ListingService {
    pub fn new(posts: Arc<dyn PostsRepo>, caches: Arc<QueryCaches>) -> Self {
        Self { posts, caches }
    }

    pub async fn fetch(&self, query: &ListingQuery) -> Result<PostListPage, RepoError> {
        let posts = Arc::clone(&self.posts);
        let scope = query.scope;
        let filter = query.filter();
        let window = query.window();
        self.caches
            .post_pages
            .get_or_fetch(query.cache_key(), move || async move {
                posts.list_posts(scope, &filter, window).await
            })
            .await
    }

    /// Fetches the page, serving the last cached result for the same key when the refresh fails.
    pub async fn load(&self, query: &ListingQuery) -> ListingOutcome {
        match self.fetch(query).await {
            Ok(page) => ListingOutcome {
                page: Some(page),
                stale: false,
                error: None,
            },
            Err(err) => {
                let previous = self.caches.post_pages.peek(&query.cache_key());
                warn!(
                    target = "blogdeck::application::listing",
                    error = %err,
                    page = query.page,
                    fallback = previous.is_some(),
                    "listing refresh failed"
                );
                ListingOutcome {
                    stale: previous.is_some(),
                    page: previous,
                    error: Some(err),
                }
            }
        }
    }

    pub async fn count(&self, query: &ListingQuery) -> Result<u64, RepoError> {
        self.posts.count_posts(query.scope, &query.filter()).await
    }
}

pub fn present_page(page: &PostListPage, query: &ListingQuery, now: OffsetDateTime) -> ListingPage {
    ListingPage {
        items: page
            .items
            .iter()
            .map(|post| present_item(post, now))
            .collect(),
        pagination: PageSummary::new(query.window(), page.total),
    }
}

pub fn present_item(post: &PostSummaryRecord, now: OffsetDateTime) -> ListingItem {
    ListingItem {
        id: post.id,
        title: post.title.clone(),
        summary: post.summary.clone(),
        category_id: post.category_id,
        category_label: category_label(post.category_name.as_deref()).to_string(),
        image_url: post.image_url.clone(),
        created_at: post.created_at,
        age_label: relative_age(post.created_at, now),
    }
}

/// Coarse "3 hours ago" label.
pub fn relative_age(created_at: OffsetDateTime, now: OffsetDateTime) -> String {
    let seconds = (now - created_at).whole_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    fn plural(value: i64, unit: &str) -> String {
        if value == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{value} {unit}s ago")
        }
    }

    if minutes < 1 {
        "less than a minute ago".to_string()
    } else if hours < 1 {
        plural(minutes, "minute")
    } else if days < 1 {
        format!("about {}", plural(hours, "hour"))
    } else if days < 30 {
        plural(days, "day")
    } else if days < 365 {
        plural(days / 30, "month")
    } else {
        format!("about {}", plural(days / 365, "year"))
    }
}
