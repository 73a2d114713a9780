//! Single post page: load, render and share metadata, or redirect home.

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::links::PostLinks;
use crate::application::render::RenderService;
use crate::application::repos::PostsRepo;
use crate::application::toast::Toast;
use crate::cache::{QueryCaches, QueryKey};
use crate::domain::entities::PostRecord;
use crate::domain::posts::category_label;

pub const POST_NOT_FOUND_MESSAGE: &str = "Post not found";
const SHARE_FALLBACK_TITLE: &str = "Post Details";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareLink {
    pub url: String,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDetailView {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub html: String,
    pub category_label: String,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub published_label: String,
    pub share: ShareLink,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    Displayed(Box<PostDetailView>),
    Redirect { location: &'static str, toast: Toast },
}

impl DetailOutcome {
    fn home() -> Self {
        Self::Redirect {
            location: "/",
            toast: Toast::error(POST_NOT_FOUND_MESSAGE),
        }
    }
}

#[derive(Clone)]
pub struct PostDetailService {
    posts: Arc<dyn PostsRepo>,
    caches: Arc<QueryCaches>,
    renderer: Arc<dyn RenderService>,
    links: PostLinks,
}

impl PostDetailService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        caches: Arc<QueryCaches>,
        renderer: Arc<dyn RenderService>,
        links: PostLinks,
    ) -> Self {
        Self {
            posts,
            caches,
            renderer,
            links,
        }
    }

    /// `raw_id` is the unparsed path segment; anything unusable sends the reader home.
    pub async fn open(&self, raw_id: &str) -> DetailOutcome {
        let Ok(id) = Uuid::from_str(raw_id.trim()) else {
            debug!(
                target = "blogdeck::application::detail",
                raw_id, "malformed post id"
            );
            return DetailOutcome::home();
        };

        let posts = Arc::clone(&self.posts);
        let found = self
            .caches
            .posts
            .get_or_fetch(QueryKey::Post(id), move || async move {
                posts.find_by_id(id).await
            })
            .await;

        match found {
            Ok(Some(post)) => match self.present(post) {
                Some(view) => DetailOutcome::Displayed(Box::new(view)),
                None => DetailOutcome::home(),
            },
            Ok(None) => DetailOutcome::home(),
            Err(err) => {
                warn!(
                    target = "blogdeck::application::detail",
                    post_id = %id,
                    error = %err,
                    "post lookup failed"
                );
                DetailOutcome::home()
            }
        }
    }

    fn present(&self, post: PostRecord) -> Option<PostDetailView> {
        let html = match self.renderer.render(&post.description) {
            Ok(html) => html,
            Err(err) => {
                warn!(
                    target = "blogdeck::application::detail",
                    post_id = %post.id,
                    error = %err,
                    "post body failed to render"
                );
                return None;
            }
        };

        let share = ShareLink {
            url: self.links.post_url(post.id),
            title: share_title(&post.summary),
            text: post.summary.clone(),
        };

        Some(PostDetailView {
            id: post.id,
            category_label: category_label(post.category_name.as_deref()).to_string(),
            published_label: long_date(post.created_at),
            title: post.title,
            summary: post.summary,
            html,
            image_url: post.image_url,
            created_at: post.created_at,
            share,
        })
    }
}

fn share_title(summary: &str) -> String {
    if summary.trim().is_empty() {
        SHARE_FALLBACK_TITLE.to_string()
    } else {
        summary.to_string()
    }
}

/// "October 18, 2026".
pub fn long_date(at: OffsetDateTime) -> String {
    let format = format_description!("[month repr:long] [day], [year]");
    at.format(&format).unwrap_or_default()
}
