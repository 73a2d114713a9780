use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{
    PostListScope, PostQueryFilter, PostsRepo, ProfilesRepo, RepoError,
};
use crate::application::session::{AdminRequired, SessionSnapshot};
use crate::cache::{QueryCaches, QueryKey};
use crate::domain::entities::AdminStats;

#[derive(Debug, Error)]
pub enum AdminDashboardError {
    #[error(transparent)]
    Forbidden(#[from] AdminRequired),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Post and user totals for the admin header.
#[derive(Clone)]
pub struct AdminDashboardService {
    posts: Arc<dyn PostsRepo>,
    profiles: Arc<dyn ProfilesRepo>,
    caches: Arc<QueryCaches>,
}

impl AdminDashboardService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        profiles: Arc<dyn ProfilesRepo>,
        caches: Arc<QueryCaches>,
    ) -> Self {
        Self {
            posts,
            profiles,
            caches,
        }
    }

    pub async fn stats(&self, actor: &SessionSnapshot) -> Result<AdminStats, AdminDashboardError> {
        actor.require_admin()?;
        let posts = Arc::clone(&self.posts);
        let profiles = Arc::clone(&self.profiles);
        let stats = self
            .caches
            .stats
            .get_or_fetch(QueryKey::Stats, move || async move {
                let filter = PostQueryFilter::default();
                let (post_count, user_count) = tokio::try_join!(
                    posts.count_posts(PostListScope::Admin, &filter),
                    profiles.count_profiles(),
                )?;
                Ok(AdminStats {
                    post_count,
                    user_count,
                })
            })
            .await?;
        Ok(stats)
    }
}
