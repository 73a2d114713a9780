//! Bundle of per-type query caches with group invalidation.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::repos::PostListPage;
use crate::application::session::{SessionEvent, SessionHub};
use crate::domain::entities::{AdminStats, CategoryRecord, PostRecord, ProfileRecord};

use super::config::CacheConfig;
use super::keys::{QueryGroup, QueryKey};
use super::store::QueryCache;

pub struct QueryCaches {
    pub post_pages: QueryCache<PostListPage>,
    pub posts: QueryCache<Option<PostRecord>>,
    pub categories: QueryCache<Vec<CategoryRecord>>,
    pub stats: QueryCache<AdminStats>,
    pub profiles: QueryCache<Option<ProfileRecord>>,
}

impl QueryCaches {
    pub fn new(config: &CacheConfig) -> Self {
        let lists = config.list_capacity_non_zero();
        let entries = config.entry_capacity_non_zero();
        Self {
            post_pages: QueryCache::new("post_pages", lists, config.enabled),
            posts: QueryCache::new("posts", entries, config.enabled),
            categories: QueryCache::new("categories", std::num::NonZeroUsize::MIN, config.enabled),
            stats: QueryCache::new("stats", std::num::NonZeroUsize::MIN, config.enabled),
            profiles: QueryCache::new("profiles", entries, config.enabled),
        }
    }

    /// Marks every cached query in `groups` stale.
    pub fn invalidate(&self, groups: &[QueryGroup]) {
        let matches = |key: &QueryKey| groups.iter().any(|group| key.belongs_to(*group));
        let marked = self.post_pages.invalidate_where(matches)
            + self.posts.invalidate_where(matches)
            + self.categories.invalidate_where(matches)
            + self.stats.invalidate_where(matches)
            + self.profiles.invalidate_where(matches);

        debug!(
            target = "blogdeck::cache::registry",
            groups = ?groups,
            marked,
            "invalidated cached queries"
        );
    }

    /// Keeps cached profiles in step with sign-in, sign-out and profile edits.
    pub fn follow_sessions(self: &Arc<Self>, hub: &SessionHub) -> JoinHandle<()> {
        let caches = Arc::clone(self);
        let mut events = hub.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let user_id = match &event {
                            SessionEvent::SignedIn(snapshot) => snapshot.user_id,
                            SessionEvent::SignedOut { user_id }
                            | SessionEvent::ProfileChanged { user_id } => *user_id,
                        };
                        caches.invalidate(&[QueryGroup::Profile(user_id)]);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            target = "blogdeck::cache::registry",
                            skipped, "session events lagged; dropping all cached profiles"
                        );
                        caches
                            .profiles
                            .invalidate_where(|key| matches!(key, QueryKey::Profile(_)));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for QueryCaches {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
