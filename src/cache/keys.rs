//! Query keys and invalidation groups.

use std::fmt;

use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::application::repos::{PostListScope, PostQueryFilter};

/// Identity of one cached remote query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    PostList {
        scope: PostListScope,
        filter: PostQueryFilter,
        window: PageWindow,
    },
    Post(Uuid),
    Categories,
    Stats,
    Profile(Uuid),
}

/// Set of keys a mutation makes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryGroup {
    /// Every listing page and every single-post read.
    Posts,
    Categories,
    Stats,
    Profile(Uuid),
}

impl QueryKey {
    pub fn belongs_to(&self, group: QueryGroup) -> bool {
        match (self, group) {
            (QueryKey::PostList { .. } | QueryKey::Post(_), QueryGroup::Posts) => true,
            (QueryKey::Categories, QueryGroup::Categories) => true,
            (QueryKey::Stats, QueryGroup::Stats) => true,
            (QueryKey::Profile(id), QueryGroup::Profile(target)) => *id == target,
            _ => false,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::PostList {
                scope,
                filter,
                window,
            } => write!(
                f,
                "post_list:{scope:?}:{}:{}:{}:{}",
                filter.category,
                filter.search.as_deref().unwrap_or(""),
                window.page(),
                window.size()
            ),
            QueryKey::Post(id) => write!(f, "post:{id}"),
            QueryKey::Categories => f.write_str("categories"),
            QueryKey::Stats => f.write_str("stats"),
            QueryKey::Profile(id) => write!(f, "profile:{id}"),
        }
    }
}
