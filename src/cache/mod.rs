//! Query cache for remote reads.
//!
//! Reads of listings, posts, categories, statistics and profiles go through a
//! [`QueryCache`] keyed by [`QueryKey`]. Mutations call
//! [`QueryCaches::invalidate`] with the [`QueryGroup`]s they affect.
//!
//! ```toml
//! [cache]
//! enabled = true
//! list_capacity = 64
//! entry_capacity = 256
//! ```

mod config;
mod keys;
mod lock;
mod registry;
mod store;

pub use config::CacheConfig;
pub use keys::{QueryGroup, QueryKey};
pub use registry::QueryCaches;
pub use store::QueryCache;
