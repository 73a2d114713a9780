//! Single-flight query cache.
//!
//! Each [`QueryCache`] holds the last successful result per [`QueryKey`] in an
//! LRU map and keeps at most one remote fetch in flight per key. Concurrent
//! readers of a missing or stale key await the same shared fetch.
//!
//! Invalidation marks entries stale instead of dropping them, so callers can
//! still fall back to the previous result when a refresh fails. Every
//! invalidation bumps an epoch; a fetch that started before the bump stores
//! its result as stale.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use metrics::counter;
use tracing::debug;

use crate::application::repos::RepoError;

use super::keys::QueryKey;
use super::lock::lock_recovering;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, RepoError>>>;

struct Entry<V> {
    value: V,
    stale: bool,
}

struct InFlight<V> {
    id: u64,
    fetch: SharedFetch<V>,
}

struct Inner<V> {
    name: &'static str,
    enabled: bool,
    entries: Mutex<LruCache<QueryKey, Entry<V>>>,
    in_flight: Mutex<HashMap<QueryKey, InFlight<V>>>,
    epoch: AtomicU64,
    next_fetch_id: AtomicU64,
}

pub struct QueryCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, capacity: NonZeroUsize, enabled: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                enabled,
                entries: Mutex::new(LruCache::new(capacity)),
                in_flight: Mutex::new(HashMap::new()),
                epoch: AtomicU64::new(0),
                next_fetch_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Returns the fresh cached value for `key`, or runs `fetch` once for all
    /// concurrent callers and caches a successful result.
    pub async fn get_or_fetch<F, Fut>(&self, key: QueryKey, fetch: F) -> Result<V, RepoError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, RepoError>> + Send + 'static,
    {
        if !self.inner.enabled {
            return fetch().await;
        }

        let shared = {
            let mut in_flight = lock_recovering(&self.inner.in_flight, self.inner.name, "fetch");

            if let Some(value) = self.inner.fresh(&key) {
                counter!("blogdeck_query_cache_hit_total", "cache" => self.inner.name)
                    .increment(1);
                return Ok(value);
            }

            match in_flight.get(&key) {
                Some(existing) => {
                    counter!("blogdeck_query_cache_coalesced_total", "cache" => self.inner.name)
                        .increment(1);
                    debug!(
                        target = "blogdeck::cache::store",
                        cache = self.inner.name,
                        key = %key,
                        "joining in-flight query"
                    );
                    existing.fetch.clone()
                }
                None => {
                    counter!("blogdeck_query_cache_miss_total", "cache" => self.inner.name)
                        .increment(1);
                    let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                    let started_at = self.inner.epoch.load(Ordering::SeqCst);
                    let inner = Arc::clone(&self.inner);
                    let task_key = key.clone();
                    let remote = fetch();
                    let fetch = async move {
                        let result = remote.await;
                        inner.complete(&task_key, id, started_at, &result);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(
                        key,
                        InFlight {
                            id,
                            fetch: fetch.clone(),
                        },
                    );
                    fetch
                }
            }
        };

        shared.await
    }

    /// Last stored value for `key`, fresh or stale.
    pub fn peek(&self, key: &QueryKey) -> Option<V> {
        let mut entries = lock_recovering(&self.inner.entries, self.inner.name, "peek");
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        self.inner.fresh(key).is_some()
    }

    /// Marks matching entries stale and detaches matching in-flight fetches so
    /// the next read starts a new request. Returns the number of entries marked.
    pub fn invalidate_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&QueryKey) -> bool,
    {
        let marked = {
            let mut entries = lock_recovering(&self.inner.entries, self.inner.name, "invalidate");
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            let mut marked = 0;
            for (key, entry) in entries.iter_mut() {
                if !entry.stale && predicate(key) {
                    entry.stale = true;
                    marked += 1;
                }
            }
            marked
        };

        lock_recovering(&self.inner.in_flight, self.inner.name, "invalidate")
            .retain(|key, _| !predicate(key));

        if marked > 0 {
            counter!("blogdeck_query_cache_invalidated_total", "cache" => self.inner.name)
                .increment(marked as u64);
        }
        marked
    }

    pub fn len(&self) -> usize {
        lock_recovering(&self.inner.entries, self.inner.name, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Inner<V>
where
    V: Clone,
{
    fn fresh(&self, key: &QueryKey) -> Option<V> {
        let mut entries = lock_recovering(&self.entries, self.name, "fresh");
        entries
            .get(key)
            .filter(|entry| !entry.stale)
            .map(|entry| entry.value.clone())
    }

    fn complete(&self, key: &QueryKey, id: u64, started_at: u64, result: &Result<V, RepoError>) {
        if let Ok(value) = result {
            let mut entries = lock_recovering(&self.entries, self.name, "complete");
            let stale = self.epoch.load(Ordering::SeqCst) != started_at;
            let newer_fresh = entries.peek(key).is_some_and(|entry| !entry.stale);
            if !(stale && newer_fresh) {
                if entries.len() == entries.cap().get() && !entries.contains(key) {
                    counter!("blogdeck_query_cache_evict_total", "cache" => self.name)
                        .increment(1);
                }
                entries.put(
                    key.clone(),
                    Entry {
                        value: value.clone(),
                        stale,
                    },
                );
            }
        }

        let mut in_flight = lock_recovering(&self.in_flight, self.name, "complete");
        if in_flight.get(key).is_some_and(|entry| entry.id == id) {
            in_flight.remove(key);
        }
    }
}
