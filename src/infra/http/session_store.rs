//! In-process session store with a size bound.
//!
//! Records live in an LRU map: the least recently used session is dropped once
//! the store is full, and expired records are removed when they are next read.
//! Sessions do not survive a restart.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower_sessions::SessionStore;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store;
use tracing::debug;

#[derive(Clone)]
pub struct BoundedMemoryStore {
    records: Arc<Mutex<LruCache<Id, Record>>>,
}

impl BoundedMemoryStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            records: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

impl fmt::Debug for BoundedMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedMemoryStore").finish_non_exhaustive()
    }
}

fn is_active(expiry_date: OffsetDateTime) -> bool {
    expiry_date > OffsetDateTime::now_utc()
}

#[async_trait]
impl SessionStore for BoundedMemoryStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let mut records = self.records.lock().await;
        while records.contains(&record.id) {
            record.id = Id::default();
        }
        if records.push(record.id, record.clone()).is_some() {
            debug!(
                target = "blogdeck::http::session_store",
                capacity = records.cap().get(),
                "evicted least recently used session"
            );
        }
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.records.lock().await.put(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let mut records = self.records.lock().await;
        let expired = match records.get(session_id) {
            Some(record) if is_active(record.expiry_date) => return Ok(Some(record.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            records.pop(session_id);
        }
        Ok(None)
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.records.lock().await.pop(session_id);
        Ok(())
    }
}
