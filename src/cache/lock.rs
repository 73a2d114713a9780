use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Locks `lock`, recovering the guard if a holder panicked.
pub(crate) fn lock_recovering<'a, T>(
    lock: &'a Mutex<T>,
    cache: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!(
            target = "blogdeck::cache::lock",
            cache,
            op,
            result = "poisoned_recovered",
            "Recovered from poisoned query cache lock"
        );
        poisoned.into_inner()
    })
}
