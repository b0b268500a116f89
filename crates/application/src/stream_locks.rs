use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// In-process locks keyed by aggregate identity.
///
/// Every command against the same identity must be evaluated strictly
/// sequentially, because each decision depends on the full prior event
/// history being folded first. Commands against different identities run
/// in parallel.
#[derive(Clone, Default)]
pub struct StreamLocks {
    // TODO: entries are never evicted; long-lived processes handling many
    // identities should reclaim released locks.
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl StreamLocks {
    /// Creates an empty lock registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for one aggregate identity, creating it on
    /// first use. The returned guard releases the lock on drop.
    pub async fn acquire(&self, key: impl Into<String>) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.into()).or_default())
        };

        lock.lock_owned().await
    }
}
