//! Per-owner mutual exclusion for cart read-modify-write cycles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Idle entries are dropped once the registry grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Clone, Default)]
pub struct OwnerLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl OwnerLocks {
    /// Waits until no other task holds the lock for `owner_id`.
    pub async fn lock(&self, owner_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if map.len() > PRUNE_THRESHOLD {
                map.retain(|_, m| Arc::strong_count(m) > 1);
            }
            Arc::clone(map.entry(owner_id.to_string()).or_default())
        };
        slot.lock_owned().await
    }

    pub fn tracked(&self) -> usize { self.inner.lock().unwrap_or_else(PoisonError::into_inner).len() }
}

impl std::fmt::Debug for OwnerLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerLocks").field("tracked", &self.tracked()).finish()
    }
}
