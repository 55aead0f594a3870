//! Per-point and per-provider mutual exclusion.
//!
//! Every read-modify-write of a queue and the owner of its point runs while
//! holding that point's lock. Assignments that are checked against a
//! provider's capacity also hold the provider's lock, taken before any
//! point lock. Operations on different keys never contend.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use netalloc_domain::id::{NetworkPointId, ProviderId};

/// Registry of one async mutex per key.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

/// One lock per network point.
pub type PointLocks = KeyedLocks<NetworkPointId>;

/// One lock per provider.
pub type ProviderLocks = KeyedLocks<ProviderId>;

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Copy + Eq + Hash> KeyedLocks<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// The guard releases the lock when dropped. Lock entries are dropped
    /// from the registry once nobody holds or awaits them.
    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            Arc::clone(locks.entry(key).or_default())
        };
        mutex.lock_owned().await
    }
}
