//! Per-key async read/write locks.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// A map of independent `RwLock`s, one per key.
///
/// Different keys never contend. Entries nobody holds or waits on are pruned
/// when the next key is looked up.
#[derive(Debug)]
pub(crate) struct KeyedRwLock<K> {
    locks: Arc<Mutex<HashMap<K, Arc<RwLock<()>>>>>,
}

impl<K> Clone for KeyedRwLock<K> {
    fn clone(&self) -> Self {
        Self {
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<K> Default for KeyedRwLock<K> {
    fn default() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Copy> KeyedRwLock<K> {
    fn entry(&self, key: K) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Held guards and pending waiters each own a clone.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(key).or_default())
    }

    /// Wait until no reader or writer holds `key`.
    pub(crate) async fn write(&self, key: K) -> OwnedRwLockWriteGuard<()> {
        self.entry(key).write_owned().await
    }

    /// Wait until no writer holds `key`.
    pub(crate) async fn read(&self, key: K) -> OwnedRwLockReadGuard<()> {
        self.entry(key).read_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
