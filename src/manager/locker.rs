//! Per-key read/write locks.
//!
//! A registry of independent async rwlocks, one per cache key, created
//! lazily on first use. Operations on distinct keys never contend with
//! each other; only the short registry lookup is shared.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock as AsyncRwLock};

use super::provider::CacheKey;

/// Registry of per-key async read/write locks.
///
/// The registry map is guarded by one synchronous rwlock held only for
/// the lookup; per-key locks are created with a double-checked lookup so
/// the registry write lock is taken only to insert a missing entry.
/// Guards are owned and may be held across await points.
#[derive(Default)]
pub struct Locker {
    locks: RwLock<HashMap<CacheKey, Arc<AsyncRwLock<()>>>>,
}

impl Locker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the write lock for `key`, creating the lock if absent.
    pub async fn write(&self, key: &CacheKey) -> OwnedRwLockWriteGuard<()> {
        self.entry(key).write_owned().await
    }

    /// Acquire the read lock for `key`, creating the lock if absent.
    pub async fn read(&self, key: &CacheKey) -> OwnedRwLockReadGuard<()> {
        self.entry(key).read_owned().await
    }

    /// Drop the lock entry for `key`.
    ///
    /// Outstanding guards stay valid — they hold their own reference to
    /// the lock. A later acquisition for the same key creates a fresh
    /// entry, so release only keys whose cached state is gone.
    pub fn release(&self, key: &CacheKey) {
        self.locks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn entry(&self, key: &CacheKey) -> Arc<AsyncRwLock<()>> {
        {
            let locks = self.locks.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(lock) = locks.get(key) {
                return Arc::clone(lock);
            }
        }

        let mut locks = self.locks.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncRwLock::new(()))),
        )
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(s: &str) -> CacheKey {
        CacheKey::from(s)
    }

    #[tokio::test]
    async fn lock_is_created_lazily() {
        let locker = Locker::new();
        assert_eq!(locker.len(), 0);

        let guard = locker.write(&key("a")).await;
        assert_eq!(locker.len(), 1);
        drop(guard);

        // Re-locking the same key reuses the entry.
        let _guard = locker.read(&key("a")).await;
        assert_eq!(locker.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_readers_share_the_lock() {
        let locker = Locker::new();
        let r1 = locker.read(&key("a")).await;
        let r2 = locker.read(&key("a")).await;
        drop(r1);
        drop(r2);
    }

    #[tokio::test]
    async fn writer_excludes_same_key_only() {
        let locker = Arc::new(Locker::new());
        let held = locker.write(&key("a")).await;

        // Another writer on the same key must wait...
        let contended = {
            let locker = Arc::clone(&locker);
            tokio::spawn(async move {
                let _guard = locker.write(&key("a")).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contended.is_finished());

        // ...while a different key proceeds immediately.
        let _other = tokio::time::timeout(Duration::from_millis(100), locker.write(&key("b")))
            .await
            .expect("independent key should not block");

        drop(held);
        contended.await.expect("writer task panicked");
    }

    #[tokio::test]
    async fn release_drops_the_entry() {
        let locker = Locker::new();
        let guard = locker.write(&key("a")).await;
        locker.release(&key("a"));
        assert_eq!(locker.len(), 0);

        // The outstanding guard is unaffected.
        drop(guard);

        let _guard = locker.write(&key("a")).await;
        assert_eq!(locker.len(), 1);
    }
}
