//! Per (user, symbol) execution lock
//!
//! Thin owner-token wrapper over a `LockStore`. Each attempt gets its own
//! uuid token, and release only deletes the key while that token still owns
//! it, so an attempt whose lock expired cannot free a later attempt's lock.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::storage::{LockStore, StorageError};

/// Lock key of a (user, symbol) pair
pub fn lock_key(user_id: &str, symbol: &str) -> String {
    format!("{}:{}", user_id, symbol)
}

/// A held lock; pass it back to `ExecutionLock::release`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockGuard {
    pub key: String,
    pub token: String,
}

#[derive(Clone)]
pub struct ExecutionLock {
    store: Arc<dyn LockStore>,
    ttl: Duration,
}

impl ExecutionLock {
    pub fn new(store: Arc<dyn LockStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// `Ok(None)` when another live attempt holds the pair
    pub async fn acquire(&self, user_id: &str, symbol: &str) -> Result<Option<LockGuard>, StorageError> {
        let key = lock_key(user_id, symbol);
        let token = Uuid::new_v4().to_string();
        if self.store.try_acquire(&key, &token, self.ttl).await? {
            debug!(key = %key, ttl_secs = self.ttl.as_secs(), "[LOCK] Acquired");
            Ok(Some(LockGuard { key, token }))
        } else {
            Ok(None)
        }
    }

    /// Compare-and-delete release; errors are logged, never propagated
    pub async fn release(&self, guard: &LockGuard) {
        match self.store.release(&guard.key, &guard.token).await {
            Ok(true) => debug!(key = %guard.key, "[LOCK] Released"),
            Ok(false) => warn!(key = %guard.key, "[LOCK] Lock expired or taken over before release"),
            Err(e) => warn!(key = %guard.key, error = %e, "[LOCK] Release failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryLockStore;

    fn lock(ttl: Duration) -> (ExecutionLock, Arc<MemoryLockStore>) {
        let store = Arc::new(MemoryLockStore::new());
        (ExecutionLock::new(store.clone(), ttl), store)
    }

    #[test]
    fn test_lock_key_format() {
        assert_eq!(lock_key("u1", "BTC"), "u1:BTC");
    }

    #[tokio::test]
    async fn test_second_acquire_is_refused() {
        let (lock, store) = lock(Duration::from_secs(300));
        let guard = lock.acquire("u1", "BTC").await.unwrap().unwrap();
        assert!(lock.acquire("u1", "BTC").await.unwrap().is_none());
        assert!(lock.acquire("u1", "ETH").await.unwrap().is_some());

        lock.release(&guard).await;
        assert!(!store.is_held("u1:BTC").await);
        assert!(lock.acquire("u1", "BTC").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_guard_does_not_release_newer_lock() {
        let (lock, store) = lock(Duration::from_secs(5));
        let stale = lock.acquire("u1", "BTC").await.unwrap().unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        let fresh = lock.acquire("u1", "BTC").await.unwrap().unwrap();
        assert_ne!(stale.token, fresh.token);

        lock.release(&stale).await;
        assert!(store.is_held("u1:BTC").await);
        lock.release(&fresh).await;
        assert!(!store.is_held("u1:BTC").await);
    }
}
