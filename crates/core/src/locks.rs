//! In-process keyed locks for [`ConcurrencyMode::Serialized`](crate::ConcurrencyMode).
//!
//! One async mutex per key (a directory or a cache path), created on demand and dropped
//! again once nobody holds or waits for it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map of per-key async mutexes.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    inflight: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

/// Holds a key locked until dropped.
#[derive(Debug)]
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `key` is free and locks it.
    pub async fn lock(&self, key: &Path) -> KeyGuard {
        let entry = {
            let mut inflight = self.inflight.lock().await;
            // Entries whose only reference is the map are idle.
            inflight.retain(|_, lock| Arc::strong_count(lock) > 1);
            inflight
                .entry(key.to_path_buf())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        KeyGuard {
            _guard: entry.lock_owned().await,
        }
    }

    /// Number of keys currently tracked (held, waited for, or not yet pruned).
    pub async fn tracked(&self) -> usize {
        self.inflight.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(Path::new("/db/ITEMS/1001")).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock(Path::new("/a")).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(Path::new("/b"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_idle_keys_are_pruned() {
        let locks = KeyedLocks::new();
        drop(locks.lock(Path::new("/a")).await);
        drop(locks.lock(Path::new("/b")).await);
        // Locking prunes idle entries before inserting its own.
        let _c = locks.lock(Path::new("/c")).await;
        assert_eq!(locks.tracked().await, 1);
    }
}
