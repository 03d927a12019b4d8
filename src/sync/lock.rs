//! Keyed async mutex serializing mutations per logical entity.
//!
//! The movie and series pipelines can reconcile the same catalog ID
//! concurrently; routing every read-modify-write through
//! [`KeyedMutex::dispatch`] guarantees one in-flight mutation per key
//! process-wide. Keys are independent, so unrelated titles never block
//! each other.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct KeyedMutex<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `fut` while holding the mutex for `key`.
    ///
    /// Waiters on the same key run in submission order (tokio mutexes are
    /// FIFO). The lock is released even if `fut` returns an error or
    /// panics; the mutex entry itself is dropped once no other task holds
    /// a handle to it, so the map does not grow with key cardinality.
    pub async fn dispatch<F, T>(&self, key: K, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let guard = lock.lock().await;
        let out = fut.await;
        drop(guard);
        drop(lock);

        let mut locks = self.locks.lock().await;
        if let Some(entry) = locks.get(&key)
            && Arc::strong_count(entry) == 1
        {
            locks.remove(&key);
        }

        out
    }

    /// Number of keys currently tracked (contended or mid-flight).
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}
