//! Process-wide keyed cache backing the cache-aside client layer.
//!
//! Entries are last-write-wins per key; staleness is bounded by the rolling
//! refresh in the client layer, so no locking beyond the pool map is needed.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Logical cache pools with independent default TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePool {
    Radarr,
    Sonarr,
    Tmdb,
}

impl CachePool {
    pub const ALL: [Self; 3] = [Self::Radarr, Self::Sonarr, Self::Tmdb];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Radarr => "radarr",
            Self::Sonarr => "sonarr",
            Self::Tmdb => "tmdb",
        }
    }

    const fn default_ttl(self) -> Duration {
        match self {
            // DVR item lists change every few minutes at most.
            Self::Radarr | Self::Sonarr => {
                Duration::from_secs(crate::constants::DEFAULT_CACHE_TTL_SECS)
            }
            // Metadata lookups are slow-changing.
            Self::Tmdb => Duration::from_secs(30 * 60),
        }
    }
}

impl fmt::Display for CachePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn remaining(&self, now: Instant) -> Duration {
        self.ttl
            .saturating_sub(now.saturating_duration_since(self.inserted_at))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CachePoolStats {
    pub pool: CachePool,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub struct CacheStore {
    pools: HashMap<CachePool, RwLock<HashMap<String, CacheEntry>>>,
}

impl CacheStore {
    #[must_use]
    pub fn new() -> Self {
        let mut pools = HashMap::new();
        for pool in CachePool::ALL {
            pools.insert(pool, RwLock::new(HashMap::new()));
        }
        Self { pools }
    }

    fn pool(&self, pool: CachePool) -> &RwLock<HashMap<String, CacheEntry>> {
        self.pools
            .get(&pool)
            .unwrap_or_else(|| unreachable!("pool map is populated for every variant"))
    }

    /// Returns the cached value for `key`, or `None` if absent or expired.
    pub async fn get(&self, pool: CachePool, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        let entries = self.pool(pool).read().await;
        let entry = entries.get(key)?;
        if entry.remaining(now).is_zero() {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Stores `value` under `key`, with the pool default TTL unless overridden.
    pub async fn set(
        &self,
        pool: CachePool,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) {
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
            ttl: ttl.unwrap_or_else(|| pool.default_ttl()),
        };
        self.pool(pool).write().await.insert(key.to_string(), entry);
    }

    /// Remaining lifetime of `key`, `None` if absent or already expired.
    pub async fn ttl_remaining(&self, pool: CachePool, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.pool(pool).read().await;
        let remaining = entries.get(key)?.remaining(now);
        if remaining.is_zero() { None } else { Some(remaining) }
    }

    pub async fn clear(&self, pool: CachePool) {
        self.pool(pool).write().await.clear();
    }

    pub async fn clear_all(&self) {
        for pool in CachePool::ALL {
            self.clear(pool).await;
        }
    }

    /// Drops expired entries so pool stats reflect live entries only.
    pub async fn evict_expired(&self, pool: CachePool) {
        let now = Instant::now();
        self.pool(pool)
            .write()
            .await
            .retain(|_, entry| !entry.remaining(now).is_zero());
    }

    pub async fn stats(&self) -> Vec<CachePoolStats> {
        let mut stats = Vec::with_capacity(CachePool::ALL.len());
        for pool in CachePool::ALL {
            self.evict_expired(pool).await;
            let entries = self.pool(pool).read().await.len();
            stats.push(CachePoolStats { pool, entries });
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = CacheStore::new();
        store
            .set(CachePool::Radarr, "k", serde_json::json!({"a": 1}), None)
            .await;
        let value = store.get(CachePool::Radarr, "k").await;
        assert_eq!(value, Some(serde_json::json!({"a": 1})));
    }

    #[tokio::test]
    async fn pools_are_independent() {
        let store = CacheStore::new();
        store
            .set(CachePool::Radarr, "k", serde_json::json!(1), None)
            .await;
        assert!(store.get(CachePool::Sonarr, "k").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = CacheStore::new();
        store
            .set(
                CachePool::Tmdb,
                "k",
                serde_json::json!(1),
                Some(Duration::from_secs(60)),
            )
            .await;
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get(CachePool::Tmdb, "k").await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get(CachePool::Tmdb, "k").await.is_none());
        assert!(store.ttl_remaining(CachePool::Tmdb, "k").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_remaining_counts_down() {
        let store = CacheStore::new();
        store
            .set(
                CachePool::Radarr,
                "k",
                serde_json::json!(1),
                Some(Duration::from_secs(100)),
            )
            .await;
        tokio::time::advance(Duration::from_secs(40)).await;
        let remaining = store
            .ttl_remaining(CachePool::Radarr, "k")
            .await
            .unwrap();
        assert_eq!(remaining, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn clear_empties_one_pool_only() {
        let store = CacheStore::new();
        store
            .set(CachePool::Radarr, "a", serde_json::json!(1), None)
            .await;
        store
            .set(CachePool::Tmdb, "b", serde_json::json!(2), None)
            .await;
        store.clear(CachePool::Radarr).await;
        assert!(store.get(CachePool::Radarr, "a").await.is_none());
        assert!(store.get(CachePool::Tmdb, "b").await.is_some());
    }
}
