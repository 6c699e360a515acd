//! In-process tier holding typed values

use crate::error::Result;
use crate::types::{CacheStats, Counters};
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

#[derive(Clone)]
struct LocalEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> LocalEntry<V> {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Key → value store with per-entry absolute expiration.
///
/// Expired entries read as absent and are replaced by the next write to the
/// same key; nothing sweeps them. Concurrent misses on the same key each call
/// their producer.
#[derive(Clone)]
pub struct LocalTierCache<V> {
    entries: Cache<String, LocalEntry<V>>,
    counters: Arc<Counters>,
}

impl<V> LocalTierCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64) -> Self {
        Self::with_counters(max_capacity, Arc::new(Counters::default()))
    }

    pub(crate) fn with_counters(max_capacity: u64, counters: Arc<Counters>) -> Self {
        let entries = Cache::builder().max_capacity(max_capacity).build();
        Self { entries, counters }
    }

    /// Get a live value, if any
    pub async fn get(&self, key: &str) -> Option<V> {
        match self.entries.get(key).await {
            Some(entry) if !entry.is_expired() => {
                Counters::bump(&self.counters.local_hits);
                debug!(key, "Local cache hit");
                Some(entry.value)
            }
            Some(_) => {
                Counters::bump(&self.counters.local_misses);
                debug!(key, "Local cache entry expired");
                None
            }
            None => {
                Counters::bump(&self.counters.local_misses);
                None
            }
        }
    }

    /// Like [`get`](Self::get) but leaves the hit/miss counters alone
    pub(crate) async fn peek(&self, key: &str) -> Option<V> {
        self.entries
            .get(key)
            .await
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value)
    }

    /// Store a value that expires `ttl` from now
    pub async fn insert(&self, key: &str, value: V, ttl: Duration) {
        let entry = LocalEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), entry).await;
    }

    /// Return the live value for `key`, or produce, store and return a new one
    pub async fn get_or_create<F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        Counters::bump(&self.counters.producer_calls);
        let value = producer().await?;
        self.insert(key, value.clone(), ttl).await;
        Ok(value)
    }

    /// Number of stored entries, expired ones included until overwritten
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entry_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_hit_skips_producer() {
        let cache = LocalTierCache::new(100);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_create("current-time", Duration::from_secs(10), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("12:00:00".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "12:00:00");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.local_hits, 2);
        assert_eq!(stats.local_misses, 1);
        assert_eq!(stats.producer_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_reads_as_miss() {
        let cache = LocalTierCache::new(100);
        cache
            .insert("k", "old".to_string(), Duration::from_secs(10))
            .await;

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("old"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k").await, None);

        let value = cache
            .get_or_create("k", Duration::from_secs(10), || async {
                Ok("new".to_string())
            })
            .await
            .unwrap();
        assert_eq!(value, "new");
        assert_eq!(cache.get("k").await.as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_entry_ttl() {
        let cache = LocalTierCache::new(100);
        cache.insert("short", 1u32, Duration::from_secs(1)).await;
        cache.insert("long", 2u32, Duration::from_secs(60)).await;

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get("long").await, Some(2));
    }

    #[tokio::test]
    async fn test_producer_error_is_not_cached() {
        let cache: LocalTierCache<String> = LocalTierCache::new(100);

        let result = cache
            .get_or_create("k", Duration::from_secs(10), || async {
                Err(CacheError::SourceFailure("boom".to_string()))
            })
            .await;
        assert_eq!(result, Err(CacheError::SourceFailure("boom".to_string())));
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_each_call_producer() {
        let cache = LocalTierCache::new(100);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_create("k", Duration::from_secs(10), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(3)).await;
                        Ok::<_, CacheError>(7u64)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 7);
        }

        // No stampede protection in the local tier
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
