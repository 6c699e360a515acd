//! Network-backed tier holding encoded payloads
//!
//! [`RemoteTierCache`] wraps any [`RemoteStore`]: [`RedisStore`] in
//! production, [`MemoryStore`] when no Redis is configured.

use crate::error::{CacheError, Result};
use crate::types::Counters;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Pool, Runtime};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A key → bytes store with per-entry expiry.
///
/// `get` returns `Ok(None)` only for a confirmed miss. Anything that prevents
/// an answer is an error.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<()>;
    async fn ping(&self) -> Result<()>;
}

/// Redis connection settings
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
    pub timeout_ms: u64,
    /// Prepended to every key
    pub instance_name: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 16,
            timeout_ms: 1000,
            instance_name: None,
        }
    }
}

/// Redis-backed store using a deadpool connection pool
pub struct RedisStore {
    pool: Pool,
    prefix: String,
}

impl RedisStore {
    /// Build the pool. No connection is opened until the first command.
    pub fn connect(config: &RedisConfig) -> Result<Self> {
        let timeout = Some(Duration::from_millis(config.timeout_ms));

        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = timeout;
        pool_config.timeouts.create = timeout;
        pool_config.timeouts.recycle = timeout;
        redis_config.pool = Some(pool_config);

        let pool = redis_config.create_pool(Some(Runtime::Tokio1))?;
        info!(url = %config.url, pool_size = config.pool_size, "Redis pool created");

        Ok(Self::from_pool(pool, config.instance_name.as_deref()))
    }

    pub fn from_pool(pool: Pool, instance_name: Option<&str>) -> Self {
        Self {
            pool,
            prefix: instance_name.unwrap_or_default().to_string(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await?;
        let payload: Option<Vec<u8>> = conn.get(self.full_key(key)).await?;
        Ok(payload)
    }

    async fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<()> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.pool.get().await?;
        conn.pset_ex::<_, _, ()>(self.full_key(key), payload, ttl_ms)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let _: () = deadpool_redis::redis::cmd("PING")
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

struct RemoteRecord {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// In-process stand-in for a distributed store
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, RemoteRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records, expired ones included until they are read
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let expired = {
            let records = self.records.read().await;
            match records.get(key) {
                Some(record) if Instant::now() < record.expires_at => {
                    return Ok(Some(record.payload.clone()));
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut records = self.records.write().await;
            // Re-check: a writer may have replaced it in between
            if records
                .get(key)
                .is_some_and(|record| Instant::now() >= record.expires_at)
            {
                records.remove(key);
            }
        }
        Ok(None)
    }

    async fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<()> {
        let record = RemoteRecord {
            payload,
            expires_at: Instant::now() + ttl,
        };
        self.records.write().await.insert(key.to_string(), record);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Remote tier: a [`RemoteStore`] plus logging and counters.
#[derive(Clone)]
pub struct RemoteTierCache {
    store: Arc<dyn RemoteStore>,
    counters: Arc<Counters>,
}

impl RemoteTierCache {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_counters(store, Arc::new(Counters::default()))
    }

    pub(crate) fn with_counters(store: Arc<dyn RemoteStore>, counters: Arc<Counters>) -> Self {
        Self { store, counters }
    }

    /// Read a payload. Communication failures propagate as
    /// [`CacheError::RemoteUnavailable`] rather than reading as a miss.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.store.get(key).await {
            Ok(Some(payload)) => {
                Counters::bump(&self.counters.remote_hits);
                debug!(key, size = payload.len(), "Remote cache hit");
                Ok(Some(payload))
            }
            Ok(None) => {
                Counters::bump(&self.counters.remote_misses);
                debug!(key, "Remote cache miss");
                Ok(None)
            }
            Err(e) => {
                Counters::bump(&self.counters.remote_errors);
                warn!(key, error = %e, "Remote cache read failed");
                Err(e)
            }
        }
    }

    /// Write a payload that expires `ttl` from now
    pub async fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(CacheError::Config(format!(
                "refusing to cache {key} with a zero TTL"
            )));
        }
        self.store.set(key, payload, ttl).await
    }

    /// Write a payload, logging instead of returning any failure
    pub async fn set_best_effort(&self, key: &str, payload: Vec<u8>, ttl: Duration) {
        match self.set(key, payload, ttl).await {
            Ok(()) => debug!(key, ttl_ms = ttl.as_millis() as u64, "Remote cache set"),
            Err(e) => {
                Counters::bump(&self.counters.remote_errors);
                warn!(key, error = %e, "Failed to write remote cache entry");
            }
        }
    }

    pub async fn is_available(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}
