//! One value source, three caching strategies
//!
//! Only the hybrid strategy coalesces concurrent misses. The local and remote
//! strategies let every missing caller hit the source, which keeps the
//! stampede behaviour of each strategy observable side by side.

use crate::codec::Codec;
use crate::error::Result;
use crate::hybrid::HybridCache;
use crate::local::{LocalTierCache, DEFAULT_MAX_CAPACITY};
use crate::remote::{RemoteStore, RemoteTierCache};
use crate::source::ValueSource;
use crate::types::{CacheStats, Counters, EntryOptions, HybridOptions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Which caching strategy serves a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Local,
    Remote,
    Hybrid,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown cache strategy: {other}")),
        }
    }
}

/// TTLs and bounds for [`CacheAside`]
#[derive(Debug, Clone)]
pub struct CacheAsideConfig {
    /// Expiration used by the local-only strategy
    pub local_ttl: Duration,
    /// Expiration used by the remote-only strategy
    pub remote_ttl: Duration,
    pub local_max_capacity: u64,
    /// Hybrid settings; `hybrid.default_entry` drives the hybrid strategy
    pub hybrid: HybridOptions,
}

impl Default for CacheAsideConfig {
    fn default() -> Self {
        Self {
            local_ttl: Duration::from_secs(10),
            remote_ttl: Duration::from_secs(10),
            local_max_capacity: DEFAULT_MAX_CAPACITY,
            hybrid: HybridOptions::default(),
        }
    }
}

/// Cache-aside access to a [`ValueSource`]
pub struct CacheAside<S: ValueSource> {
    source: Arc<S>,
    local: LocalTierCache<S::Value>,
    remote: RemoteTierCache,
    hybrid: HybridCache<S::Value>,
    codec: Arc<dyn Codec<S::Value>>,
    config: CacheAsideConfig,
    counters: Arc<Counters>,
}

impl<S: ValueSource> CacheAside<S> {
    /// Build the tiers. The remote store is shared by the remote-only and
    /// hybrid strategies; each of them keeps its own local tier.
    pub fn new(
        source: S,
        store: Arc<dyn RemoteStore>,
        codec: Arc<dyn Codec<S::Value>>,
        config: CacheAsideConfig,
    ) -> Self {
        let counters = Arc::new(Counters::default());
        let remote = RemoteTierCache::with_counters(store, counters.clone());
        let local = LocalTierCache::with_counters(config.local_max_capacity, counters.clone());
        let hybrid = HybridCache::with_counters(
            LocalTierCache::with_counters(config.local_max_capacity, counters.clone()),
            remote.clone(),
            codec.clone(),
            config.hybrid.clone(),
            counters.clone(),
        );

        Self {
            source: Arc::new(source),
            local,
            remote,
            hybrid,
            codec,
            config,
            counters,
        }
    }

    pub async fn get(&self, strategy: Strategy, key: &str) -> Result<S::Value> {
        match strategy {
            Strategy::Local => self.via_local(key).await,
            Strategy::Remote => self.via_remote(key).await,
            Strategy::Hybrid => self.via_hybrid(key).await,
        }
    }

    /// Local tier only
    pub async fn via_local(&self, key: &str) -> Result<S::Value> {
        self.local
            .get_or_create(key, self.config.local_ttl, || self.source.produce(key))
            .await
    }

    /// Remote tier only, cache-aside done by hand
    pub async fn via_remote(&self, key: &str) -> Result<S::Value> {
        if let Some(payload) = self.remote.get(key).await? {
            match self.codec.decode(&payload) {
                Ok(value) => return Ok(value),
                Err(e) => debug!(key, error = %e, "Remote payload undecodable, treating as miss"),
            }
        }

        Counters::bump(&self.counters.producer_calls);
        let value = self.source.produce(key).await?;
        let payload = self.codec.encode(&value)?;
        self.remote
            .set_best_effort(key, payload, self.config.remote_ttl)
            .await;
        Ok(value)
    }

    /// Both tiers with request coalescing
    pub async fn via_hybrid(&self, key: &str) -> Result<S::Value> {
        let source = Arc::clone(&self.source);
        let owned_key = key.to_string();
        self.hybrid
            .get_or_create(key, self.config.hybrid.default_entry, move || async move {
                source.produce(&owned_key).await
            })
            .await
    }

    pub fn hybrid(&self) -> &HybridCache<S::Value> {
        &self.hybrid
    }

    pub async fn remote_available(&self) -> bool {
        self.remote.is_available().await
    }

    /// Counters across all strategies; `local_entries` covers both local tiers
    pub fn stats(&self) -> CacheStats {
        let local_entries =
            self.local.entry_count() + self.hybrid.stats().local_entries;
        self.counters.snapshot(local_entries)
    }

    pub fn entry_options(&self) -> EntryOptions {
        self.config.hybrid.default_entry
    }
}
