//! Two-tier cache with request coalescing
//!
//! Lookup order for [`HybridCache::get_or_create`]:
//!
//! ```text
//! local tier ──hit──▶ value
//!     │ miss
//!     ▼
//! in-flight table ──request running──▶ wait for the leader's result
//!     │ none (this caller leads)
//!     ▼
//! remote tier ──hit──▶ decode, fill local ──▶ value
//!     │ miss / undecodable
//!     ▼
//! producer ──▶ encode, fill remote (best-effort) and local ──▶ value
//! ```
//!
//! The leader's work runs on its own task, so a caller that gives up never
//! cancels the computation other callers are waiting on.

use crate::codec::Codec;
use crate::error::{CacheError, Result};
use crate::local::LocalTierCache;
use crate::remote::RemoteTierCache;
use crate::types::{CacheStats, Counters, EntryOptions, HybridOptions};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

type InFlight<V> = Shared<BoxFuture<'static, Result<V>>>;

struct Inner<V> {
    local: LocalTierCache<V>,
    remote: RemoteTierCache,
    codec: Arc<dyn Codec<V>>,
    in_flight: Mutex<HashMap<String, InFlight<V>>>,
    options: HybridOptions,
    counters: Arc<Counters>,
}

/// Local + remote cache behind one get-or-create call.
///
/// At most one computation per key runs at a time; every concurrent caller
/// for that key receives the same result, success or failure.
pub struct HybridCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for HybridCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> HybridCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        local: LocalTierCache<V>,
        remote: RemoteTierCache,
        codec: Arc<dyn Codec<V>>,
        options: HybridOptions,
    ) -> Self {
        Self::with_counters(local, remote, codec, options, Arc::new(Counters::default()))
    }

    pub(crate) fn with_counters(
        local: LocalTierCache<V>,
        remote: RemoteTierCache,
        codec: Arc<dyn Codec<V>>,
        options: HybridOptions,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                local,
                remote,
                codec,
                in_flight: Mutex::new(HashMap::new()),
                options,
                counters,
            }),
        }
    }

    /// [`get_or_create`](Self::get_or_create) with the configured default options
    pub async fn get_or_create_default<F, Fut>(&self, key: &str, producer: F) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let options = self.inner.options.default_entry;
        self.get_or_create(key, options, producer).await
    }

    /// Return the cached value for `key`, producing it at most once across
    /// all concurrent callers when neither tier has it.
    pub async fn get_or_create<F, Fut>(
        &self,
        key: &str,
        options: EntryOptions,
        producer: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if key.len() > self.inner.options.max_key_length {
            warn!(
                key_len = key.len(),
                max = self.inner.options.max_key_length,
                "Cache key too long, bypassing cache"
            );
            Counters::bump(&self.inner.counters.producer_calls);
            return producer().await;
        }

        if let Some(value) = self.inner.local.get(key).await {
            return Ok(value);
        }

        let flight = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.get(key) {
                Some(existing) => {
                    Counters::bump(&self.inner.counters.coalesced);
                    debug!(key, "Joining in-flight request");
                    existing.clone()
                }
                None => {
                    // A leader fills the local tier before unregistering, so a
                    // request that finished since our first check shows up here.
                    if let Some(value) = self.inner.local.peek(key).await {
                        return Ok(value);
                    }

                    let flight = self.lead(key.to_string(), options, producer);
                    in_flight.insert(key.to_string(), flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Write a value to both tiers
    pub async fn set(&self, key: &str, value: V, options: EntryOptions) -> Result<()> {
        self.inner.store(key, &value, options).await
    }

    /// Keys with a computation currently running
    pub async fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().await.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner
            .counters
            .snapshot(self.inner.local.entry_count())
    }

    pub fn options(&self) -> &HybridOptions {
        &self.inner.options
    }

    /// Spawn the leader computation and hand back a shareable handle to it
    fn lead<F, Fut>(&self, key: String, options: EntryOptions, producer: F) -> InFlight<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = match AssertUnwindSafe(inner.resolve(&key, options, producer))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    warn!(key = %key, "Cache computation panicked");
                    Err(CacheError::SourceFailure(
                        "cache computation panicked".to_string(),
                    ))
                }
            };
            // Unregister on every outcome so the next caller starts afresh
            inner.in_flight.lock().await.remove(&key);
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(CacheError::SourceFailure(format!(
                    "cache computation aborted: {e}"
                ))),
            }
        }
        .boxed()
        .shared()
    }
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn resolve<F, Fut>(&self, key: &str, options: EntryOptions, producer: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(payload) = self.remote.get(key).await? {
            match self.codec.decode(&payload) {
                Ok(value) => {
                    self.local
                        .insert(key, value.clone(), options.local_expiration)
                        .await;
                    return Ok(value);
                }
                Err(e) => {
                    // Overwritten below with the freshly produced value
                    warn!(key, error = %e, "Discarding undecodable remote payload");
                }
            }
        }

        Counters::bump(&self.counters.producer_calls);
        let value = producer().await?;

        self.store(key, &value, options).await?;
        Ok(value)
    }

    async fn store(&self, key: &str, value: &V, options: EntryOptions) -> Result<()> {
        let payload = self.codec.encode(value)?;
        if payload.len() > self.options.max_payload_bytes {
            warn!(
                key,
                size = payload.len(),
                max = self.options.max_payload_bytes,
                "Payload too large for remote cache, keeping local copy only"
            );
        } else {
            self.remote
                .set_best_effort(key, payload, options.expiration)
                .await;
        }

        self.local
            .insert(key, value.clone(), options.local_expiration)
            .await;
        Ok(())
    }
}
