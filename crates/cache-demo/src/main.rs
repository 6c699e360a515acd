//! Cache demo - compares local, distributed and hybrid caching
//!
//! Serves the same slow "current time" value through three routes, one per
//! caching strategy, so their hit, miss and stampede behaviour can be
//! compared side by side.

mod config;
mod error;
mod server;
mod source;
mod types;

use crate::config::Config;
use crate::error::{DemoError, Result};
use crate::server::{start_server, ServerState, SharedState};
use crate::source::SlowClock;
use std::sync::Arc;
use tiered_cache::{CacheAside, MemoryStore, RedisStore, RemoteStore, Utf8Codec};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("cache_demo=info".parse()?)
        .add_directive("tiered_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting cache demo...");

    let config = Config::from_env();
    info!("Port: {}", config.port);
    info!(
        "Cache TTL: {} seconds (local {} seconds)",
        config.cache_ttl_secs, config.local_cache_ttl_secs
    );
    info!("Source delay: {} ms", config.source_delay_ms);

    let store = build_store(&config).await?;
    let cache = CacheAside::new(
        SlowClock::new(config.source_delay()),
        store,
        Arc::new(Utf8Codec),
        config.cache(),
    );

    let state: SharedState = Arc::new(ServerState::new(cache));

    start_server(state, config.port)
        .await
        .map_err(|e| DemoError::Config(format!("Server error: {}", e)))?;

    info!("Cache demo stopped");
    Ok(())
}

/// Redis when `REDIS_URL` is set, otherwise an in-process store
async fn build_store(config: &Config) -> Result<Arc<dyn RemoteStore>> {
    let Some(redis) = config.redis() else {
        info!("REDIS_URL not set, using in-memory distributed store");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let store = RedisStore::connect(&redis)?;
    match store.ping().await {
        Ok(()) => info!(url = %redis.url, "Connected to Redis"),
        Err(e) => warn!(
            url = %redis.url,
            error = %e,
            "Redis not reachable yet, distributed routes will report it"
        ),
    }
    Ok(Arc::new(store))
}
