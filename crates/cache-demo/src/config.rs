use std::env;
use std::str::FromStr;
use std::time::Duration;
use tiered_cache::{CacheAsideConfig, EntryOptions, HybridOptions, RedisConfig};

/// Service configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Unset means the distributed tier is an in-process store
    pub redis_url: Option<String>,
    pub redis_pool_size: usize,
    pub redis_timeout_ms: u64,
    pub instance_name: Option<String>,
    pub cache_ttl_secs: u64,
    pub local_cache_ttl_secs: u64,
    pub local_max_capacity: u64,
    pub source_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            redis_url: None,
            redis_pool_size: 16,
            redis_timeout_ms: 1000,
            instance_name: None,
            cache_ttl_secs: 10,
            local_cache_ttl_secs: 10,
            local_max_capacity: tiered_cache::DEFAULT_MAX_CAPACITY,
            source_delay_ms: 3000,
        }
    }
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            redis_pool_size: parse_var(&lookup, "REDIS_POOL_SIZE")
                .unwrap_or(defaults.redis_pool_size),
            redis_timeout_ms: parse_var(&lookup, "REDIS_TIMEOUT_MS")
                .unwrap_or(defaults.redis_timeout_ms),
            instance_name: lookup("CACHE_INSTANCE_NAME").filter(|name| !name.is_empty()),
            cache_ttl_secs: parse_var(&lookup, "CACHE_TTL_SECS")
                .unwrap_or(defaults.cache_ttl_secs),
            local_cache_ttl_secs: parse_var(&lookup, "LOCAL_CACHE_TTL_SECS")
                .unwrap_or(defaults.local_cache_ttl_secs),
            local_max_capacity: parse_var(&lookup, "LOCAL_CACHE_MAX_CAPACITY")
                .unwrap_or(defaults.local_max_capacity),
            source_delay_ms: parse_var(&lookup, "SOURCE_DELAY_MS")
                .unwrap_or(defaults.source_delay_ms),
        }
    }

    pub fn redis(&self) -> Option<RedisConfig> {
        self.redis_url.as_ref().map(|url| RedisConfig {
            url: url.clone(),
            pool_size: self.redis_pool_size,
            timeout_ms: self.redis_timeout_ms,
            instance_name: self.instance_name.clone(),
        })
    }

    pub fn cache(&self) -> CacheAsideConfig {
        let remote_ttl = Duration::from_secs(self.cache_ttl_secs);
        let local_ttl = Duration::from_secs(self.local_cache_ttl_secs);

        CacheAsideConfig {
            local_ttl,
            remote_ttl,
            local_max_capacity: self.local_max_capacity,
            hybrid: HybridOptions {
                default_entry: EntryOptions::new(remote_ttl, local_ttl),
                ..Default::default()
            },
        }
    }

    pub fn source_delay(&self) -> Duration {
        Duration::from_millis(self.source_delay_ms)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_env() {
        let config = from_pairs(&[]);
        assert_eq!(config.port, 5000);
        assert!(config.redis_url.is_none());
        assert!(config.redis().is_none());
        assert_eq!(config.cache_ttl_secs, 10);
        assert_eq!(config.local_cache_ttl_secs, 10);
        assert_eq!(config.source_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_reads_redis_settings() {
        let config = from_pairs(&[
            ("REDIS_URL", "redis://cache:6379"),
            ("REDIS_POOL_SIZE", "4"),
            ("CACHE_INSTANCE_NAME", "demo:"),
        ]);

        let redis = config.redis().unwrap();
        assert_eq!(redis.url, "redis://cache:6379");
        assert_eq!(redis.pool_size, 4);
        assert_eq!(redis.timeout_ms, 1000);
        assert_eq!(redis.instance_name.as_deref(), Some("demo:"));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = from_pairs(&[("PORT", "eighty"), ("CACHE_TTL_SECS", "-1")]);
        assert_eq!(config.port, 5000);
        assert_eq!(config.cache_ttl_secs, 10);
    }

    #[test]
    fn test_independent_ttls() {
        let config = from_pairs(&[("CACHE_TTL_SECS", "60"), ("LOCAL_CACHE_TTL_SECS", "5")]);
        let cache = config.cache();
        assert_eq!(cache.remote_ttl, Duration::from_secs(60));
        assert_eq!(cache.local_ttl, Duration::from_secs(5));
        assert_eq!(cache.hybrid.default_entry.expiration, Duration::from_secs(60));
        assert_eq!(
            cache.hybrid.default_entry.local_expiration,
            Duration::from_secs(5)
        );
    }
}
