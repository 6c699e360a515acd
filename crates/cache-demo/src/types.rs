//! Response types for the cache demo service

use serde::Serialize;
use tiered_cache::CacheStats;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    /// Whether the distributed tier answered a ping
    pub remote: bool,
    pub cache: CacheStats,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
