//! Cache types

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const DEFAULT_EXPIRATION_SECS: u64 = 10;
const DEFAULT_MAX_KEY_LENGTH: usize = 1024;
const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Per-entry expiration for the two tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryOptions {
    /// Lifetime of the remote (authoritative) copy
    pub expiration: Duration,
    /// Lifetime of the in-process copy
    pub local_expiration: Duration,
}

impl EntryOptions {
    pub fn new(expiration: Duration, local_expiration: Duration) -> Self {
        Self {
            expiration,
            local_expiration,
        }
    }
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            expiration: Duration::from_secs(DEFAULT_EXPIRATION_SECS),
            local_expiration: Duration::from_secs(DEFAULT_EXPIRATION_SECS),
        }
    }
}

/// Settings for the hybrid orchestrator
#[derive(Debug, Clone)]
pub struct HybridOptions {
    pub default_entry: EntryOptions,
    /// Keys longer than this bypass both tiers
    pub max_key_length: usize,
    /// Encoded payloads larger than this stay local only
    pub max_payload_bytes: usize,
}

impl Default for HybridOptions {
    fn default() -> Self {
        Self {
            default_entry: EntryOptions::default(),
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Snapshot of cache activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub local_entries: u64,
    pub local_hits: u64,
    pub local_misses: u64,
    pub remote_hits: u64,
    pub remote_misses: u64,
    pub remote_errors: u64,
    pub producer_calls: u64,
    pub coalesced: u64,
}

/// Shared counters behind [`CacheStats`]
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub local_hits: AtomicU64,
    pub local_misses: AtomicU64,
    pub remote_hits: AtomicU64,
    pub remote_misses: AtomicU64,
    pub remote_errors: AtomicU64,
    pub producer_calls: AtomicU64,
    pub coalesced: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, local_entries: u64) -> CacheStats {
        CacheStats {
            local_entries,
            local_hits: self.local_hits.load(Ordering::Relaxed),
            local_misses: self.local_misses.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            remote_misses: self.remote_misses.load(Ordering::Relaxed),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            producer_calls: self.producer_calls.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}
