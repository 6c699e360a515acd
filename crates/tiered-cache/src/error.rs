use std::fmt;

/// Errors surfaced by the cache tiers and the orchestrator.
///
/// `Clone` so a single leader failure can be handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The value source could not produce a value
    SourceFailure(String),
    /// Communication with the remote tier failed
    RemoteUnavailable(String),
    /// A value could not be encoded, or a payload could not be decoded
    Serialization(String),
    /// Invalid cache configuration
    Config(String),
}

impl CacheError {
    /// Wrap any displayable error as a source failure
    pub fn source_failure(err: impl fmt::Display) -> Self {
        Self::SourceFailure(err.to_string())
    }

    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceFailure(msg) => write!(f, "Value source failed: {msg}"),
            Self::RemoteUnavailable(msg) => write!(f, "Remote cache unavailable: {msg}"),
            Self::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<deadpool_redis::redis::RedisError> for CacheError {
    fn from(err: deadpool_redis::redis::RedisError) -> Self {
        Self::RemoteUnavailable(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::RemoteUnavailable(err.to_string())
    }
}

impl From<deadpool_redis::CreatePoolError> for CacheError {
    fn from(err: deadpool_redis::CreatePoolError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
