//! Error types for the cache demo service

use std::fmt;

#[derive(Debug)]
pub enum DemoError {
    Cache(tiered_cache::CacheError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoError::Cache(err) => write!(f, "Cache error: {}", err),
            DemoError::Io(err) => write!(f, "IO error: {}", err),
            DemoError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for DemoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DemoError::Cache(err) => Some(err),
            DemoError::Io(err) => Some(err.as_ref()),
            DemoError::Config(_) => None,
        }
    }
}

impl From<tiered_cache::CacheError> for DemoError {
    fn from(err: tiered_cache::CacheError) -> Self {
        DemoError::Cache(err)
    }
}

impl From<std::io::Error> for DemoError {
    fn from(err: std::io::Error) -> Self {
        DemoError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for DemoError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        DemoError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DemoError>;
