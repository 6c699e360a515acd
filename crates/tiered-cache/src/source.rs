use crate::error::Result;
use async_trait::async_trait;

/// A slow, cache-unaware producer of values.
///
/// The cache never imposes a timeout on `produce`; callers that need one wrap
/// the whole lookup.
#[async_trait]
pub trait ValueSource: Send + Sync + 'static {
    type Value: Clone + Send + Sync + 'static;

    async fn produce(&self, key: &str) -> Result<Self::Value>;
}
