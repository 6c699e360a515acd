//! Read-through caching over a slow value source
//!
//! Three strategies over the same [`ValueSource`]:
//!
//! - **local**: in-process [`LocalTierCache`] (moka), typed values, no coalescing
//! - **remote**: [`RemoteTierCache`] over Redis or an in-memory store, values
//!   encoded with a [`Codec`], no coalescing
//! - **hybrid**: [`HybridCache`], local in front of remote with at most one
//!   computation per key in flight
//!
//! [`CacheAside`] exposes all three behind one type.

mod codec;
mod error;
mod facade;
mod hybrid;
mod local;
mod remote;
mod source;
mod types;

pub use codec::{Codec, JsonCodec, Utf8Codec};
pub use error::{CacheError, Result};
pub use facade::{CacheAside, CacheAsideConfig, Strategy};
pub use hybrid::HybridCache;
pub use local::{LocalTierCache, DEFAULT_MAX_CAPACITY};
pub use remote::{MemoryStore, RedisConfig, RedisStore, RemoteStore, RemoteTierCache};
pub use source::ValueSource;
pub use types::{CacheStats, EntryOptions, HybridOptions};
