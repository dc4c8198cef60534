//! Pluggable cache backends for Constellation: the value cache a module
//! call can be memoized against, and the compilation cache a pipeline
//! image is looked up from (spec §4.7).

mod backend;
mod codec;
mod distributed;
mod entry;
mod error;
mod memory;
mod registry;

pub use backend::{CacheBackend, CacheBackendExt, CacheStats};
pub use codec::{BincodeCodec, CacheCodec, JsonCodec};
pub use distributed::{DistributedCacheBackend, NetworkTransport};
pub use entry::Entry;
pub use error::{CacheError, Result};
pub use memory::InMemoryCacheBackend;
pub use registry::CacheRegistry;

/// Re-exported so callers don't need a direct `constellation-types`
/// dependency just to derive a key (spec §4.7, "Key derivation").
pub use constellation_types::canon::cache_key;
