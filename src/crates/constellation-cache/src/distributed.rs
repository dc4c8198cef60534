//! Distributed cache backend skeleton (spec §4.7, "Distributed backend").
//! Delegates storage to a pluggable network transport; the shape mirrors
//! the teacher's documented Redis/Postgres `CheckpointSaver` patterns,
//! generalized to an arbitrary byte-oriented transport.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{CacheBackend, CacheStats};
use crate::codec::{CacheCodec, JsonCodec};
use crate::entry::Entry;
use crate::error::Result;

/// What a distributed backend actually needs from the network: raw bytes
/// in, raw bytes out. A concrete implementation (Redis, memcached, a gRPC
/// side-car) provides this; `DistributedCacheBackend` provides everything
/// else (codec, TTL bookkeeping, corrupt-entry handling).
#[async_trait]
pub trait NetworkTransport: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct WireEntry {
    bytes: Vec<u8>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// A `CacheBackend` over an arbitrary `NetworkTransport`. No atomic
/// get-or-compute here: the default `CacheBackendExt::get_or_compute` is
/// get-then-set, accepting the thundering-herd window the spec allows.
pub struct DistributedCacheBackend<T: NetworkTransport> {
    transport: T,
    codec: Box<dyn CacheCodec>,
    stats: tokio::sync::Mutex<CacheStats>,
}

impl<T: NetworkTransport> DistributedCacheBackend<T> {
    pub fn new(transport: T) -> Self {
        DistributedCacheBackend { transport, codec: Box::new(JsonCodec), stats: tokio::sync::Mutex::new(CacheStats::default()) }
    }

    pub fn with_codec(transport: T, codec: Box<dyn CacheCodec>) -> Self {
        DistributedCacheBackend { transport, codec, stats: tokio::sync::Mutex::new(CacheStats::default()) }
    }
}

#[async_trait]
impl<T: NetworkTransport> CacheBackend for DistributedCacheBackend<T> {
    async fn get_bytes(&self, key: &str) -> Result<Option<Entry<Vec<u8>>>> {
        let raw = match self.transport.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.stats.lock().await.misses += 1;
                return Ok(None);
            }
            Err(_) => {
                self.stats.lock().await.misses += 1;
                return Ok(None);
            }
        };
        match self.codec.decode::<WireEntry>(&raw) {
            Ok(wire) => {
                self.stats.lock().await.hits += 1;
                Ok(Some(Entry { value: wire.bytes, created_at: wire.created_at, expires_at: wire.expires_at }))
            }
            Err(_) => {
                // Corrupt entry: delete it and report a miss (spec §4.7).
                let _ = self.transport.delete(key).await;
                self.stats.lock().await.misses += 1;
                Ok(None)
            }
        }
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let now = Utc::now();
        let wire = WireEntry { bytes: value, created_at: now, expires_at: now + ttl };
        let encoded = self.codec.encode(&wire)?;
        self.transport.set(key, encoded, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.transport.delete(key).await
    }

    async fn clear(&self) -> Result<()> {
        self.transport.clear().await
    }

    async fn stats(&self) -> CacheStats {
        *self.stats.lock().await
    }
}
