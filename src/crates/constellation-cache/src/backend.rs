//! `CacheBackend`: the storage abstraction every cache implementation
//! plugs into (spec §4.7, "Backend interface"). Grounded on the teacher's
//! `CheckpointSaver` trait: an object-safe, `async_trait`-based interface
//! the host can swap a backend behind.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::codec::{CacheCodec, JsonCodec};
use crate::entry::Entry;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Byte-level storage interface. Kept generic-free so it stays object-safe
/// and backends can be held as `Arc<dyn CacheBackend>` in the registry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get_bytes(&self, key: &str) -> Result<Option<Entry<Vec<u8>>>>;
    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    async fn stats(&self) -> CacheStats;
}

/// Generic get/set/contains/get-or-compute built on top of the byte-level
/// trait, using a codec (JSON by default) to cross the type boundary.
#[async_trait]
pub trait CacheBackendExt: CacheBackend {
    async fn get<V: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<Entry<V>>> {
        self.get_with_codec(key, &JsonCodec).await
    }

    async fn set<V: Serialize + Send + Sync>(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.set_with_codec(key, value, ttl, &JsonCodec).await
    }

    async fn get_with_codec<V: DeserializeOwned + Send>(
        &self,
        key: &str,
        codec: &(dyn CacheCodec + Sync),
    ) -> Result<Option<Entry<V>>> {
        match self.get_bytes(key).await? {
            Some(entry) => {
                let value = codec.decode(&entry.value)?;
                Ok(Some(Entry { value, created_at: entry.created_at, expires_at: entry.expires_at }))
            }
            None => Ok(None),
        }
    }

    async fn set_with_codec<V: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: V,
        ttl: Duration,
        codec: &(dyn CacheCodec + Sync),
    ) -> Result<()> {
        let bytes = codec.encode(&value)?;
        self.set_bytes(key, bytes, ttl).await
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        match self.get_bytes(key).await {
            Ok(Some(entry)) => Ok(!entry.expired(Utc::now())),
            Ok(None) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Fetch `key`, or compute and store it via `compute` on a miss. Not
    /// atomic: concurrent misses may both run `compute` (spec §4.7 accepts
    /// this thundering-herd window explicitly for the distributed backend;
    /// the in-memory backend doesn't need atomicity either since it never
    /// promises single-flight semantics).
    async fn get_or_compute<V, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<V>
    where
        V: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = Result<V>> + Send,
    {
        if let Some(entry) = self.get::<V>(key).await? {
            if !entry.expired(Utc::now()) {
                return Ok(entry.value);
            }
        }
        let value = compute().await?;
        let bytes = JsonCodec.encode(&value)?;
        self.set_bytes(key, bytes, ttl).await?;
        Ok(value)
    }
}

impl<T: CacheBackend + ?Sized> CacheBackendExt for T {}
