//! In-memory LRU cache backend (spec §4.7, "In-memory backend"). Grounded
//! on the teacher's `InMemoryCheckpointSaver`: a `RwLock`-guarded map behind
//! an `Arc`, cheap to clone, safe to share across tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tokio::sync::Mutex as AsyncMutex;

use crate::backend::{CacheBackend, CacheStats};
use crate::entry::Entry;
use crate::error::Result;

struct StoredEntry {
    bytes: Vec<u8>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
}

struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Counters { hits: AtomicU64::new(0), misses: AtomicU64::new(0), evictions: AtomicU64::new(0) }
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Concurrent hash map plus last-access timestamps for LRU eviction, and a
/// hit/miss/eviction counter whose `stats()` snapshot is cached for 5
/// seconds (spec §4.7).
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<String, StoredEntry>>,
    counters: Counters,
    max_size: Option<usize>,
    cached_stats: AsyncMutex<Option<(DateTime<Utc>, CacheStats)>>,
}

const STATS_CACHE_TTL: Duration = Duration::seconds(5);

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        InMemoryCacheBackend {
            entries: RwLock::new(HashMap::new()),
            counters: Counters::new(),
            max_size: None,
            cached_stats: AsyncMutex::new(None),
        }
    }

    pub fn with_max_size(max_size: usize) -> Self {
        InMemoryCacheBackend { max_size: Some(max_size), ..Self::new() }
    }

    /// Removes every expired entry and invalidates the cached stats
    /// snapshot (spec §4.7, "explicit cleanup operation").
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            self.counters.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        }
        drop(entries);
        *self.cached_stats.lock().await = None;
    }

    async fn evict_lru_locked(&self, entries: &mut HashMap<String, StoredEntry>) {
        if let Some(max_size) = self.max_size {
            if entries.len() >= max_size {
                if let Some(victim) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_access)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&victim);
                    self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get_bytes(&self, key: &str) -> Result<Option<Entry<Vec<u8>>>> {
        let now = Utc::now();
        {
            let mut entries = self.entries.write().await;
            if let Some(stored) = entries.get_mut(key) {
                if stored.expires_at <= now {
                    entries.remove(key);
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
                stored.last_access = now;
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(Entry {
                    value: stored.bytes.clone(),
                    created_at: stored.created_at,
                    expires_at: stored.expires_at,
                }));
            }
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        if !entries.contains_key(key) {
            self.evict_lru_locked(&mut entries).await;
        }
        entries.insert(
            key.to_string(),
            StoredEntry { bytes: value, created_at: now, expires_at: now + ttl, last_access: now },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        *self.cached_stats.lock().await = None;
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let mut cached = self.cached_stats.lock().await;
        if let Some((stamped_at, stats)) = cached.as_ref() {
            if now - *stamped_at < STATS_CACHE_TTL {
                return *stats;
            }
        }
        let fresh = self.counters.snapshot();
        *cached = Some((now, fresh));
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CacheBackendExt;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let backend = InMemoryCacheBackend::new();
        backend.set("k", 42i64, Duration::seconds(10)).await.unwrap();
        let got = backend.get::<i64>("k").await.unwrap().unwrap();
        assert_eq!(got.value, 42);
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let backend = InMemoryCacheBackend::new();
        backend.set("k", 1i64, Duration::seconds(-1)).await.unwrap();
        assert!(backend.get::<i64>("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn over_capacity_insert_evicts_lru() {
        let backend = InMemoryCacheBackend::with_max_size(1);
        backend.set("a", 1i64, Duration::seconds(60)).await.unwrap();
        backend.set("b", 2i64, Duration::seconds(60)).await.unwrap();
        assert!(backend.get::<i64>("a").await.unwrap().is_none());
        assert!(backend.get::<i64>("b").await.unwrap().is_some());
        assert_eq!(backend.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn hit_and_miss_counters_update() {
        let backend = InMemoryCacheBackend::new();
        backend.set("k", 1i64, Duration::seconds(60)).await.unwrap();
        let _ = backend.get::<i64>("k").await.unwrap();
        let _ = backend.get::<i64>("missing").await.unwrap();
        let stats = backend.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}
