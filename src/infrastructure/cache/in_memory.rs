//! In-memory byte cache implementation using moka

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache as MokaCache;
use moka::Expiry;

use crate::domain::cache::{ByteCache, CacheEntryOptions, ResolvedExpiration};
use crate::domain::CacheError;

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl InMemoryCacheConfig {
    /// Creates a new configuration with specified max capacity
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

/// Cache entry stored in moka
#[derive(Debug, Clone)]
struct StoredEntry {
    data: Arc<[u8]>,
    expiration: ResolvedExpiration,
}

/// Maps each entry's resolved expiration onto moka's per-entry timers
struct EntryExpiry;

impl Expiry<String, StoredEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.expiration.time_to_live(Utc::now())
    }

    fn expire_after_read(
        &self,
        _key: &String,
        value: &StoredEntry,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        match value.expiration.sliding {
            Some(_) => value.expiration.time_to_live(Utc::now()),
            None => duration_until_expiry,
        }
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.expiration.time_to_live(Utc::now())
    }
}

/// Thread-safe in-process byte cache backed by moka
///
/// Features:
/// - Absolute and sliding expiration per entry
/// - Size-bounded eviction when capacity is reached
/// - Priority hints are accepted and ignored
#[derive(Debug, Clone)]
pub struct InMemoryByteCache {
    cache: MokaCache<String, StoredEntry>,
    config: InMemoryCacheConfig,
}

impl InMemoryByteCache {
    /// Creates a new in-memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    /// Creates a new in-memory cache with the given configuration
    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self { cache, config }
    }

    pub fn config(&self) -> &InMemoryCacheConfig {
        &self.config
    }

    /// Approximate number of live entries
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for InMemoryByteCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteCache for InMemoryByteCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.cache.get(key).await.map(|entry| entry.data.to_vec()))
    }

    async fn set_bytes(
        &self,
        key: &str,
        value: &[u8],
        options: &CacheEntryOptions,
    ) -> Result<(), CacheError> {
        let entry = StoredEntry {
            data: Arc::from(value),
            expiration: options.resolve(Utc::now())?,
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn refresh(&self, key: &str) -> Result<(), CacheError> {
        // A read re-arms the sliding window
        self.cache.get(key).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}
