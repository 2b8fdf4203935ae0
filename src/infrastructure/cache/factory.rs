//! Cache factory for runtime selection

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::domain::cache::ByteCache;
use crate::domain::CacheError;

use super::in_memory::{InMemoryByteCache, InMemoryCacheConfig};
use super::redis::{RedisByteCache, RedisCacheConfig};

/// Supported cache types
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum CacheType {
    /// In-memory cache using moka
    #[default]
    InMemory,
    /// Redis cache
    Redis,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheType::InMemory => write!(f, "in_memory"),
            CacheType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for CacheType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheType::InMemory),
            "redis" => Ok(CacheType::Redis),
            _ => Err(CacheError::configuration(format!(
                "Unknown cache type: {}. Valid types: in_memory, redis",
                s
            ))),
        }
    }
}

impl TryFrom<String> for CacheType {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Configuration for cache factory
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Type of cache to create
    #[serde(rename = "type")]
    pub cache_type: CacheType,
    /// Redis URL (required for Redis type)
    pub redis_url: Option<String>,
    /// Key prefix for namespacing (Redis only)
    pub key_prefix: Option<String>,
    /// Maximum capacity (for in-memory cache)
    pub max_capacity: Option<u64>,
    /// Connection timeout in seconds (Redis only)
    pub connection_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::InMemory,
            redis_url: None,
            key_prefix: None,
            max_capacity: Some(10_000),
            connection_timeout_secs: 5,
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration for in-memory cache
    pub fn in_memory() -> Self {
        Self {
            cache_type: CacheType::InMemory,
            ..Default::default()
        }
    }

    /// Creates a new configuration for Redis cache
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            cache_type: CacheType::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the maximum capacity (in-memory only)
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets the connection timeout (Redis only)
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_secs = timeout.as_secs().max(1);
        self
    }
}

/// Factory for creating cache instances
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    /// Creates a new cache factory
    pub fn new() -> Self {
        Self
    }

    /// Creates a cache instance based on configuration
    pub async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn ByteCache>, CacheError> {
        info!(cache_type = %config.cache_type, "Creating byte cache");

        match config.cache_type {
            CacheType::InMemory => {
                let mut in_memory_config = InMemoryCacheConfig::default();

                if let Some(capacity) = config.max_capacity {
                    in_memory_config = in_memory_config.with_max_capacity(capacity);
                }

                Ok(self.create_in_memory_with_config(in_memory_config))
            }
            CacheType::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    CacheError::configuration("Redis URL is required for Redis cache type")
                })?;

                let mut redis_config = RedisCacheConfig::new(url).with_connection_timeout(
                    Duration::from_secs(config.connection_timeout_secs),
                );

                if let Some(prefix) = &config.key_prefix {
                    redis_config = redis_config.with_key_prefix(prefix.clone());
                }

                self.create_redis_with_config(redis_config).await
            }
        }
    }

    /// Creates an in-memory cache with default settings
    pub fn create_in_memory(&self) -> Arc<dyn ByteCache> {
        Arc::new(InMemoryByteCache::new())
    }

    /// Creates an in-memory cache with custom configuration
    pub fn create_in_memory_with_config(&self, config: InMemoryCacheConfig) -> Arc<dyn ByteCache> {
        Arc::new(InMemoryByteCache::with_config(config))
    }

    /// Creates a Redis cache with custom configuration
    pub async fn create_redis_with_config(
        &self,
        config: RedisCacheConfig,
    ) -> Result<Arc<dyn ByteCache>, CacheError> {
        let cache = RedisByteCache::new(config).await?;
        Ok(Arc::new(cache))
    }
}
