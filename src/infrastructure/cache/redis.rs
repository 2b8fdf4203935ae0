//! Redis byte cache implementation
//!
//! Each entry is stored as a hash with three fields:
//! - `absexp`: absolute expiration in ms since the Unix epoch, `-1` if none
//! - `sldexp`: sliding window in ms, `-1` if none
//! - `data`: the stored bytes

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::warn;

use crate::domain::cache::{ByteCache, CacheEntryOptions, ResolvedExpiration};
use crate::domain::CacheError;

const ABSOLUTE_FIELD: &str = "absexp";
const SLIDING_FIELD: &str = "sldexp";
const DATA_FIELD: &str = "data";
const NOT_PRESENT: i64 = -1;

/// Configuration for Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisCacheConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// Byte cache backed by Redis
///
/// Features:
/// - Absolute and sliding expiration mapped onto `PEXPIRE`
/// - Atomic write of data and expiration metadata
/// - Connection pooling via ConnectionManager
#[derive(Clone)]
pub struct RedisByteCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisByteCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisByteCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisByteCache {
    /// Creates a new Redis cache connection
    pub async fn new(config: RedisCacheConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::store(format!("Failed to create Redis client: {}", e)))?;

        let connection = tokio::time::timeout(
            config.connection_timeout,
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| {
            CacheError::store(format!(
                "Timed out connecting to Redis after {:?}",
                config.connection_timeout
            ))
        })?
        .map_err(|e| CacheError::store(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }

    /// Creates a Redis cache with default configuration
    pub async fn with_url(url: impl Into<String>) -> Result<Self, CacheError> {
        Self::new(RedisCacheConfig::new(url)).await
    }

    fn prefix_key(&self, key: &str) -> String {
        prefix_key(self.config.key_prefix.as_deref(), key)
    }

    /// Re-arms the key's TTL when it carries a sliding window
    async fn slide(
        &self,
        prefixed_key: &str,
        absolute_ms: Option<i64>,
        sliding_ms: Option<i64>,
    ) -> Result<(), CacheError> {
        let expiration = decode_expiration(absolute_ms, sliding_ms);

        if expiration.sliding.is_none() {
            return Ok(());
        }

        let Some(ttl) = expiration.time_to_live(Utc::now()) else {
            return Ok(());
        };

        let ttl = positive_millis(ttl)?;
        let mut conn = self.connection.clone();
        redis::cmd("PEXPIRE")
            .arg(prefixed_key)
            .arg(ttl)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| {
                warn!(key = prefixed_key, error = %e, "Failed to refresh sliding expiration");
                CacheError::store(format!("Failed to refresh key '{}': {}", prefixed_key, e))
            })
    }
}

fn prefix_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, key),
        None => key.to_string(),
    }
}

fn encode_expiration(expiration: &ResolvedExpiration) -> Result<(i64, i64), CacheError> {
    let absolute = expiration
        .absolute
        .map(|at| at.timestamp_millis())
        .unwrap_or(NOT_PRESENT);
    let sliding = match expiration.sliding {
        Some(window) => i64::try_from(window.as_millis())
            .map_err(|_| CacheError::invalid_argument("sliding expiration is out of range"))?,
        None => NOT_PRESENT,
    };

    Ok((absolute, sliding))
}

fn decode_expiration(absolute_ms: Option<i64>, sliding_ms: Option<i64>) -> ResolvedExpiration {
    let absolute = absolute_ms
        .filter(|ms| *ms != NOT_PRESENT)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    let sliding = sliding_ms
        .filter(|ms| *ms > 0)
        .and_then(|ms| u64::try_from(ms).ok())
        .map(Duration::from_millis);

    ResolvedExpiration { absolute, sliding }
}

fn ttl_millis(
    expiration: &ResolvedExpiration,
    now: DateTime<Utc>,
) -> Result<Option<u64>, CacheError> {
    expiration.time_to_live(now).map(positive_millis).transpose()
}

/// Milliseconds for `PEXPIRE`, at least 1 so a due entry still expires
fn positive_millis(ttl: Duration) -> Result<u64, CacheError> {
    u64::try_from(ttl.as_millis())
        .map(|ms| ms.max(1))
        .map_err(|_| CacheError::invalid_argument("expiration is out of range"))
}

#[async_trait]
impl ByteCache for RedisByteCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let (absolute_ms, sliding_ms, data): (Option<i64>, Option<i64>, Option<Vec<u8>>) =
            redis::cmd("HMGET")
                .arg(&prefixed_key)
                .arg(ABSOLUTE_FIELD)
                .arg(SLIDING_FIELD)
                .arg(DATA_FIELD)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::store(format!("Failed to get key '{}': {}", key, e)))?;

        let Some(data) = data else {
            return Ok(None);
        };

        self.slide(&prefixed_key, absolute_ms, sliding_ms).await?;

        Ok(Some(data))
    }

    async fn set_bytes(
        &self,
        key: &str,
        value: &[u8],
        options: &CacheEntryOptions,
    ) -> Result<(), CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let expiration = options.resolve(Utc::now())?;
        let (absolute_ms, sliding_ms) = encode_expiration(&expiration)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("HSET")
            .arg(&prefixed_key)
            .arg(ABSOLUTE_FIELD)
            .arg(absolute_ms)
            .arg(SLIDING_FIELD)
            .arg(sliding_ms)
            .arg(DATA_FIELD)
            .arg(value)
            .ignore();

        match ttl_millis(&expiration, Utc::now())? {
            Some(ttl) => {
                pipe.cmd("PEXPIRE").arg(&prefixed_key).arg(ttl).ignore();
            }
            None => {
                pipe.cmd("PERSIST").arg(&prefixed_key).ignore();
            }
        }

        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::store(format!("Failed to set key '{}': {}", key, e)))?;

        Ok(())
    }

    async fn refresh(&self, key: &str) -> Result<(), CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let (absolute_ms, sliding_ms): (Option<i64>, Option<i64>) = redis::cmd("HMGET")
            .arg(&prefixed_key)
            .arg(ABSOLUTE_FIELD)
            .arg(SLIDING_FIELD)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::store(format!("Failed to refresh key '{}': {}", key, e)))?;

        self.slide(&prefixed_key, absolute_ms, sliding_ms).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        redis::cmd("DEL")
            .arg(&prefixed_key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::store(format!("Failed to delete key '{}': {}", key, e)))?;

        Ok(())
    }
}
