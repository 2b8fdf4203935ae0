//! Byte-oriented cache seam

use std::fmt::Debug;

use async_trait::async_trait;

use super::CacheEntryOptions;
use crate::domain::CacheError;

#[cfg(test)]
use mockall::automock;

/// Externally owned key/bytes store
///
/// Implementations own storage, expiration and eviction. Store failures are
/// reported as [`CacheError::Store`] and passed through the typed layer as-is.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ByteCache: Send + Sync + Debug {
    /// Reads the bytes stored under `key`, `None` on a miss
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Creates or overwrites the entry under `key`
    async fn set_bytes(
        &self,
        key: &str,
        value: &[u8],
        options: &CacheEntryOptions,
    ) -> Result<(), CacheError>;

    /// Resets the sliding expiration of `key` without reading it
    async fn refresh(&self, key: &str) -> Result<(), CacheError>;

    /// Removes the entry under `key`
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}
