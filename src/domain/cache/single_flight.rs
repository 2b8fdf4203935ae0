//! Key-scoped mutual exclusion for read-through population

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::cancel::run_cancellable;
use super::{ByteCache, CacheEntryOptions, JsonOptions, TypedCacheExt};
use crate::domain::CacheError;

type KeyLock = tokio::sync::Mutex<()>;

/// How long an unused key lock stays registered
pub const DEFAULT_LOCK_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Collapses concurrent get-or-create calls for the same key
///
/// Callers sharing one `SingleFlight` run the factory at most once per miss:
/// the first caller populates the entry while the others wait on a per-key
/// lock and then read the stored value. Exclusion is process-local; callers
/// in other processes still race.
///
/// Key locks live in an unbounded moka cache and expire after sitting idle
/// for the configured timeout. The timeout must outlast the slowest factory,
/// otherwise a late caller may register a fresh lock for a key still held.
#[derive(Debug, Clone)]
pub struct SingleFlight {
    locks: MokaCache<String, Arc<KeyLock>>,
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::with_idle_timeout(DEFAULT_LOCK_IDLE_TIMEOUT)
    }
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        let locks = MokaCache::builder().time_to_idle(idle_timeout).build();
        Self { locks }
    }

    /// Number of keys whose lock is currently held
    pub fn in_flight(&self) -> usize {
        self.locks
            .iter()
            .filter(|(_, lock)| lock.try_lock().is_err())
            .count()
    }

    async fn lock_for(&self, key: &str) -> Arc<KeyLock> {
        self.locks
            .get_with(key.to_string(), async { Arc::new(KeyLock::new(())) })
            .await
    }

    /// Like [`TypedCacheExt::get_or_create`], but with at most one factory
    /// run per key at a time among callers of this instance.
    pub async fn get_or_create_exclusive<C, T, F, Fut>(
        &self,
        cache: &C,
        key: &str,
        factory: F,
        json_options: &JsonOptions,
        cancel: &CancellationToken,
    ) -> Result<T, CacheError>
    where
        C: ByteCache + ?Sized,
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce(&mut CacheEntryOptions) -> Fut + Send,
        Fut: Future<Output = Result<T, CacheError>> + Send,
    {
        if let Some(value) = cache.get::<T>(key, json_options, cancel).await? {
            return Ok(value);
        }

        let lock = self.lock_for(key).await;
        let _guard = run_cancellable(cancel, async { Ok(lock.lock().await) }).await?;

        if let Some(value) = cache.get::<T>(key, json_options, cancel).await? {
            debug!(key, "Entry populated by a concurrent caller");
            return Ok(value);
        }

        let mut options = CacheEntryOptions::default();
        let value = run_cancellable(cancel, factory(&mut options)).await?;
        cache.set(key, &value, &options, json_options, cancel).await?;

        Ok(value)
    }
}
