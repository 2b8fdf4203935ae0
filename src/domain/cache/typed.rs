//! Typed get, set and get-or-create over a [`ByteCache`]

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::cancel::run_cancellable;
use super::{ByteCache, CacheEntryOptions, JsonOptions};
use crate::domain::CacheError;

/// Extension trait adding typed access to any byte cache
///
/// Values travel as UTF-8 JSON text produced and consumed with the supplied
/// [`JsonOptions`]. Every operation takes an explicit cancellation token;
/// cancelling drops the pending store or factory call and yields
/// [`CacheError::Cancelled`].
pub trait TypedCacheExt: ByteCache {
    /// Gets a typed value from the cache.
    ///
    /// A miss is `Ok(None)`. Bytes that do not decode into `T` are a
    /// `Serialization` error, never a silent miss.
    fn get<'a, T>(
        &'a self,
        key: &'a str,
        json_options: &'a JsonOptions,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<Option<T>, CacheError>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move {
            match run_cancellable(cancel, async { self.get_bytes(key).await }).await? {
                Some(bytes) => {
                    let value = json_options.decode(&bytes)?;
                    debug!(key, size = bytes.len(), "Cache hit");
                    Ok(value)
                }
                None => {
                    debug!(key, "Cache miss");
                    Ok(None)
                }
            }
        }
    }

    /// Creates or overwrites the entry under `key`.
    ///
    /// A value that serializes to JSON `null` is rejected with
    /// `InvalidArgument` before the store is contacted.
    fn set<'a, T>(
        &'a self,
        key: &'a str,
        value: &'a T,
        options: &'a CacheEntryOptions,
        json_options: &'a JsonOptions,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<(), CacheError>> + Send
    where
        T: Serialize + Sync + ?Sized,
    {
        async move {
            let bytes = json_options.encode(value)?;

            run_cancellable(cancel, async { self.set_bytes(key, &bytes, options).await }).await?;
            debug!(key, size = bytes.len(), "Cache entry written");

            Ok(())
        }
    }

    /// Returns the cached value, or runs `factory` on a miss and stores its result.
    ///
    /// The factory receives fresh default entry options it may adjust before
    /// the value is written. Read and write are not atomic: concurrent callers
    /// racing on the same missing key may each run the factory and each write.
    /// See [`super::SingleFlight`] for a key-scoped alternative.
    fn get_or_create<'a, T, F, Fut>(
        &'a self,
        key: &'a str,
        factory: F,
        json_options: &'a JsonOptions,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<T, CacheError>> + Send
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce(&mut CacheEntryOptions) -> Fut + Send,
        Fut: Future<Output = Result<T, CacheError>> + Send,
    {
        async move {
            if let Some(value) = self.get::<T>(key, json_options, cancel).await? {
                return Ok(value);
            }

            let mut options = CacheEntryOptions::default();
            let pending = factory(&mut options);
            let value = run_cancellable(cancel, pending).await?;
            debug!(key, "Factory produced value for missing entry");

            self.set(key, &value, &options, json_options, cancel).await?;

            Ok(value)
        }
    }
}

impl<C: ByteCache + ?Sized> TypedCacheExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::byte_cache::recording::RecordingCache;
    use crate::domain::cache::byte_cache::MockByteCache;
    use crate::domain::cache::DEFAULT_JSON_OPTIONS;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct User {
        id: u32,
        #[serde(default)]
        name: String,
    }

    fn ada() -> User {
        User {
            id: 42,
            name: "Ada".to_string(),
        }
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let cache = RecordingCache::new();
        let cancel = CancellationToken::new();

        cache
            .set(
                "user:42",
                &ada(),
                &CacheEntryOptions::default(),
                &DEFAULT_JSON_OPTIONS,
                &cancel,
            )
            .await
            .unwrap();

        let user: Option<User> = cache
            .get("user:42", &DEFAULT_JSON_OPTIONS, &cancel)
            .await
            .unwrap();
        assert_eq!(user, Some(ada()));
        assert_eq!(cache.raw("user:42"), Some(br#"{"id":42,"name":"Ada"}"#.to_vec()));
    }

    #[tokio::test]
    async fn test_roundtrip_with_pretty_options() {
        let cache = RecordingCache::new();
        let cancel = CancellationToken::new();
        let options = JsonOptions::pretty();

        cache
            .set("user:42", &ada(), &CacheEntryOptions::default(), &options, &cancel)
            .await
            .unwrap();

        let user: Option<User> = cache.get("user:42", &options, &cancel).await.unwrap();
        assert_eq!(user, Some(ada()));
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let cache = RecordingCache::new();
        let cancel = CancellationToken::new();

        let user: Option<User> = cache
            .get("missing", &DEFAULT_JSON_OPTIONS, &cancel)
            .await
            .unwrap();
        assert_eq!(user, None);
    }

    #[tokio::test]
    async fn test_get_zero_value_is_present() {
        let cache = RecordingCache::new().with_raw("counter", b"0");
        let cancel = CancellationToken::new();

        let value: Option<u32> = cache
            .get("counter", &DEFAULT_JSON_OPTIONS, &cancel)
            .await
            .unwrap();
        assert_eq!(value, Some(0));
    }

    #[tokio::test]
    async fn test_get_truncated_bytes_is_serialization_error() {
        let cache = RecordingCache::new().with_raw("user:42", br#"{"id":42,"name":"A"#);
        let cancel = CancellationToken::new();

        let err = cache
            .get::<User>("user:42", &DEFAULT_JSON_OPTIONS, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_serialization());
    }

    #[tokio::test]
    async fn test_get_propagates_store_error() {
        let cache = RecordingCache::new().with_error("connection refused");
        let cancel = CancellationToken::new();

        let err = cache
            .get::<User>("user:42", &DEFAULT_JSON_OPTIONS, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Store error: connection refused");
    }

    #[tokio::test]
    async fn test_set_null_value_never_contacts_store() {
        // No expectations: any store call panics
        let cache = MockByteCache::new();
        let cancel = CancellationToken::new();
        let value: Option<User> = None;

        let err = cache
            .set(
                "user:42",
                &value,
                &CacheEntryOptions::default(),
                &DEFAULT_JSON_OPTIONS,
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_set_propagates_store_error() {
        let cache = RecordingCache::new().with_error("read-only replica");
        let cancel = CancellationToken::new();

        let err = cache
            .set(
                "user:42",
                &ada(),
                &CacheEntryOptions::default(),
                &DEFAULT_JSON_OPTIONS,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Store { .. }));
        assert_eq!(err.to_string(), "Store error: read-only replica");
        assert!(cache.writes().is_empty());
    }

    #[tokio::test]
    async fn test_set_with_cancelled_token_never_writes() {
        let mut cache = MockByteCache::new();
        cache.expect_set_bytes().never();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = cache
            .set(
                "user:42",
                &ada(),
                &CacheEntryOptions::default(),
                &DEFAULT_JSON_OPTIONS,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_set_passes_options_through() {
        let mut cache = MockByteCache::new();
        let expected =
            CacheEntryOptions::new().with_sliding_expiration(Duration::from_secs(30));
        let matcher = expected.clone();

        cache
            .expect_set_bytes()
            .withf(move |key, value, options| {
                key == "user:42" && value == br#"{"id":42,"name":"Ada"}"# && *options == matcher
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        cache
            .set(
                "user:42",
                &ada(),
                &expected,
                &DEFAULT_JSON_OPTIONS,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_with_cancelled_token_never_contacts_store() {
        let cache = MockByteCache::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = cache
            .get::<User>("user:42", &DEFAULT_JSON_OPTIONS, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_get_or_create_hit_skips_factory() {
        let cache = RecordingCache::new().with_raw("user:42", br#"{"id":42,"name":"Ada"}"#);
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let user = cache
            .get_or_create(
                "user:42",
                move |_options| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(User::default())
                },
                &DEFAULT_JSON_OPTIONS,
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(user, ada());
        assert_eq!(calls.load(Ordering::SeqCst), 0, "factory must not run on a hit");
        assert!(cache.writes().is_empty());
    }

    #[tokio::test]
    async fn test_get_or_create_miss_runs_factory_once() {
        let cache = RecordingCache::new();
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let user = cache
            .get_or_create(
                "user:7",
                move |_options| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(User {
                        id: 7,
                        ..Default::default()
                    })
                },
                &DEFAULT_JSON_OPTIONS,
                &cancel,
            )
            .await
            .unwrap();

        let expected = User {
            id: 7,
            ..Default::default()
        };
        assert_eq!(user, expected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.writes(), vec!["user:7".to_string()]);

        let stored: Option<User> = cache
            .get("user:7", &DEFAULT_JSON_OPTIONS, &cancel)
            .await
            .unwrap();
        assert_eq!(stored, Some(expected));
    }

    #[tokio::test]
    async fn test_get_or_create_factory_sets_entry_options() {
        let cache = RecordingCache::new();
        let cancel = CancellationToken::new();

        cache
            .get_or_create(
                "session",
                |options| {
                    options.sliding_expiration = Some(Duration::from_secs(90));
                    async { Ok("token".to_string()) }
                },
                &DEFAULT_JSON_OPTIONS,
                &cancel,
            )
            .await
            .unwrap();

        let options = cache.options("session").unwrap();
        assert_eq!(options.sliding_expiration, Some(Duration::from_secs(90)));
        assert_eq!(options.absolute_expiration, None);
    }

    #[tokio::test]
    async fn test_get_or_create_factory_error_writes_nothing() {
        let cache = RecordingCache::new();
        let cancel = CancellationToken::new();

        let err = cache
            .get_or_create::<User, _, _>(
                "user:9",
                |_options| async { Err(CacheError::factory("database unavailable")) },
                &DEFAULT_JSON_OPTIONS,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::Factory(_)));
        assert!(cache.writes().is_empty());
    }

    #[tokio::test]
    async fn test_get_or_create_cancelled_during_factory() {
        let cache = RecordingCache::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let err = cache
            .get_or_create::<User, _, _>(
                "user:11",
                move |_options| async move {
                    trigger.cancel();
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(User::default())
                },
                &DEFAULT_JSON_OPTIONS,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(cache.writes().is_empty());
    }

    #[tokio::test]
    async fn test_get_or_create_concurrent_misses_both_run_factory() {
        let cache = RecordingCache::new();
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let make_factory = || {
            let calls = calls.clone();
            let barrier = barrier.clone();
            move |_options: &mut CacheEntryOptions| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                barrier.wait().await;
                Ok::<_, CacheError>(User {
                    id: 1,
                    ..Default::default()
                })
            }
        };

        let (first, second) = tokio::join!(
            cache.get_or_create("user:1", make_factory(), &DEFAULT_JSON_OPTIONS, &cancel),
            cache.get_or_create("user:1", make_factory(), &DEFAULT_JSON_OPTIONS, &cancel),
        );

        assert_eq!(first.unwrap().id, 1);
        assert_eq!(second.unwrap().id, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let cache: Arc<dyn ByteCache> = Arc::new(RecordingCache::new());
        let cancel = CancellationToken::new();

        cache
            .set(
                "user:42",
                &ada(),
                &CacheEntryOptions::default(),
                &DEFAULT_JSON_OPTIONS,
                &cancel,
            )
            .await
            .unwrap();

        let user: Option<User> = cache
            .get("user:42", &DEFAULT_JSON_OPTIONS, &cancel)
            .await
            .unwrap();
        assert_eq!(user, Some(ada()));
    }
}
