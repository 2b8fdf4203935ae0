//! Cooperative cancellation for awaited cache steps

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::domain::CacheError;

/// Awaits `future` unless `cancel` fires first.
///
/// An already-cancelled token wins without polling `future`. On cancellation
/// the pending future is dropped and `CacheError::Cancelled` is returned.
pub async fn run_cancellable<F, T>(cancel: &CancellationToken, future: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, CacheError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CacheError::Cancelled),
        result = future => result,
    }
}
