//! Cache domain - typed access over a byte-oriented cache

mod byte_cache;
mod cancel;
mod entry_options;
mod json_options;
mod single_flight;
mod typed;

pub use byte_cache::ByteCache;
pub use cancel::run_cancellable;
pub use entry_options::{CacheEntryOptions, CachePriority, ResolvedExpiration};
pub use json_options::{JsonOptions, DEFAULT_JSON_OPTIONS};
pub use single_flight::{SingleFlight, DEFAULT_LOCK_IDLE_TIMEOUT};
pub use typed::TypedCacheExt;

#[cfg(test)]
pub use byte_cache::recording::RecordingCache;
#[cfg(test)]
pub use byte_cache::MockByteCache;
