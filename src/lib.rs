//! Typed cache helpers
//!
//! Typed get, set and get-or-create operations over an injected
//! byte-oriented cache:
//! - Values are stored as UTF-8 JSON text
//! - Entry expiration options pass through to the store unchanged
//! - Every operation takes an explicit cancellation token
//! - In-memory (moka) and Redis backends

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::cache::{
    ByteCache, CacheEntryOptions, CachePriority, JsonOptions, SingleFlight, TypedCacheExt,
    DEFAULT_JSON_OPTIONS,
};
pub use domain::CacheError;
pub use infrastructure::cache::{
    CacheConfig, CacheFactory, CacheType, InMemoryByteCache, RedisByteCache,
};
