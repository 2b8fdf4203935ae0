//! Cache infrastructure - ByteCache implementations

mod factory;
mod in_memory;
mod redis;

pub use factory::{CacheConfig, CacheFactory, CacheType};
pub use in_memory::{InMemoryByteCache, InMemoryCacheConfig};
pub use redis::{RedisByteCache, RedisCacheConfig};
