//! Domain layer - typed cache access and its error taxonomy

pub mod cache;
pub mod error;

pub use error::{BoxError, CacheError, FactoryError};
