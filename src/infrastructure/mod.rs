//! Infrastructure layer - cache backends and logging

pub mod cache;
pub mod logging;
