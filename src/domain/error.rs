use thiserror::Error;

/// Type-erased error kept as the source of a [`CacheError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed error produced by a value factory
pub type FactoryError = BoxError;

/// Errors surfaced by the typed cache layer and its adapters
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Factory error: {0}")]
    Factory(#[source] FactoryError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl CacheError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Serialization failure that keeps the underlying decoder error
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn factory(error: impl Into<FactoryError>) -> Self {
        Self::Factory(error.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true when the operation was cancelled rather than failed
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }
}
