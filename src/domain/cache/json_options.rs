//! JSON serialization settings shared by the encode and decode paths

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::domain::CacheError;

/// Options used when no explicit serialization settings are supplied
pub const DEFAULT_JSON_OPTIONS: JsonOptions = JsonOptions {
    pretty: false,
    null_as_missing: false,
};

/// Controls how typed values are converted to and from JSON text
///
/// The same options should be used to write and read a given entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonOptions {
    /// Write indented JSON
    #[serde(default)]
    pub pretty: bool,
    /// Treat a stored JSON `null` as an absent entry on read
    #[serde(default)]
    pub null_as_missing: bool,
}

impl Default for JsonOptions {
    fn default() -> Self {
        DEFAULT_JSON_OPTIONS
    }
}

impl JsonOptions {
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..DEFAULT_JSON_OPTIONS
        }
    }

    pub fn with_null_as_missing(mut self) -> Self {
        self.null_as_missing = true;
        self
    }

    /// Serializes `value` into UTF-8 JSON bytes.
    ///
    /// Fails with `InvalidArgument` when the value serializes to `null`; a
    /// null cannot be stored because absence is reserved for cache misses.
    pub fn encode<T>(&self, value: &T) -> Result<Vec<u8>, CacheError>
    where
        T: Serialize + ?Sized,
    {
        let text = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| CacheError::serialization_with_source("Failed to serialize cache value", e))?;

        if text == "null" {
            return Err(CacheError::invalid_argument(
                "cannot store a null value; absence is reserved for cache misses",
            ));
        }

        Ok(text.into_bytes())
    }

    /// Decodes UTF-8 JSON bytes into `T`.
    ///
    /// Returns `Ok(None)` only for a stored `null` when `null_as_missing` is set.
    pub fn decode<T>(&self, bytes: &[u8]) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            CacheError::serialization_with_source("Cached value is not valid UTF-8", e)
        })?;

        if self.null_as_missing {
            let json: Value = serde_json::from_str(text).map_err(|e| {
                CacheError::serialization_with_source("Failed to deserialize cache value", e)
            })?;

            if json.is_null() {
                return Ok(None);
            }

            return serde_json::from_value(json).map(Some).map_err(|e| {
                CacheError::serialization_with_source("Failed to deserialize cache value", e)
            });
        }

        serde_json::from_str(text).map(Some).map_err(|e| {
            CacheError::serialization_with_source("Failed to deserialize cache value", e)
        })
    }
}
