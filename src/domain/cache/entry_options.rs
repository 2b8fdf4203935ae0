//! Per-entry expiration options passed through to the byte store

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::CacheError;

/// Eviction priority hint for stores that support one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePriority {
    Low,
    #[default]
    Normal,
    High,
    NeverRemove,
}

/// Expiration policy for a single cache entry
///
/// The typed layer never interprets these values. Stores call
/// [`CacheEntryOptions::resolve`] to turn them into a concrete deadline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntryOptions {
    /// Point in time after which the entry expires
    pub absolute_expiration: Option<DateTime<Utc>>,
    /// Expiration relative to the moment the entry is written
    pub absolute_expiration_relative_to_now: Option<Duration>,
    /// Entry expires when not accessed for this long
    pub sliding_expiration: Option<Duration>,
    /// Eviction priority hint
    #[serde(default)]
    pub priority: CachePriority,
}

impl CacheEntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an absolute expiration date
    pub fn with_absolute_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.absolute_expiration = Some(at);
        self
    }

    /// Sets an expiration relative to now
    pub fn with_absolute_expiration_relative_to_now(mut self, ttl: Duration) -> Self {
        self.absolute_expiration_relative_to_now = Some(ttl);
        self
    }

    /// Sets a sliding expiration window
    pub fn with_sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    pub fn with_priority(mut self, priority: CachePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Returns true when no expiration of any kind is configured
    pub fn is_unbounded(&self) -> bool {
        self.absolute_expiration.is_none()
            && self.absolute_expiration_relative_to_now.is_none()
            && self.sliding_expiration.is_none()
    }

    /// Resolves the options against `now` into a concrete expiration.
    ///
    /// The relative form wins over the absolute date when both are set.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<ResolvedExpiration, CacheError> {
        if let Some(window) = self.sliding_expiration {
            if window.is_zero() {
                return Err(CacheError::invalid_argument(
                    "sliding expiration must be positive",
                ));
            }

            // The next deadline must stay representable as a timestamp
            offset(now, window).ok_or_else(|| {
                CacheError::invalid_argument("sliding expiration is out of range")
            })?;
        }

        let absolute = match (
            self.absolute_expiration_relative_to_now,
            self.absolute_expiration,
        ) {
            (Some(relative), _) => {
                if relative.is_zero() {
                    return Err(CacheError::invalid_argument(
                        "relative expiration must be positive",
                    ));
                }

                let at = offset(now, relative).ok_or_else(|| {
                    CacheError::invalid_argument("relative expiration is out of range")
                })?;

                Some(at)
            }
            (None, Some(at)) => {
                if at <= now {
                    return Err(CacheError::invalid_argument(
                        "absolute expiration must be in the future",
                    ));
                }

                Some(at)
            }
            (None, None) => None,
        };

        Ok(ResolvedExpiration {
            absolute,
            sliding: self.sliding_expiration,
        })
    }
}

fn offset(now: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
    let delta = chrono::Duration::from_std(duration).ok()?;
    now.checked_add_signed(delta)
}

/// Expiration after resolving relative values against a clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedExpiration {
    pub absolute: Option<DateTime<Utc>>,
    pub sliding: Option<Duration>,
}

impl ResolvedExpiration {
    /// Time left until the entry expires, measured from `now`.
    ///
    /// `None` means the entry never expires. A sliding window is capped by
    /// the absolute deadline.
    pub fn time_to_live(&self, now: DateTime<Utc>) -> Option<Duration> {
        let remaining = self
            .absolute
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO));

        match (remaining, self.sliding) {
            (Some(remaining), Some(window)) => Some(remaining.min(window)),
            (Some(remaining), None) => Some(remaining),
            (None, window) => window,
        }
    }
}
