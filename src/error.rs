//! Error types for cache operations

use crate::store::KeyType;
use thiserror::Error;

/// Failures returned by the typed stores and the cache facade
///
/// Deleting an absent key, removing an absent member or field, and similar
/// calls are successful no-ops and never produce one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// No live top-level key of the requested type
    #[error("key not found")]
    KeyNotFound,

    /// The hash exists but the field does not
    #[error("hash field not found")]
    FieldNotFound,

    /// Pop or range on a missing or empty collection
    #[error("collection is empty")]
    EmptyCollection,

    /// `start > stop`, or `start` lands past the end once normalized
    #[error("invalid range: start {start}, stop {stop}")]
    InvalidRange { start: i64, stop: i64 },

    /// Counter operation against a non-integer string value
    #[error("value is not an integer")]
    TypeMismatch,

    /// The key already lives in another typed store
    #[error("key holds a {found} value, not a {expected}")]
    WrongType { expected: KeyType, found: KeyType },

    /// Counter arithmetic left the i64 range
    #[error("increment or decrement would overflow")]
    Overflow,

    /// Sorted-set score is NaN
    #[error("score is not a number")]
    InvalidScore,
}

/// Result alias used across the crate
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::InvalidRange { start: 3, stop: 1 };
        assert_eq!(err.to_string(), "invalid range: start 3, stop 1");

        let err = CacheError::WrongType {
            expected: KeyType::List,
            found: KeyType::String,
        };
        assert_eq!(err.to_string(), "key holds a string value, not a list");
    }
}
