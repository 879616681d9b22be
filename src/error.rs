//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type shared by every cache backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Empty key, empty key list, or a value the backend cannot accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Key absent or expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Operation attempted after `close`
    #[error("Cache is closed")]
    Closed,

    /// Unexpected failure from the underlying store or client
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true for the `NotFound` variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Internal(format!("serialization failed: {}", err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
