//! Error types for the Plantitas response cache.
//!
//! The cache is an optimization, so most of these errors are logged and
//! swallowed by [`crate::ResponseCache`]. Direct users of a
//! [`crate::CacheStore`] see them as-is.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the response cache.
#[derive(Debug, Error)]
pub enum CacheError {
    // Storage errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Cache unavailable: {message}")]
    Unavailable { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl CacheError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CacheError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Error for a connection mutex poisoned by a panicking holder.
    pub(crate) fn lock_poisoned() -> Self {
        CacheError::Unavailable {
            message: "Failed to acquire connection lock".to_string(),
        }
    }

    /// Check if this error means the backing store could not be reached.
    ///
    /// Callers of the cache treat these exactly like a miss.
    pub fn is_unavailable(&self) -> bool {
        match self {
            CacheError::Unavailable { .. } | CacheError::Io { .. } => true,
            CacheError::Database {
                source: Some(rusqlite::Error::SqliteFailure(err, _)),
                ..
            } => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::SystemIoFailure
                    | rusqlite::ErrorCode::ReadOnly
            ),
            _ => false,
        }
    }
}
