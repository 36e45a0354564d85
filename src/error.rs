//! Error types for binar-sync.

use thiserror::Error;

use crate::remote::RemoteError;

/// Errors produced by the sync engine and its storage layer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local database failure (open, query, migration).
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration could not be read, parsed or resolved.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an unusable value.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation needs connectivity and the backend is unreachable.
    #[error("Offline: the backend is not reachable")]
    Offline,

    /// A sync pass this caller joined ended without a result.
    #[error("Sync pass failed: {0}")]
    PassFailed(String),

    /// The remote API rejected or never answered a request.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SyncError {
    /// Wrap a rusqlite error with a short description of what was attempted.
    pub(crate) fn db(context: &str, err: &rusqlite::Error) -> Self {
        Self::Database(format!("{context}: {err}"))
    }

    /// Whether this error comes from local storage.
    ///
    /// Storage failures are never retried by the engine.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_classification() {
        assert!(SyncError::Database("disk full".to_string()).is_storage());
        assert!(!SyncError::Offline.is_storage());
        assert!(!SyncError::NotFound("op".to_string()).is_storage());
    }

    #[test]
    fn test_display() {
        let err = SyncError::db("Failed to enqueue", &rusqlite::Error::InvalidQuery);
        assert!(err.to_string().starts_with("Database error: Failed to enqueue"));
    }
}
