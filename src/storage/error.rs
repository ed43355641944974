//! Storage backend error types
//!
//! Defines all errors that can occur while talking to a key-value backend.

use thiserror::Error;

/// Errors that can occur in a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend failed or could not be reached; the transaction was rolled back
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A key holds a value of a different kind than the operation expects
    #[error("Wrong kind of value at key {key}: expected {expected}")]
    WrongKind { key: String, expected: &'static str },

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::Unavailable("database is locked".to_string());
        assert_eq!(err.to_string(), "Storage unavailable: database is locked");

        let err = StorageError::WrongKind {
            key: "tag:rust".to_string(),
            expected: "set",
        };
        assert_eq!(err.to_string(), "Wrong kind of value at key tag:rust: expected set");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
    }

    #[test]
    fn test_sqlite_error_is_unavailable() {
        let err: StorageError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }
}
