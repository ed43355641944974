//! Crate-level error type
//!
//! Mutating operations can fail in two distinct ways: the input was rejected
//! before anything was written, or the backend failed and the transaction was
//! rolled back.

use crate::entry::ValidationError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookmarkError {
    /// Raw entry rejected; nothing was written
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Backend failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BookmarkError {
    /// Whether the caller's input was at fault
    pub fn is_validation(&self) -> bool {
        matches!(self, BookmarkError::Validation(_))
    }
}

pub type BookmarkResult<T> = Result<T, BookmarkError>;
