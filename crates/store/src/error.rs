//! Store error types.

use blobshelf_core::EntryId;
use thiserror::Error;

/// Chunked store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No live entry with this id (missing or expired).
    #[error("entry not found: {id}")]
    EntryNotFound { id: EntryId },

    #[error("entry already exists: {0}")]
    AlreadyExists(EntryId),

    /// The schema could not be created. The store is unusable; callers
    /// should abort startup.
    #[error("schema initialization failed: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] blobshelf_core::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether this error means the entry is absent to readers.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
