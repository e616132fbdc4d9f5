//! Error types for pagelog core.

use pagelog_storage::{ObjectId, StorageError};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced page or value does not exist.
    #[error("{resource} not found: {ids:?}")]
    ResourceNotFound {
        /// Kind of the missing resource (`page` or `value`).
        resource: &'static str,
        /// Ids that could not be resolved.
        ids: Vec<ObjectId>,
    },

    /// The backend did not acknowledge a write.
    #[error("write to `{collection}` was not acknowledged")]
    DatabaseFailure {
        /// Collection the write targeted.
        collection: String,
    },

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CoreError {
    /// Returns true for the not-found family of errors.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
    }
}
