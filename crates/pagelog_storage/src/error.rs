//! Error types for storage operations.

use pagelog_codec::CodecError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored document could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The journal file is corrupted.
    #[error("journal corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the journal directory.
    #[error("journal directory {} is locked by another process", .0.display())]
    Locked(PathBuf),

    /// The journal was opened read-only, or lost its writer after a failed
    /// rollback.
    #[error("journal `{0}` is not writable")]
    NotWritable(String),

    /// A document is structurally valid CBOR but not a valid document.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl StorageError {
    /// Create an invalid document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument(message.into())
    }
}
