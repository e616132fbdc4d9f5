//! Error types for the pagelog server.

use pagelog_codec::CodecError;
use pagelog_core::CoreError;
use pagelog_protocol::ErrorKind;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the pagelog server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Frame encoding or decoding error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Store error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The request type is not implemented by this server.
    #[error("request `{name}` is not implemented")]
    CallNotImplemented {
        /// Request type sent by the client.
        name: String,
    },
}

impl ServerError {
    /// Classifies this error for a `resultError` reply.
    #[must_use]
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            ServerError::Core(CoreError::ResourceNotFound { .. }) => ErrorKind::ResourceNotFound,
            ServerError::Core(CoreError::DatabaseFailure { .. } | CoreError::Storage(_)) => {
                ErrorKind::DatabaseFailure
            }
            ServerError::CallNotImplemented { .. } => ErrorKind::CallNotImplemented,
            _ => ErrorKind::UnknownFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagelog_core::ObjectId;

    #[test]
    fn error_classification() {
        let missing = ServerError::from(CoreError::ResourceNotFound {
            resource: "page",
            ids: vec![ObjectId::new()],
        });
        assert_eq!(missing.error_kind(), ErrorKind::ResourceNotFound);

        let unacked = ServerError::from(CoreError::DatabaseFailure {
            collection: "pages".into(),
        });
        assert_eq!(unacked.error_kind(), ErrorKind::DatabaseFailure);

        let storage = ServerError::from(CoreError::Storage(
            pagelog_storage::StorageError::Corrupted("bad frame".into()),
        ));
        assert_eq!(storage.error_kind(), ErrorKind::DatabaseFailure);

        let unknown = ServerError::CallNotImplemented {
            name: "DeletePage".into(),
        };
        assert_eq!(unknown.error_kind(), ErrorKind::CallNotImplemented);

        let io = ServerError::from(std::io::Error::other("reset"));
        assert_eq!(io.error_kind(), ErrorKind::UnknownFailure);
    }

    #[test]
    fn error_display() {
        let err = ServerError::CallNotImplemented {
            name: "DeletePage".into(),
        };
        assert!(err.to_string().contains("DeletePage"));
    }
}
