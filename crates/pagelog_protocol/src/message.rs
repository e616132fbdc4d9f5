//! Client and server envelopes.

use crate::fields::{decimal, tagged, Fields};
use crate::request::{Request, Response};
use pagelog_codec::{from_cbor, to_canonical_cbor, CodecError, CodecResult, Value};
use std::fmt;

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The storage backend failed or did not acknowledge a write.
    DatabaseFailure,
    /// The request type is not implemented.
    CallNotImplemented,
    /// Any other failure.
    UnknownFailure,
    /// A referenced page or value does not exist.
    ResourceNotFound,
}

impl ErrorKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DatabaseFailure => "DatabaseFailure",
            ErrorKind::CallNotImplemented => "CallNotImplemented",
            ErrorKind::UnknownFailure => "UnknownFailure",
            ErrorKind::ResourceNotFound => "ResourceNotFound",
        }
    }

    fn parse(s: &str) -> CodecResult<Self> {
        Ok(match s {
            "DatabaseFailure" => ErrorKind::DatabaseFailure,
            "CallNotImplemented" => ErrorKind::CallNotImplemented,
            "UnknownFailure" => ErrorKind::UnknownFailure,
            "ResourceNotFound" => ErrorKind::ResourceNotFound,
            other => {
                return Err(CodecError::invalid_structure(format!(
                    "unknown error kind `{other}`"
                )))
            }
        })
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a frame that could not be processed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolErrorKind {
    /// A text frame arrived where binary was expected.
    ExpectingBinaryMessage,
    /// A binary frame did not decode to a client message.
    DecodeMessageError,
}

impl ProtocolErrorKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProtocolErrorKind::ExpectingBinaryMessage => "ExpectingBinaryMessage",
            ProtocolErrorKind::DecodeMessageError => "DecodeMessageError",
        }
    }

    fn parse(s: &str) -> CodecResult<Self> {
        match s {
            "ExpectingBinaryMessage" => Ok(ProtocolErrorKind::ExpectingBinaryMessage),
            "DecodeMessageError" => Ok(ProtocolErrorKind::DecodeMessageError),
            other => Err(CodecError::invalid_structure(format!(
                "unknown protocol error `{other}`"
            ))),
        }
    }
}

/// A frame sent by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// A command to execute.
    Request {
        /// Logical session.
        session_id: u64,
        /// Client-chosen id, unique within the session.
        request_id: u64,
        /// The command.
        request: Request,
    },
    /// Confirms receipt of a server message.
    Acknowledge {
        /// Logical session.
        session_id: u64,
        /// Id of the acknowledged message.
        message_id: u64,
    },
}

impl ClientMessage {
    /// The session this message belongs to.
    #[must_use]
    pub fn session_id(&self) -> u64 {
        match self {
            ClientMessage::Request { session_id, .. }
            | ClientMessage::Acknowledge { session_id, .. } => *session_id,
        }
    }

    /// Encodes to CBOR.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let value = match self {
            ClientMessage::Request {
                session_id,
                request_id,
                request,
            } => tagged(
                "request",
                [
                    ("sessionId", decimal(*session_id)),
                    ("requestId", decimal(*request_id)),
                    ("request", request.to_cbor()),
                ],
            ),
            ClientMessage::Acknowledge {
                session_id,
                message_id,
            } => tagged(
                "acknowledge",
                [
                    ("sessionId", decimal(*session_id)),
                    ("messageId", decimal(*message_id)),
                ],
            ),
        };
        to_canonical_cbor(&value)
    }

    /// Decodes from CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a well-formed client envelope.
    /// An unknown request `type` is not an error; it decodes to
    /// [`Request::Unsupported`].
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let value = from_cbor(bytes)?;
        let fields = Fields::of(&value, "client message")?;
        match fields.tag()? {
            "request" => Ok(ClientMessage::Request {
                session_id: fields.decimal("sessionId")?,
                request_id: fields.decimal("requestId")?,
                request: Request::from_cbor(fields.required("request")?)?,
            }),
            "acknowledge" => Ok(ClientMessage::Acknowledge {
                session_id: fields.decimal("sessionId")?,
                message_id: fields.decimal("messageId")?,
            }),
            other => Err(CodecError::unsupported_type(format!(
                "client message `{other}`"
            ))),
        }
    }
}

/// A frame sent by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Confirms receipt of a request.
    Acknowledge {
        /// The acknowledged request id.
        message_id: u64,
        /// Logical session.
        session_id: u64,
    },
    /// The frame could not be processed.
    ProtocolError {
        /// What went wrong.
        error: ProtocolErrorKind,
    },
    /// A request completed.
    ResultSuccess {
        /// The request this answers.
        request_id: u64,
        /// The result payload.
        result: Response,
    },
    /// A request failed.
    ResultError {
        /// The request this answers.
        request_id: u64,
        /// Failure classification.
        error: ErrorKind,
    },
}

impl ServerMessage {
    /// Encodes to CBOR.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let value = match self {
            ServerMessage::Acknowledge {
                message_id,
                session_id,
            } => tagged(
                "acknowledge",
                [
                    ("messageId", decimal(*message_id)),
                    ("sessionId", decimal(*session_id)),
                ],
            ),
            ServerMessage::ProtocolError { error } => {
                tagged("protocolError", [("error", Value::from(error.as_str()))])
            }
            ServerMessage::ResultSuccess { request_id, result } => tagged(
                "resultSuccess",
                [
                    ("requestId", decimal(*request_id)),
                    ("result", result.to_cbor()),
                ],
            ),
            ServerMessage::ResultError { request_id, error } => tagged(
                "resultError",
                [
                    ("requestId", decimal(*request_id)),
                    ("error", Value::from(error.as_str())),
                ],
            ),
        };
        to_canonical_cbor(&value)
    }

    /// Decodes from CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a well-formed server envelope.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let value = from_cbor(bytes)?;
        let fields = Fields::of(&value, "server message")?;
        match fields.tag()? {
            "acknowledge" => Ok(ServerMessage::Acknowledge {
                message_id: fields.decimal("messageId")?,
                session_id: fields.decimal("sessionId")?,
            }),
            "protocolError" => Ok(ServerMessage::ProtocolError {
                error: ProtocolErrorKind::parse(fields.text("error")?)?,
            }),
            "resultSuccess" => Ok(ServerMessage::ResultSuccess {
                request_id: fields.decimal("requestId")?,
                result: Response::from_cbor(fields.required("result")?)?,
            }),
            "resultError" => Ok(ServerMessage::ResultError {
                request_id: fields.decimal("requestId")?,
                error: ErrorKind::parse(fields.text("error")?)?,
            }),
            other => Err(CodecError::unsupported_type(format!(
                "server message `{other}`"
            ))),
        }
    }
}
