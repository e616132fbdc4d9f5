//! # pagelog Protocol
//!
//! Wire types for the pagelog session protocol.
//!
//! Every frame is one canonical CBOR map with a `type` discriminator.
//! Session, request and message ids travel as decimal strings; record ids
//! are 12-byte CBOR byte strings.
//!
//! This crate provides:
//! - [`ClientMessage`] / [`ServerMessage`] envelopes
//! - [`Request`] / [`Response`] payloads
//! - [`WireValue`], the tagged wire form of a logged value
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod fields;
mod message;
mod request;
mod value;

pub use message::{ClientMessage, ErrorKind, ProtocolErrorKind, ServerMessage};
pub use request::{PageItem, PageLineItem, Request, Response, WireLineType};
pub use value::{WireBool, WireId, WireValue, MAX_VALUE_DEPTH, WIRE_ID_LEN};
