//! # pagelog Codec
//!
//! Canonical CBOR encoding/decoding for pagelog wire frames and journal
//! documents.
//!
//! ## Canonical CBOR Rules
//!
//! - Maps are sorted by key (length-first, then bytewise over encoded keys)
//! - Integers use shortest encoding
//! - Floats are written as 64-bit doubles; narrower widths are accepted on decode
//! - Strings must be UTF-8
//! - No indefinite-length items
//! - No tags
//!
//! ## Usage
//!
//! ```
//! use pagelog_codec::{to_canonical_cbor, from_cbor, Value};
//!
//! let value = Value::text_map([("type", Value::from("valueNumber")), ("value", Value::Float(2.5))]);
//! let bytes = to_canonical_cbor(&value);
//!
//! let decoded = from_cbor(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder, MAX_NESTING_DEPTH};
pub use encoder::{encode_into, to_canonical_cbor};
pub use error::{CodecError, CodecResult};
pub use value::Value;
