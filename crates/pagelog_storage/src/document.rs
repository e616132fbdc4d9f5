//! Document trait for typed collections.

use crate::error::{StorageError, StorageResult};
use crate::id::{ObjectId, Timestamp};
use pagelog_codec::{from_cbor, to_canonical_cbor, Value};

/// A record that can be stored in a [`Collection`](crate::Collection).
///
/// Implementors map themselves to a codec [`Value`] map; the provided
/// `encode`/`decode` turn that into canonical CBOR for the journal.
///
/// # Example
///
/// ```rust
/// use pagelog_codec::Value;
/// use pagelog_storage::{document, Document, ObjectId, StorageResult, Timestamp};
///
/// #[derive(Clone)]
/// struct Tag {
///     id: ObjectId,
///     created_at: Timestamp,
///     name: String,
/// }
///
/// impl Document for Tag {
///     fn id(&self) -> ObjectId {
///         self.id
///     }
///
///     fn created_at(&self) -> Timestamp {
///         self.created_at
///     }
///
///     fn to_value(&self) -> Value {
///         Value::text_map([
///             ("_id", self.id.into()),
///             ("createdAt", self.created_at.into()),
///             ("name", Value::from(self.name.as_str())),
///         ])
///     }
///
///     fn from_value(value: &Value) -> StorageResult<Self> {
///         Ok(Tag {
///             id: document::id_field(value, "_id")?,
///             created_at: document::timestamp_field(value, "createdAt")?,
///             name: document::text_field(value, "name")?.to_string(),
///         })
///     }
/// }
/// ```
pub trait Document: Clone + Send + Sync + 'static {
    /// Returns the document's immutable identifier.
    fn id(&self) -> ObjectId;

    /// Returns the creation time.
    fn created_at(&self) -> Timestamp;

    /// Returns an id-valued field usable in [`Filter::FieldEq`](crate::Filter::FieldEq).
    ///
    /// Documents without foreign keys keep the default.
    fn field(&self, _name: &str) -> Option<ObjectId> {
        None
    }

    /// Converts the document to a codec value.
    fn to_value(&self) -> Value;

    /// Rebuilds the document from a codec value.
    fn from_value(value: &Value) -> StorageResult<Self>;

    /// Encodes the document to canonical CBOR bytes.
    fn encode(&self) -> Vec<u8> {
        to_canonical_cbor(&self.to_value())
    }

    /// Decodes a document from CBOR bytes.
    fn decode(bytes: &[u8]) -> StorageResult<Self> {
        Self::from_value(&from_cbor(bytes)?)
    }
}

/// Looks up a required field of a document map.
pub fn field<'a>(value: &'a Value, name: &str) -> StorageResult<&'a Value> {
    value
        .get(name)
        .ok_or_else(|| StorageError::invalid_document(format!("missing field `{name}`")))
}

/// Reads an id field.
pub fn id_field(value: &Value, name: &str) -> StorageResult<ObjectId> {
    field(value, name)?
        .as_bytes()
        .and_then(ObjectId::from_slice)
        .ok_or_else(|| StorageError::invalid_document(format!("field `{name}` is not an id")))
}

/// Reads a timestamp field.
pub fn timestamp_field(value: &Value, name: &str) -> StorageResult<Timestamp> {
    field(value, name)?
        .as_integer()
        .and_then(|n| u64::try_from(n).ok())
        .map(Timestamp::from_millis)
        .ok_or_else(|| {
            StorageError::invalid_document(format!("field `{name}` is not a timestamp"))
        })
}

/// Reads a text field.
pub fn text_field<'a>(value: &'a Value, name: &str) -> StorageResult<&'a str> {
    field(value, name)?
        .as_text()
        .ok_or_else(|| StorageError::invalid_document(format!("field `{name}` is not text")))
}
