//! Wire representation of logged values.

use crate::fields::{tagged, Fields};
use pagelog_codec::{CodecError, CodecResult, Value, MAX_NESTING_DEPTH};
use std::fmt;

/// Length of a [`WireId`].
pub const WIRE_ID_LEN: usize = 12;

/// Container levels around a value in a `GetPageLines` reply, the deepest
/// frame that carries values.
const REPLY_ENVELOPE_DEPTH: usize = 5;

/// Deepest container nesting a single value may use.
///
/// A value accepted at this depth still fits in every reply that carries
/// it back.
pub const MAX_VALUE_DEPTH: usize = MAX_NESTING_DEPTH - REPLY_ENVELOPE_DEPTH;

/// A 12-byte record id as carried on the wire.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WireId(pub [u8; WIRE_ID_LEN]);

impl WireId {
    /// Creates an id from a slice, if it is exactly 12 bytes long.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; WIRE_ID_LEN]>::try_from(bytes).ok().map(Self)
    }

    pub(crate) fn to_cbor(self) -> Value {
        Value::Bytes(self.0.to_vec())
    }
}

impl fmt::Debug for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WireId(")?;
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        f.write_str(")")
    }
}

/// Boolean as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireBool {
    /// `boolTrue`.
    True,
    /// `boolFalse`.
    False,
}

impl From<bool> for WireBool {
    fn from(b: bool) -> Self {
        if b {
            WireBool::True
        } else {
            WireBool::False
        }
    }
}

impl From<WireBool> for bool {
    fn from(b: WireBool) -> Self {
        b == WireBool::True
    }
}

/// A logged value as carried on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// `valueNull`.
    Null,
    /// `valueUndefined`.
    Undefined,
    /// `valueNaN`.
    NaN,
    /// `valueBoolean`.
    Boolean(WireBool),
    /// `valueNumber`.
    Number(f64),
    /// `valueString`.
    String(String),
    /// `valueVector`.
    Vector(Vec<WireValue>),
    /// `valueObject`, an ordered list of pairs.
    Object(Vec<(WireValue, WireValue)>),
    /// `valueValueRef`.
    ValueRef(WireId),
}

impl WireValue {
    /// Converts to a CBOR value.
    #[must_use]
    pub fn to_cbor(&self) -> Value {
        match self {
            WireValue::Null => tagged("valueNull", []),
            WireValue::Undefined => tagged("valueUndefined", []),
            WireValue::NaN => tagged("valueNaN", []),
            WireValue::Boolean(b) => {
                let name = match b {
                    WireBool::True => "boolTrue",
                    WireBool::False => "boolFalse",
                };
                tagged("valueBoolean", [("value", Value::from(name))])
            }
            WireValue::Number(n) => tagged("valueNumber", [("value", Value::Float(*n))]),
            WireValue::String(s) => tagged("valueString", [("value", Value::from(s.as_str()))]),
            WireValue::Vector(items) => tagged(
                "valueVector",
                [(
                    "value",
                    Value::Array(items.iter().map(WireValue::to_cbor).collect()),
                )],
            ),
            WireValue::Object(pairs) => tagged(
                "valueObject",
                [(
                    "value",
                    Value::Array(
                        pairs
                            .iter()
                            .map(|(k, v)| Value::Array(vec![k.to_cbor(), v.to_cbor()]))
                            .collect(),
                    ),
                )],
            ),
            WireValue::ValueRef(id) => tagged("valueValueRef", [("id", id.to_cbor())]),
        }
    }

    /// Parses a CBOR value.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tags, missing fields, references whose
    /// id is not exactly 12 bytes, or nesting beyond [`MAX_VALUE_DEPTH`].
    pub fn from_cbor(value: &Value) -> CodecResult<Self> {
        Self::parse(value, 1)
    }

    /// Parses an array of values.
    pub fn list_from_cbor(items: &[Value]) -> CodecResult<Vec<Self>> {
        items.iter().map(Self::from_cbor).collect()
    }

    /// `depth` is the container level of this value's own map.
    fn parse(value: &Value, depth: usize) -> CodecResult<Self> {
        if depth > MAX_VALUE_DEPTH {
            return Err(CodecError::NestingTooDeep {
                max: MAX_VALUE_DEPTH,
            });
        }

        let fields = Fields::of(value, "value")?;
        Ok(match fields.tag()? {
            "valueNull" => WireValue::Null,
            "valueUndefined" => WireValue::Undefined,
            "valueNaN" => WireValue::NaN,
            "valueBoolean" => match fields.text("value")? {
                "boolTrue" => WireValue::Boolean(WireBool::True),
                "boolFalse" => WireValue::Boolean(WireBool::False),
                other => {
                    return Err(CodecError::invalid_structure(format!(
                        "unknown boolean `{other}`"
                    )))
                }
            },
            "valueNumber" => WireValue::Number(
                fields
                    .required("value")?
                    .as_f64()
                    .ok_or_else(|| CodecError::invalid_structure("valueNumber without number"))?,
            ),
            "valueString" => WireValue::String(fields.text("value")?.to_string()),
            // map, items array
            "valueVector" => WireValue::Vector(
                fields
                    .array("value")?
                    .iter()
                    .map(|item| Self::parse(item, depth + 2))
                    .collect::<CodecResult<_>>()?,
            ),
            // map, pairs array, pair array
            "valueObject" => WireValue::Object(
                fields
                    .array("value")?
                    .iter()
                    .map(|pair| match pair.as_array() {
                        Some([k, v]) => Ok((Self::parse(k, depth + 3)?, Self::parse(v, depth + 3)?)),
                        _ => Err(CodecError::invalid_structure(
                            "valueObject entries must be [key, value] pairs",
                        )),
                    })
                    .collect::<CodecResult<_>>()?,
            ),
            "valueValueRef" => WireValue::ValueRef(fields.id("id")?),
            other => {
                return Err(CodecError::unsupported_type(format!("wire value `{other}`")))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagelog_codec::{from_cbor, to_canonical_cbor};

    fn roundtrip(value: &WireValue) -> WireValue {
        let bytes = to_canonical_cbor(&value.to_cbor());
        WireValue::from_cbor(&from_cbor(&bytes).unwrap()).unwrap()
    }

    #[test]
    fn scalar_shapes() {
        let v = WireValue::Boolean(WireBool::True).to_cbor();
        assert_eq!(v.get("type"), Some(&Value::from("valueBoolean")));
        assert_eq!(v.get("value"), Some(&Value::from("boolTrue")));

        let n = WireValue::Number(2.5).to_cbor();
        assert_eq!(n.get("value"), Some(&Value::Float(2.5)));

        let null = WireValue::Null.to_cbor();
        assert_eq!(null.as_map().unwrap().len(), 1);
    }

    #[test]
    fn object_pairs_keep_order() {
        let value = WireValue::Object(vec![
            (WireValue::String("z".into()), WireValue::Null),
            (WireValue::String("a".into()), WireValue::NaN),
            (WireValue::String("z".into()), WireValue::Undefined),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn nested_vector_roundtrip() {
        let value = WireValue::Vector(vec![
            WireValue::ValueRef(WireId([3; 12])),
            WireValue::Vector(vec![WireValue::Number(-1.0)]),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn integer_number_is_accepted() {
        let value = Value::text_map([
            ("type", Value::from("valueNumber")),
            ("value", Value::Integer(7)),
        ]);
        assert_eq!(WireValue::from_cbor(&value).unwrap(), WireValue::Number(7.0));
    }

    #[test]
    fn short_reference_id_rejected() {
        let value = Value::text_map([
            ("type", Value::from("valueValueRef")),
            ("id", Value::Bytes(vec![1, 2, 3])),
        ]);
        assert!(WireValue::from_cbor(&value).is_err());
    }

    #[test]
    fn unknown_tag_rejected() {
        let value = Value::text_map([("type", Value::from("valueDate"))]);
        assert!(matches!(
            WireValue::from_cbor(&value),
            Err(CodecError::UnsupportedType { .. })
        ));
    }

    fn nested_objects(levels: usize) -> WireValue {
        (0..levels).fold(WireValue::Null, |inner, _| {
            WireValue::Object(vec![(WireValue::String("k".into()), inner)])
        })
    }

    #[test]
    fn object_nesting_is_capped() {
        // Each object level adds three containers around its children.
        let fits = (MAX_VALUE_DEPTH - 1) / 3;
        let value = nested_objects(fits);
        assert_eq!(WireValue::from_cbor(&value.to_cbor()).unwrap(), value);

        let too_deep = nested_objects(fits + 1);
        assert!(matches!(
            WireValue::from_cbor(&too_deep.to_cbor()),
            Err(CodecError::NestingTooDeep { max }) if max == MAX_VALUE_DEPTH
        ));
    }

    #[test]
    fn malformed_object_pair_rejected() {
        let value = Value::text_map([
            ("type", Value::from("valueObject")),
            ("value", Value::Array(vec![Value::Array(vec![])])),
        ]);
        assert!(WireValue::from_cbor(&value).is_err());
    }
}
