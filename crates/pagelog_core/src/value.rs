//! The recursive value model carried by page lines.

use pagelog_codec::Value as Cbor;
use pagelog_storage::{ObjectId, StorageError, StorageResult};
use std::collections::BTreeSet;

/// A logged value.
///
/// Object keys are arbitrary values and pair order is preserved exactly;
/// pairs are never sorted or deduplicated.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null`.
    Null,
    /// `undefined`.
    Undefined,
    /// Not-a-number, kept distinct from `Number`.
    NaN,
    /// A boolean.
    Boolean(bool),
    /// A double-precision number.
    Number(f64),
    /// A string.
    String(String),
    /// An ordered sequence.
    Array(Vec<Value>),
    /// Ordered key/value pairs.
    Object(Vec<(Value, Value)>),
    /// Reference to a previously saved value record.
    Reference(ObjectId),
}

impl Value {
    /// Structural equality that compares numbers by bit pattern.
    ///
    /// Unlike `==`, a `Number(f64::NAN)` equals itself and `0.0` differs
    /// from `-0.0`.
    #[must_use]
    pub fn bit_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.bit_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b)
                        .all(|((ak, av), (bk, bv))| ak.bit_eq(bk) && av.bit_eq(bv))
            }
            _ => self == other,
        }
    }

    /// Converts to the persisted document form.
    #[must_use]
    pub fn to_document(&self) -> Cbor {
        let (kind, inner) = match self {
            Value::Null => ("null", None),
            Value::Undefined => ("undefined", None),
            Value::NaN => ("nan", None),
            Value::Boolean(b) => ("bool", Some(Cbor::Bool(*b))),
            Value::Number(n) => ("num", Some(Cbor::Float(*n))),
            Value::String(s) => ("str", Some(Cbor::Text(s.clone()))),
            Value::Array(items) => (
                "arr",
                Some(Cbor::Array(items.iter().map(Value::to_document).collect())),
            ),
            Value::Object(pairs) => (
                "obj",
                Some(Cbor::Array(
                    pairs
                        .iter()
                        .map(|(k, v)| Cbor::Array(vec![k.to_document(), v.to_document()]))
                        .collect(),
                )),
            ),
            Value::Reference(id) => ("ref", Some((*id).into())),
        };

        match inner {
            Some(v) => Cbor::text_map([("k", Cbor::from(kind)), ("v", v)]),
            None => Cbor::text_map([("k", Cbor::from(kind))]),
        }
    }

    /// Rebuilds a value from its persisted document form.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidDocument`] for unknown kinds or
    /// mistyped payloads.
    pub fn from_document(doc: &Cbor) -> StorageResult<Self> {
        let kind = doc
            .get("k")
            .and_then(Cbor::as_text)
            .ok_or_else(|| StorageError::invalid_document("value without kind"))?;
        let payload = || {
            doc.get("v")
                .ok_or_else(|| StorageError::invalid_document(format!("`{kind}` value without payload")))
        };
        let mistyped = || StorageError::invalid_document(format!("mistyped `{kind}` payload"));

        Ok(match kind {
            "null" => Value::Null,
            "undefined" => Value::Undefined,
            "nan" => Value::NaN,
            "bool" => Value::Boolean(payload()?.as_bool().ok_or_else(mistyped)?),
            "num" => Value::Number(payload()?.as_f64().ok_or_else(mistyped)?),
            "str" => Value::String(payload()?.as_text().ok_or_else(mistyped)?.to_string()),
            "arr" => Value::Array(
                payload()?
                    .as_array()
                    .ok_or_else(mistyped)?
                    .iter()
                    .map(Value::from_document)
                    .collect::<StorageResult<_>>()?,
            ),
            "obj" => Value::Object(
                payload()?
                    .as_array()
                    .ok_or_else(mistyped)?
                    .iter()
                    .map(|pair| match pair.as_array() {
                        Some([k, v]) => Ok((Value::from_document(k)?, Value::from_document(v)?)),
                        _ => Err(mistyped()),
                    })
                    .collect::<StorageResult<_>>()?,
            ),
            "ref" => Value::Reference(
                payload()?
                    .as_bytes()
                    .and_then(ObjectId::from_slice)
                    .ok_or_else(mistyped)?,
            ),
            other => {
                return Err(StorageError::invalid_document(format!(
                    "unknown value kind `{other}`"
                )))
            }
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Reference(id)
    }
}

/// Collects every value id referenced anywhere in `values`.
///
/// Arrays are walked element by element and objects through both keys and
/// values. The result is deduplicated.
#[must_use]
pub fn collect_reference_ids(values: &[Value]) -> BTreeSet<ObjectId> {
    fn walk(value: &Value, ids: &mut BTreeSet<ObjectId>) {
        match value {
            Value::Reference(id) => {
                ids.insert(*id);
            }
            Value::Array(items) => items.iter().for_each(|item| walk(item, ids)),
            Value::Object(pairs) => pairs.iter().for_each(|(k, v)| {
                walk(k, ids);
                walk(v, ids);
            }),
            _ => {}
        }
    }

    let mut ids = BTreeSet::new();
    values.iter().for_each(|value| walk(value, &mut ids));
    ids
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pagelog_codec::{from_cbor, to_canonical_cbor};
    use proptest::prelude::*;

    pub(crate) fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            Just(Value::Undefined),
            Just(Value::NaN),
            any::<bool>().prop_map(Value::Boolean),
            any::<f64>().prop_map(Value::Number),
            ".{0,12}".prop_map(Value::String),
            any::<[u8; 12]>().prop_map(|b| Value::Reference(ObjectId::from_bytes(b))),
        ];
        leaf.prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::vec((inner.clone(), inner), 0..6).prop_map(Value::Object),
            ]
        })
    }

    #[test]
    fn collects_nested_references() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let c = ObjectId::new();
        let line = vec![
            Value::from("boot"),
            Value::Array(vec![Value::Reference(a), Value::Number(1.0)]),
            Value::Object(vec![
                (Value::Reference(b), Value::Null),
                (
                    Value::from("nested"),
                    Value::Array(vec![Value::Reference(c), Value::Reference(a)]),
                ),
            ]),
        ];

        let ids = collect_reference_ids(&line);
        assert_eq!(ids, BTreeSet::from([a, b, c]));
    }

    #[test]
    fn no_references_in_scalars() {
        let line = vec![
            Value::Null,
            Value::Undefined,
            Value::NaN,
            Value::Boolean(true),
            Value::Number(3.5),
            Value::from("x"),
        ];
        assert!(collect_reference_ids(&line).is_empty());
    }

    #[test]
    fn object_order_survives_persistence() {
        let value = Value::Object(vec![
            (Value::from("z"), Value::Number(1.0)),
            (Value::from("a"), Value::Number(2.0)),
            (Value::from("z"), Value::Number(3.0)),
        ]);
        let back = Value::from_document(&value.to_document()).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn unknown_kind_rejected() {
        let doc = Cbor::text_map([("k", Cbor::from("date"))]);
        assert!(Value::from_document(&doc).is_err());
    }

    #[test]
    fn bit_eq_handles_nan_and_signed_zero() {
        assert!(Value::Number(f64::NAN).bit_eq(&Value::Number(f64::NAN)));
        assert!(!Value::Number(0.0).bit_eq(&Value::Number(-0.0)));
        assert_eq!(Value::Number(0.0), Value::Number(-0.0));
    }

    proptest! {
        #[test]
        fn persisted_form_roundtrips_through_cbor(value in arb_value()) {
            let bytes = to_canonical_cbor(&value.to_document());
            let back = Value::from_document(&from_cbor(&bytes).unwrap()).unwrap();
            prop_assert!(back.bit_eq(&value), "{:?} != {:?}", back, value);
        }

        #[test]
        fn collected_ids_are_exactly_the_references(values in prop::collection::vec(arb_value(), 0..4)) {
            let ids = collect_reference_ids(&values);
            let mut expected = BTreeSet::new();
            let mut stack: Vec<&Value> = values.iter().collect();
            while let Some(v) = stack.pop() {
                match v {
                    Value::Reference(id) => { expected.insert(*id); }
                    Value::Array(items) => stack.extend(items),
                    Value::Object(pairs) => pairs.iter().for_each(|(k, v)| { stack.push(k); stack.push(v); }),
                    _ => {}
                }
            }
            prop_assert_eq!(ids, expected);
        }
    }
}
