//! Mapping between stored values and their wire form.

use pagelog_core::{LineType, ObjectId, Value};
use pagelog_protocol::{WireId, WireLineType, WireValue};

/// Converts a stored value to its wire form.
#[must_use]
pub fn to_wire(value: &Value) -> WireValue {
    match value {
        Value::Null => WireValue::Null,
        Value::Undefined => WireValue::Undefined,
        Value::NaN => WireValue::NaN,
        Value::Boolean(b) => WireValue::Boolean((*b).into()),
        Value::Number(n) => WireValue::Number(*n),
        Value::String(s) => WireValue::String(s.clone()),
        Value::Array(items) => WireValue::Vector(values_to_wire(items)),
        Value::Object(pairs) => WireValue::Object(
            pairs
                .iter()
                .map(|(k, v)| (to_wire(k), to_wire(v)))
                .collect(),
        ),
        Value::Reference(id) => WireValue::ValueRef(wire_id(*id)),
    }
}

/// Converts a wire value to the stored form.
#[must_use]
pub fn from_wire(value: &WireValue) -> Value {
    match value {
        WireValue::Null => Value::Null,
        WireValue::Undefined => Value::Undefined,
        WireValue::NaN => Value::NaN,
        WireValue::Boolean(b) => Value::Boolean((*b).into()),
        WireValue::Number(n) => Value::Number(*n),
        WireValue::String(s) => Value::String(s.clone()),
        WireValue::Vector(items) => Value::Array(values_from_wire(items)),
        WireValue::Object(pairs) => Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (from_wire(k), from_wire(v)))
                .collect(),
        ),
        WireValue::ValueRef(id) => Value::Reference(object_id(*id)),
    }
}

/// Converts a line of stored values.
#[must_use]
pub fn values_to_wire(values: &[Value]) -> Vec<WireValue> {
    values.iter().map(to_wire).collect()
}

/// Converts a line of wire values.
#[must_use]
pub fn values_from_wire(values: &[WireValue]) -> Vec<Value> {
    values.iter().map(from_wire).collect()
}

/// Record id to wire id.
#[must_use]
pub fn wire_id(id: ObjectId) -> WireId {
    WireId(*id.as_bytes())
}

/// Wire id to record id.
#[must_use]
pub fn object_id(id: WireId) -> ObjectId {
    ObjectId::from_bytes(id.0)
}

pub(crate) fn line_type(line_type: WireLineType) -> LineType {
    match line_type {
        WireLineType::Log => LineType::Log,
        WireLineType::Error => LineType::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagelog_protocol::WireBool;
    use proptest::prelude::*;

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            Just(Value::Undefined),
            Just(Value::NaN),
            any::<bool>().prop_map(Value::Boolean),
            any::<f64>().prop_map(Value::Number),
            ".{0,8}".prop_map(Value::String),
            any::<[u8; 12]>().prop_map(|b| Value::Reference(ObjectId::from_bytes(b))),
        ];
        leaf.prop_recursive(3, 32, 5, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
                prop::collection::vec((inner.clone(), inner), 0..5).prop_map(Value::Object),
            ]
        })
    }

    proptest! {
        #[test]
        fn wire_roundtrip_is_identity(value in arb_value()) {
            let back = from_wire(&to_wire(&value));
            prop_assert!(back.bit_eq(&value), "{back:?} != {value:?}");
        }

        #[test]
        fn line_roundtrip_keeps_order(line in prop::collection::vec(arb_value(), 0..6)) {
            let back = values_from_wire(&values_to_wire(&line));
            prop_assert_eq!(back.len(), line.len());
            for (a, b) in back.iter().zip(&line) {
                prop_assert!(a.bit_eq(b));
            }
        }
    }

    #[test]
    fn booleans_use_wire_names() {
        assert_eq!(
            to_wire(&Value::Boolean(true)),
            WireValue::Boolean(WireBool::True)
        );
        assert_eq!(
            from_wire(&WireValue::Boolean(WireBool::False)),
            Value::Boolean(false)
        );
    }

    #[test]
    fn nan_variant_is_not_a_number() {
        assert_eq!(to_wire(&Value::NaN), WireValue::NaN);
        assert!(matches!(from_wire(&WireValue::NaN), Value::NaN));
    }

    #[test]
    fn reference_keeps_raw_bytes() {
        let id = ObjectId::new();
        let wire = to_wire(&Value::Reference(id));
        assert_eq!(wire, WireValue::ValueRef(WireId(*id.as_bytes())));
        assert_eq!(object_id(wire_id(id)), id);
    }

    #[test]
    fn object_pairs_keep_duplicates_and_order() {
        let value = Value::Object(vec![
            (Value::from("b"), Value::Number(1.0)),
            (Value::from("a"), Value::Null),
            (Value::from("b"), Value::Number(2.0)),
        ]);
        assert_eq!(from_wire(&to_wire(&value)), value);
    }
}
