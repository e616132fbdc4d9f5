//! Canonical CBOR encoder.

use crate::value::Value;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;

const FALSE: u8 = 0xf4;
const TRUE: u8 = 0xf5;
const NULL: u8 = 0xf6;
const UNDEFINED: u8 = 0xf7;
const FLOAT64: u8 = 0xfb;

/// Encodes a value to canonical CBOR bytes.
///
/// Output is deterministic:
/// - Map keys are sorted by their encoded form (length-first, then bytewise)
/// - Integers and lengths use the shortest head
/// - Floats are always written as 64-bit doubles, so NaN payloads survive
/// - No indefinite-length items
pub fn to_canonical_cbor(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

/// Appends the canonical encoding of `value` to `out`.
pub fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(NULL),
        Value::Undefined => out.push(UNDEFINED),
        Value::Bool(b) => out.push(if *b { TRUE } else { FALSE }),
        Value::Integer(n) => match u64::try_from(*n) {
            Ok(unsigned) => write_head(out, MAJOR_UNSIGNED, unsigned),
            // -1 - n fits in u64 for every negative i64
            Err(_) => write_head(out, MAJOR_NEGATIVE, (-1 - i128::from(*n)) as u64),
        },
        Value::Float(f) => {
            out.push(FLOAT64);
            out.extend_from_slice(&f.to_bits().to_be_bytes());
        }
        Value::Bytes(bytes) => {
            write_head(out, MAJOR_BYTES, bytes.len() as u64);
            out.extend_from_slice(bytes);
        }
        Value::Text(text) => {
            write_head(out, MAJOR_TEXT, text.len() as u64);
            out.extend_from_slice(text.as_bytes());
        }
        Value::Array(items) => {
            write_head(out, MAJOR_ARRAY, items.len() as u64);
            items.iter().for_each(|item| encode_into(item, out));
        }
        Value::Map(pairs) => {
            let mut entries: Vec<(Vec<u8>, &Value)> = pairs
                .iter()
                .map(|(k, v)| (to_canonical_cbor(k), v))
                .collect();
            entries.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

            write_head(out, MAJOR_MAP, pairs.len() as u64);
            for (key, value) in entries {
                out.extend_from_slice(&key);
                encode_into(value, out);
            }
        }
    }
}

/// Writes a major type with its argument in the shortest form.
#[allow(clippy::cast_possible_truncation)]
fn write_head(out: &mut Vec<u8>, major: u8, arg: u64) {
    let major = major << 5;
    match arg {
        0..=23 => out.push(major | arg as u8),
        24..=0xff => out.extend_from_slice(&[major | 24, arg as u8]),
        0x100..=0xffff => {
            out.push(major | 25);
            out.extend_from_slice(&(arg as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(major | 26);
            out.extend_from_slice(&(arg as u32).to_be_bytes());
        }
        _ => {
            out.push(major | 27);
            out.extend_from_slice(&arg.to_be_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_into_appends() {
        let mut out = vec![0x80];
        encode_into(&Value::Integer(1), &mut out);
        assert_eq!(out, vec![0x80, 0x01]);
    }

    #[test]
    fn extreme_integers() {
        assert_eq!(
            to_canonical_cbor(&Value::Integer(i64::MIN)),
            vec![0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(i64::MAX)),
            vec![0x1b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn encode_simple_values() {
        assert_eq!(to_canonical_cbor(&Value::Null), vec![0xf6]);
        assert_eq!(to_canonical_cbor(&Value::Undefined), vec![0xf7]);
        assert_eq!(to_canonical_cbor(&Value::Bool(false)), vec![0xf4]);
        assert_eq!(to_canonical_cbor(&Value::Bool(true)), vec![0xf5]);
    }

    #[test]
    fn encode_integers_shortest_form() {
        assert_eq!(to_canonical_cbor(&Value::Integer(0)), vec![0x00]);
        assert_eq!(to_canonical_cbor(&Value::Integer(23)), vec![0x17]);
        assert_eq!(to_canonical_cbor(&Value::Integer(24)), vec![0x18, 24]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(256)),
            vec![0x19, 0x01, 0x00]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(65536)),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(to_canonical_cbor(&Value::Integer(-1)), vec![0x20]);
        assert_eq!(to_canonical_cbor(&Value::Integer(-100)), vec![0x38, 99]);
    }

    #[test]
    fn encode_float_as_double() {
        assert_eq!(
            to_canonical_cbor(&Value::Float(1.5)),
            vec![0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn encode_text_and_bytes() {
        assert_eq!(to_canonical_cbor(&Value::from("a")), vec![0x61, b'a']);
        assert_eq!(
            to_canonical_cbor(&Value::Bytes(vec![1, 2, 3])),
            vec![0x43, 1, 2, 3]
        );
    }

    #[test]
    fn encode_array_keeps_order() {
        assert_eq!(
            to_canonical_cbor(&Value::Array(vec![Value::Integer(2), Value::Integer(1)])),
            vec![0x82, 0x02, 0x01]
        );
    }

    #[test]
    fn encode_map_sorted() {
        let map = Value::Map(vec![
            (Value::from("bb"), Value::Integer(2)),
            (Value::from("a"), Value::Integer(1)),
        ]);

        assert_eq!(
            to_canonical_cbor(&map),
            vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]
        );
    }

    #[test]
    fn deterministic_encoding() {
        let map1 = Value::Map(vec![
            (Value::from("z"), Value::Integer(1)),
            (Value::from("a"), Value::Integer(2)),
        ]);
        let map2 = Value::Map(vec![
            (Value::from("a"), Value::Integer(2)),
            (Value::from("z"), Value::Integer(1)),
        ]);

        assert_eq!(to_canonical_cbor(&map1), to_canonical_cbor(&map2));
    }
}
