//! Typed access to the fields of a decoded CBOR map.

use crate::value::WireId;
use pagelog_codec::{CodecError, CodecResult, Value};

/// Field reader over one CBOR map.
pub(crate) struct Fields<'a> {
    map: &'a [(Value, Value)],
    context: &'static str,
}

impl<'a> Fields<'a> {
    pub(crate) fn of(value: &'a Value, context: &'static str) -> CodecResult<Self> {
        let map = value
            .as_map()
            .ok_or_else(|| CodecError::invalid_structure(format!("{context}: expected map")))?;
        Ok(Self { map, context })
    }

    pub(crate) fn get(&self, name: &str) -> Option<&'a Value> {
        self.map
            .iter()
            .find(|(k, _)| k.as_text() == Some(name))
            .map(|(_, v)| v)
    }

    pub(crate) fn required(&self, name: &str) -> CodecResult<&'a Value> {
        self.get(name).ok_or_else(|| {
            CodecError::invalid_structure(format!("{}: missing field `{name}`", self.context))
        })
    }

    fn mistyped(&self, name: &str, expected: &str) -> CodecError {
        CodecError::invalid_structure(format!(
            "{}: field `{name}` is not {expected}",
            self.context
        ))
    }

    /// The `type` discriminator.
    pub(crate) fn tag(&self) -> CodecResult<&'a str> {
        self.text("type")
    }

    pub(crate) fn text(&self, name: &str) -> CodecResult<&'a str> {
        self.required(name)?
            .as_text()
            .ok_or_else(|| self.mistyped(name, "text"))
    }

    /// A `u64` carried as a decimal string of ASCII digits only.
    pub(crate) fn decimal(&self, name: &str) -> CodecResult<u64> {
        let text = self.text(name)?;
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.mistyped(name, "a decimal string"));
        }
        text.parse()
            .map_err(|_| self.mistyped(name, "a decimal string"))
    }

    pub(crate) fn unsigned(&self, name: &str) -> CodecResult<u64> {
        self.required(name)?
            .as_integer()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| self.mistyped(name, "a non-negative integer"))
    }

    pub(crate) fn id(&self, name: &str) -> CodecResult<WireId> {
        self.required(name)?
            .as_bytes()
            .and_then(WireId::from_slice)
            .ok_or_else(|| self.mistyped(name, "a 12-byte id"))
    }

    pub(crate) fn array(&self, name: &str) -> CodecResult<&'a [Value]> {
        self.required(name)?
            .as_array()
            .ok_or_else(|| self.mistyped(name, "an array"))
    }
}

/// Builds a tagged map.
pub(crate) fn tagged<const N: usize>(tag: &str, fields: [(&str, Value); N]) -> Value {
    Value::text_map(
        std::iter::once(("type", Value::from(tag))).chain(fields),
    )
}

/// Encodes a `u64` as a decimal string.
pub(crate) fn decimal(n: u64) -> Value {
    Value::Text(n.to_string())
}
