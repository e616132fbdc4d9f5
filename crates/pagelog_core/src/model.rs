//! Stored records: value records, pages and page lines.

use crate::value::Value;
use pagelog_codec::Value as Cbor;
use pagelog_storage::document::{field, id_field, text_field, timestamp_field};
use pagelog_storage::{Document, ObjectId, StorageError, StorageResult, Timestamp};
use std::fmt;
use std::str::FromStr;

/// A saved value that page lines can reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRecord {
    /// Record id.
    pub id: ObjectId,
    /// The saved value.
    pub value: Value,
    /// Creation time.
    pub created_at: Timestamp,
}

impl ValueRecord {
    /// Creates a record with a fresh id.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            id: ObjectId::new(),
            value,
            created_at: Timestamp::now(),
        }
    }
}

impl Document for ValueRecord {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn to_value(&self) -> Cbor {
        Cbor::text_map([
            ("_id", self.id.into()),
            ("createdAt", self.created_at.into()),
            ("value", self.value.to_document()),
        ])
    }

    fn from_value(doc: &Cbor) -> StorageResult<Self> {
        Ok(Self {
            id: id_field(doc, "_id")?,
            created_at: timestamp_field(doc, "createdAt")?,
            value: Value::from_document(field(doc, "value")?)?,
        })
    }
}

/// A titled log container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Page id.
    pub id: ObjectId,
    /// Free-form title.
    pub title: String,
    /// Creation time.
    pub created_at: Timestamp,
}

impl Page {
    /// Creates a page with a fresh id.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            title: title.into(),
            created_at: Timestamp::now(),
        }
    }
}

impl Document for Page {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn to_value(&self) -> Cbor {
        Cbor::text_map([
            ("_id", self.id.into()),
            ("createdAt", self.created_at.into()),
            ("title", Cbor::from(self.title.as_str())),
        ])
    }

    fn from_value(doc: &Cbor) -> StorageResult<Self> {
        Ok(Self {
            id: id_field(doc, "_id")?,
            created_at: timestamp_field(doc, "createdAt")?,
            title: text_field(doc, "title")?.to_string(),
        })
    }
}

/// Kind of a page line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineType {
    /// Regular log output.
    Log,
    /// Error output.
    Error,
}

impl LineType {
    /// Returns the canonical name used on the wire and on disk.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LineType::Log => "Log",
            LineType::Error => "Error",
        }
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Log" => Ok(LineType::Log),
            "Error" => Ok(LineType::Error),
            other => Err(format!("unknown line type `{other}`")),
        }
    }
}

/// One line of a page: a sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLine {
    /// Line id.
    pub id: ObjectId,
    /// Owning page.
    pub page_id: ObjectId,
    /// Log or error.
    pub line_type: LineType,
    /// The values, in order.
    pub line: Vec<Value>,
    /// Creation time.
    pub created_at: Timestamp,
}

impl PageLine {
    /// Field name of the owning page id, for [`Filter::FieldEq`](pagelog_storage::Filter::FieldEq).
    pub const PAGE_ID_FIELD: &'static str = "pageId";

    /// Creates a line with a fresh id.
    #[must_use]
    pub fn new(page_id: ObjectId, line_type: LineType, line: Vec<Value>) -> Self {
        Self {
            id: ObjectId::new(),
            page_id,
            line_type,
            line,
            created_at: Timestamp::now(),
        }
    }
}

impl Document for PageLine {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn field(&self, name: &str) -> Option<ObjectId> {
        (name == Self::PAGE_ID_FIELD).then_some(self.page_id)
    }

    fn to_value(&self) -> Cbor {
        Cbor::text_map([
            ("_id", self.id.into()),
            ("createdAt", self.created_at.into()),
            (Self::PAGE_ID_FIELD, self.page_id.into()),
            ("type", Cbor::from(self.line_type.as_str())),
            (
                "line",
                Cbor::Array(self.line.iter().map(Value::to_document).collect()),
            ),
        ])
    }

    fn from_value(doc: &Cbor) -> StorageResult<Self> {
        let line = field(doc, "line")?
            .as_array()
            .ok_or_else(|| StorageError::invalid_document("field `line` is not an array"))?
            .iter()
            .map(Value::from_document)
            .collect::<StorageResult<_>>()?;

        Ok(Self {
            id: id_field(doc, "_id")?,
            created_at: timestamp_field(doc, "createdAt")?,
            page_id: id_field(doc, Self::PAGE_ID_FIELD)?,
            line_type: text_field(doc, "type")?
                .parse()
                .map_err(StorageError::InvalidDocument)?,
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_roundtrip() {
        let page = Page::new("boot sequence");
        assert_eq!(Page::decode(&page.encode()).unwrap(), page);
    }

    #[test]
    fn value_record_roundtrip() {
        let record = ValueRecord::new(Value::Array(vec![Value::NaN, Value::from("x")]));
        let back = ValueRecord::decode(&record.encode()).unwrap();
        assert_eq!(back.id, record.id);
        assert!(back.value.bit_eq(&record.value));
    }

    #[test]
    fn page_line_roundtrip_and_field() {
        let page_id = ObjectId::new();
        let line = PageLine::new(
            page_id,
            LineType::Error,
            vec![Value::from("failed"), Value::Reference(ObjectId::new())],
        );
        assert_eq!(PageLine::decode(&line.encode()).unwrap(), line);
        assert_eq!(line.field(PageLine::PAGE_ID_FIELD), Some(page_id));
        assert_eq!(line.field("title"), None);
    }

    #[test]
    fn line_type_names() {
        assert_eq!("Log".parse::<LineType>().unwrap(), LineType::Log);
        assert_eq!(LineType::Error.to_string(), "Error");
        assert!("Warn".parse::<LineType>().is_err());
    }
}
