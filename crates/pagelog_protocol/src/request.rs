//! Request and result payloads.

use crate::fields::{decimal, tagged, Fields};
use crate::value::{WireId, WireValue};
use pagelog_codec::{CodecError, CodecResult, Value};

/// Kind of a page line as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireLineType {
    /// `Log`.
    Log,
    /// `Error`.
    Error,
}

impl WireLineType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            WireLineType::Log => "Log",
            WireLineType::Error => "Error",
        }
    }

    fn parse(s: &str) -> CodecResult<Self> {
        match s {
            "Log" => Ok(WireLineType::Log),
            "Error" => Ok(WireLineType::Error),
            other => Err(CodecError::invalid_structure(format!(
                "unknown line type `{other}`"
            ))),
        }
    }
}

/// A command sent by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Create a page.
    CreatePage {
        /// Page title.
        title: String,
    },
    /// Save a value that lines may reference later.
    SaveValue {
        /// The value.
        value: WireValue,
    },
    /// List pages, newest first.
    GetPages {
        /// Pages to skip.
        offset: u64,
        /// Maximum pages to return.
        limit: u64,
    },
    /// List the lines of a page.
    GetPageLines {
        /// Owning page.
        page_id: WireId,
        /// Lines to skip.
        offset: u64,
        /// Maximum lines to return.
        limit: u64,
    },
    /// Append a line to a page.
    AddPageLine {
        /// Owning page.
        page_id: WireId,
        /// Log or error.
        line_type: WireLineType,
        /// The values.
        line: Vec<WireValue>,
    },
    /// A request type this server does not know.
    Unsupported {
        /// The `type` the client sent.
        name: String,
    },
}

impl Request {
    /// The request's `type` name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Request::CreatePage { .. } => "CreatePage",
            Request::SaveValue { .. } => "SaveValue",
            Request::GetPages { .. } => "GetPages",
            Request::GetPageLines { .. } => "GetPageLines",
            Request::AddPageLine { .. } => "AddPageLine",
            Request::Unsupported { name } => name.as_str(),
        }
    }

    /// Converts to a CBOR value.
    #[must_use]
    pub fn to_cbor(&self) -> Value {
        match self {
            Request::CreatePage { title } => {
                tagged("CreatePage", [("title", Value::from(title.as_str()))])
            }
            Request::SaveValue { value } => tagged("SaveValue", [("value", value.to_cbor())]),
            Request::GetPages { offset, limit } => tagged(
                "GetPages",
                [("offset", unsigned(*offset)), ("limit", unsigned(*limit))],
            ),
            Request::GetPageLines {
                page_id,
                offset,
                limit,
            } => tagged(
                "GetPageLines",
                [
                    ("pageId", page_id.to_cbor()),
                    ("offset", unsigned(*offset)),
                    ("limit", unsigned(*limit)),
                ],
            ),
            Request::AddPageLine {
                page_id,
                line_type,
                line,
            } => tagged(
                "AddPageLine",
                [
                    ("pageId", page_id.to_cbor()),
                    ("lineType", Value::from(line_type.as_str())),
                    (
                        "line",
                        Value::Array(line.iter().map(WireValue::to_cbor).collect()),
                    ),
                ],
            ),
            Request::Unsupported { name } => tagged(name, []),
        }
    }

    /// Parses a CBOR value. Unknown `type` names become [`Request::Unsupported`].
    pub fn from_cbor(value: &Value) -> CodecResult<Self> {
        let fields = Fields::of(value, "request")?;
        Ok(match fields.tag()? {
            "CreatePage" => Request::CreatePage {
                title: fields.text("title")?.to_string(),
            },
            "SaveValue" => Request::SaveValue {
                value: WireValue::from_cbor(fields.required("value")?)?,
            },
            "GetPages" => Request::GetPages {
                offset: fields.unsigned("offset")?,
                limit: fields.unsigned("limit")?,
            },
            "GetPageLines" => Request::GetPageLines {
                page_id: fields.id("pageId")?,
                offset: fields.unsigned("offset")?,
                limit: fields.unsigned("limit")?,
            },
            "AddPageLine" => Request::AddPageLine {
                page_id: fields.id("pageId")?,
                line_type: WireLineType::parse(fields.text("lineType")?)?,
                line: WireValue::list_from_cbor(fields.array("line")?)?,
            },
            other => Request::Unsupported {
                name: other.to_string(),
            },
        })
    }
}

fn unsigned(n: u64) -> Value {
    Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

/// One entry of a `GetPages` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageItem {
    /// Page id.
    pub id: WireId,
    /// Page title.
    pub title: String,
}

/// One entry of a `GetPageLines` result.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLineItem {
    /// Line id.
    pub id: WireId,
    /// The line's values.
    pub values: Vec<WireValue>,
}

/// The successful result of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Id of the new page.
    CreatePage {
        /// Page id.
        id: WireId,
    },
    /// Id of the saved value.
    SaveValue {
        /// Value id.
        id: WireId,
    },
    /// A window of pages.
    GetPages {
        /// Total number of pages.
        count: u64,
        /// Pages in the window.
        list: Vec<PageItem>,
    },
    /// A window of page lines.
    GetPageLines {
        /// Total number of lines on the page.
        count: u64,
        /// Lines in the window.
        list: Vec<PageLineItem>,
    },
    /// Id of the new line.
    AddPageLine {
        /// Line id.
        id: WireId,
    },
}

impl Response {
    /// Converts to a CBOR value.
    #[must_use]
    pub fn to_cbor(&self) -> Value {
        let id = |id: &WireId| id.to_cbor();
        match self {
            Response::CreatePage { id: page } => tagged("CreatePage", [("id", id(page))]),
            Response::SaveValue { id: value } => tagged("SaveValue", [("id", id(value))]),
            Response::AddPageLine { id: line } => tagged("AddPageLine", [("id", id(line))]),
            Response::GetPages { count, list } => tagged(
                "GetPages",
                [
                    ("count", decimal(*count)),
                    (
                        "list",
                        Value::Array(
                            list.iter()
                                .map(|item| {
                                    Value::text_map([
                                        ("id", id(&item.id)),
                                        ("title", Value::from(item.title.as_str())),
                                    ])
                                })
                                .collect(),
                        ),
                    ),
                ],
            ),
            Response::GetPageLines { count, list } => tagged(
                "GetPageLines",
                [
                    ("count", decimal(*count)),
                    (
                        "list",
                        Value::Array(
                            list.iter()
                                .map(|item| {
                                    Value::text_map([
                                        ("id", id(&item.id)),
                                        (
                                            "values",
                                            Value::Array(
                                                item.values.iter().map(WireValue::to_cbor).collect(),
                                            ),
                                        ),
                                    ])
                                })
                                .collect(),
                        ),
                    ),
                ],
            ),
        }
    }

    /// Parses a CBOR value.
    pub fn from_cbor(value: &Value) -> CodecResult<Self> {
        let fields = Fields::of(value, "result")?;
        Ok(match fields.tag()? {
            "CreatePage" => Response::CreatePage {
                id: fields.id("id")?,
            },
            "SaveValue" => Response::SaveValue {
                id: fields.id("id")?,
            },
            "AddPageLine" => Response::AddPageLine {
                id: fields.id("id")?,
            },
            "GetPages" => Response::GetPages {
                count: fields.decimal("count")?,
                list: fields
                    .array("list")?
                    .iter()
                    .map(|item| {
                        let item = Fields::of(item, "page item")?;
                        Ok(PageItem {
                            id: item.id("id")?,
                            title: item.text("title")?.to_string(),
                        })
                    })
                    .collect::<CodecResult<_>>()?,
            },
            "GetPageLines" => Response::GetPageLines {
                count: fields.decimal("count")?,
                list: fields
                    .array("list")?
                    .iter()
                    .map(|item| {
                        let item = Fields::of(item, "page line item")?;
                        Ok(PageLineItem {
                            id: item.id("id")?,
                            values: WireValue::list_from_cbor(item.array("values")?)?,
                        })
                    })
                    .collect::<CodecResult<_>>()?,
            },
            other => {
                return Err(CodecError::unsupported_type(format!("result `{other}`")))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_request_type_is_unsupported() {
        let value = Value::text_map([("type", Value::from("DeletePage"))]);
        let request = Request::from_cbor(&value).unwrap();
        assert_eq!(
            request,
            Request::Unsupported {
                name: "DeletePage".into()
            }
        );
        assert_eq!(request.name(), "DeletePage");
    }

    #[test]
    fn add_page_line_roundtrip() {
        let request = Request::AddPageLine {
            page_id: WireId([1; 12]),
            line_type: WireLineType::Error,
            line: vec![WireValue::String("boom".into()), WireValue::ValueRef(WireId([2; 12]))],
        };
        assert_eq!(Request::from_cbor(&request.to_cbor()).unwrap(), request);
    }

    #[test]
    fn negative_limit_rejected() {
        let value = Value::text_map([
            ("type", Value::from("GetPages")),
            ("offset", Value::Integer(0)),
            ("limit", Value::Integer(-1)),
        ]);
        assert!(Request::from_cbor(&value).is_err());
    }

    #[test]
    fn bad_line_type_rejected() {
        let value = Value::text_map([
            ("type", Value::from("AddPageLine")),
            ("pageId", Value::Bytes(vec![0; 12])),
            ("lineType", Value::from("Warn")),
            ("line", Value::Array(vec![])),
        ]);
        assert!(Request::from_cbor(&value).is_err());
    }

    #[test]
    fn count_is_a_decimal_string() {
        let response = Response::GetPages {
            count: 12,
            list: vec![PageItem {
                id: WireId([5; 12]),
                title: "t".into(),
            }],
        };
        let value = response.to_cbor();
        assert_eq!(value.get("count"), Some(&Value::from("12")));
        assert_eq!(Response::from_cbor(&value).unwrap(), response);
    }

    #[test]
    fn page_lines_result_roundtrip() {
        let response = Response::GetPageLines {
            count: 1,
            list: vec![PageLineItem {
                id: WireId([9; 12]),
                values: vec![WireValue::Null, WireValue::Number(1.0)],
            }],
        };
        assert_eq!(Response::from_cbor(&response.to_cbor()).unwrap(), response);
    }
}
