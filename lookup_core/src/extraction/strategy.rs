//! The three parsing strategies, from strict to lenient.
//!
//! Each strategy is a pure function from raw text to a [`Shape`] or a
//! [`Miss`] explaining why it produced nothing.

use regex::Regex;
use serde_json::{Map, Number, Value};
use std::sync::OnceLock;
use thiserror::Error;

/// One record's raw field/value pairs, in source order.
pub type Candidate = Map<String, Value>;

/// Structure recognized in a lookup page.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// A top-level JSON array of objects.
    ArrayOfRecords(Vec<Candidate>),
    /// An object carrying its records in a `result` array.
    WrappedArray(Vec<Candidate>),
    /// A single object, or key/value pairs recovered from broken JSON.
    SingleRecord(Candidate),
    NoStructuredData,
}

impl Shape {
    #[must_use]
    pub fn into_candidates(self) -> Vec<Candidate> {
        match self {
            Self::ArrayOfRecords(records) | Self::WrappedArray(records) => records,
            Self::SingleRecord(record) => vec![record],
            Self::NoStructuredData => Vec::new(),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ArrayOfRecords(_) => "array",
            Self::WrappedArray(_) => "wrapped-array",
            Self::SingleRecord(_) => "single-record",
            Self::NoStructuredData => "none",
        }
    }
}

#[derive(Debug, Error)]
pub enum Miss {
    #[error("no {0} delimiters in text")]
    NoDelimiters(&'static str),

    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("parsed JSON holds no records")]
    NoRecords,
}

impl Miss {
    /// Whether the strategy found its delimiters before giving up.
    #[must_use]
    pub const fn found_delimiters(&self) -> bool {
        !matches!(self, Self::NoDelimiters(_))
    }
}

/// `"key": value` with a string or numeric value. Bare literals match
/// without a value so they can be dropped as empty.
static KEY_VALUE: OnceLock<Regex> = OnceLock::new();

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn key_value_pattern() -> &'static Regex {
    KEY_VALUE.get_or_init(|| {
        Regex::new(r#""?(\w+)"\s*:\s*(?:"([^"]*)"|(-?\d+(?:\.\d+)?)|true|false|null)"#)
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

/// Greedy span from the first `open` to the last `close`.
fn span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn objects(values: Vec<Value>) -> Vec<Candidate> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

/// Strict parse of the widest `[...]` span.
pub fn array_json(text: &str) -> Result<Shape, Miss> {
    let raw = span(text, '[', ']').ok_or(Miss::NoDelimiters("array"))?;
    let values: Vec<Value> = serde_json::from_str(raw)?;
    let records = objects(values);
    if records.is_empty() {
        return Err(Miss::NoRecords);
    }
    Ok(Shape::ArrayOfRecords(records))
}

/// Strict parse of the widest `{...}` span, unwrapping a `result` array.
pub fn object_json(text: &str) -> Result<Shape, Miss> {
    let raw = span(text, '{', '}').ok_or(Miss::NoDelimiters("object"))?;
    let mut map: Candidate = serde_json::from_str(raw)?;

    if let Some(Value::Array(_)) = map.get("result") {
        let Some(Value::Array(items)) = map.remove("result") else {
            return Err(Miss::NoRecords);
        };
        let records = objects(items);
        if records.is_empty() {
            return Err(Miss::NoRecords);
        }
        return Ok(Shape::WrappedArray(records));
    }

    if map.is_empty() {
        return Err(Miss::NoRecords);
    }
    Ok(Shape::SingleRecord(map))
}

/// Recover `"key": value` pairs from anywhere in the text into one record.
///
/// Tolerates a missing opening quote on the key. A repeated key keeps its
/// first position and its last value.
pub fn key_value(text: &str) -> Result<Shape, Miss> {
    let mut record = Candidate::new();

    for caps in key_value_pattern().captures_iter(text) {
        let key = caps[1].to_string();
        let value = if let Some(s) = caps.get(2) {
            Value::String(s.as_str().to_string())
        } else if let Some(n) = caps.get(3) {
            n.as_str()
                .parse::<Number>()
                .map_or_else(|_| Value::String(n.as_str().to_string()), Value::Number)
        } else {
            Value::Null
        };
        record.insert(key, value);
    }

    if record.is_empty() {
        return Err(Miss::NoRecords);
    }
    Ok(Shape::SingleRecord(record))
}
