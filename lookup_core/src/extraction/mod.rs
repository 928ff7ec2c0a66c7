//! Turn an unreliable lookup page into ordered, labelled records.
//!
//! The remote page has no stable contract: it may hold a JSON array, an
//! enveloped object, or truncated JSON. [`classify`] tries the strategies
//! from strict to lenient and keeps the first one yielding records;
//! [`extract`] then filters and labels the fields.

pub mod labels;
pub mod strategy;

use serde_json::Value;
use tracing::debug;

pub use strategy::{Candidate, Miss, Shape};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Key as it appeared in the source.
    pub key: String,
    /// Human-readable label, or the key itself when unknown.
    pub label: String,
    pub value: String,
    /// Whether `label` came from the known-field table.
    pub known: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    /// 1-based position in the source text.
    pub ordinal: usize,
    pub fields: Vec<Field>,
}

fn attempt(name: &str, result: Result<Shape, Miss>) -> Result<Shape, Miss> {
    match &result {
        Ok(shape) => debug!("Extraction strategy {name} matched ({})", shape.name()),
        Err(miss) => debug!("Extraction strategy {name} missed: {miss}"),
    }
    result
}

/// Run the strategy cascade, stopping at the first success.
///
/// The object strategy only runs when the text holds no `[...]` span at
/// all; a bracketed array that yields nothing goes straight to the
/// key/value fallback.
#[must_use]
pub fn classify(text: &str) -> Shape {
    attempt("array-json", strategy::array_json(text))
        .or_else(|miss| {
            if miss.found_delimiters() {
                Err(miss)
            } else {
                attempt("object-json", strategy::object_json(text))
            }
        })
        .or_else(|_| attempt("key-value", strategy::key_value(text)))
        .unwrap_or(Shape::NoStructuredData)
}

/// Extract labelled records from raw page text.
///
/// An empty result means nothing structured was found and the caller should
/// fall back to showing the raw text.
#[must_use]
pub fn extract(text: &str) -> Vec<ExtractedRecord> {
    classify(text)
        .into_candidates()
        .into_iter()
        .zip(1..)
        .map(|(candidate, ordinal)| ExtractedRecord {
            ordinal,
            fields: candidate.into_iter().filter_map(to_field).collect(),
        })
        .collect()
}

fn to_field((key, value): (String, Value)) -> Option<Field> {
    if labels::is_skipped(&key) {
        return None;
    }
    let value = value_text(&value);
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let (label, known) = labels::known_label(&key)
        .map_or_else(|| (key.clone(), false), |label| (label.to_string(), true));
    Some(Field {
        key,
        label,
        value: value.to_string(),
        known,
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
