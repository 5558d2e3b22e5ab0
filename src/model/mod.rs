//! Data model for the export pipeline.
//!
//! The tagged [`Value`] sum is the only row representation the encoders see:
//! the coercer is the single place that interprets database driver types, and
//! every encoder pattern-matches on the variants. Request types and the
//! column projector live in `project`; row coercion lives in `coerce`.

mod coerce;
mod project;

pub use coerce::coerce_row;
pub use project::{
    ColumnMapping, ColumnMappingBody, Compression, ExportFormat, ExportRequest,
    ExportRequestBody, SOURCE_COLUMNS,
};

use chrono::{DateTime, SecondsFormat, Utc};

/// A normalized database value.
///
/// Fixed-point decimals are carried as their canonical text with trailing
/// zeros preserved to scale 4, so no encoder ever re-renders a float.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// SQL NULL (absent JSON values coerce here too).
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// Fixed-point decimal as canonical text, e.g. `"45123.5000"`.
    Decimal(String),
    /// Timestamp with time zone.
    Timestamp(DateTime<Utc>),
    /// Text.
    Text(String),
    /// Ordered list of nested values.
    List(Vec<Value>),
    /// Nested document; entry order is preserved.
    Document(Vec<(String, Value)>),
}

impl Value {
    /// Renders a scalar variant as text; `None` for NULL and the nested
    /// variants, which each encoder handles by its own grammar.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Value::Null | Value::List(_) | Value::Document(_) => None,
            Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::Decimal(text) => Some(text.clone()),
            Value::Timestamp(ts) => Some(format_timestamp(ts)),
            Value::Text(text) => Some(text.clone()),
        }
    }

    /// Converts to a `serde_json::Value`.
    ///
    /// Decimals and timestamps become strings (the canonical text), so JSON
    /// consumers never see precision loss. Document key order survives via
    /// serde_json's order-preserving map.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Decimal(text) => serde_json::Value::String(text.clone()),
            Value::Timestamp(ts) => serde_json::Value::String(format_timestamp(ts)),
            Value::Text(text) => serde_json::Value::String(text.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Document(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }

    /// Builds a [`Value`] back from a JSON tree (used for `metadata`).
    ///
    /// Integers that fit i64 stay integers; any other JSON number is carried
    /// as decimal text.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Decimal(n.to_string()),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Document(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Formats a timestamp as ISO-8601 extended with zone offset and microsecond
/// precision, e.g. `2024-03-01T08:15:00.000000+00:00`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}
