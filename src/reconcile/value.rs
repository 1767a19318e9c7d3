//! Generic value model
//!
//! Relational cells are normalized into [`SourceValue`] before comparison;
//! the document side stays as `serde_json::Value`. Both sides expose a
//! string rendering used by the fallback equality rule and by reports.

use chrono::NaiveDateTime;
use serde_json::Value;
use std::collections::BTreeMap;

/// Render format shared by timestamps on both sides
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One relational cell, typed by storage representation
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Json(Value),
}

/// One relational row. Sorted keys keep passthrough comparison and
/// identity iteration deterministic.
pub type Record = BTreeMap<String, SourceValue>;

impl SourceValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SourceValue::Null)
    }

    /// String form used for the fallback comparison and in reports.
    /// Byte payloads are decoded as UTF-8 with invalid sequences dropped;
    /// timestamps render second-precise.
    pub fn render(&self) -> String {
        match self {
            SourceValue::Null => String::new(),
            SourceValue::Bool(b) => b.to_string(),
            SourceValue::Int(i) => i.to_string(),
            SourceValue::Float(f) => render_float(*f),
            SourceValue::Text(s) => s.clone(),
            SourceValue::Bytes(b) => decode_utf8_dropping_invalid(b),
            SourceValue::DateTime(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
            SourceValue::Json(v) => doc_render(v),
        }
    }
}

/// Integral floats keep their `.0` suffix, matching how the projection
/// pipeline serializes float columns into the document
fn render_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

/// Decode bytes as UTF-8, dropping invalid sequences rather than failing
fn decode_utf8_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                break;
            }
            Err(err) => {
                let (valid, after) = rest.split_at(err.valid_up_to());
                if let Ok(s) = std::str::from_utf8(valid) {
                    out.push_str(s);
                }
                let skip = err.error_len().unwrap_or(after.len());
                if skip >= after.len() {
                    break;
                }
                rest = &after[skip..];
            }
        }
    }
    out
}

/// String form of a document-side value. JSON null renders empty so that
/// the fallback rule treats it like an absent value.
pub fn doc_render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

static JSON_NULL: Value = Value::Null;

/// Field lookup on a document object. A key absent from the document is
/// indistinguishable from an explicit null: the projection pipeline omits
/// empty fields, so treating the two differently would flag noise.
pub fn doc_get<'a>(doc: &'a Value, key: &str) -> &'a Value {
    doc.get(key).unwrap_or(&JSON_NULL)
}

/// Resolve a dotted path inside a document record. The empty path yields
/// the record itself.
pub fn doc_lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(doc);
    }
    let mut current = doc;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}
