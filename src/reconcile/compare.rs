//! Field Normalizer & Comparator
//!
//! Decides equality of a (relational cell, document value) pair under the
//! representation differences between the two stores. Rules are applied in
//! a fixed order and the first match wins: the looser cross-representation
//! rules (temporal, boolean, numeric) must pre-empt the strict string
//! fallback. Nothing here can fail; unparseable values deterministically
//! reach the fallback rule.

use crate::reconcile::value::{doc_render, SourceValue};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;

/// Fields compared under the temporal normalization rule
static TEMPORAL_FIELDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "CreatedAt",
        "UpdatedAt",
        "DeletedAt",
        "InstallTime",
        "RequiredTime",
        "EffectiveTime",
        "EffectiveSuccessfulTime",
        "LastUpdateTimeStamp",
    ]
    .into_iter()
    .collect()
});

pub fn is_temporal_field(field_name: &str) -> bool {
    TEMPORAL_FIELDS.contains(field_name)
}

/// Cross-store field equality. `field_name` selects the temporal rule for
/// the statically known timestamp columns.
pub fn fields_equal(source: &SourceValue, document: &Value, field_name: &str) -> bool {
    // Absent on both sides: a source NULL matches document null or ""
    if source.is_null() && (document.is_null() || document.as_str() == Some("")) {
        return true;
    }

    // Temporal fields: second-precision string comparison after stripping
    // the document side's timezone marker and `T` separator. A null source
    // or a non-string document falls through.
    if is_temporal_field(field_name) && !source.is_null() {
        if let Some(doc_text) = document.as_str() {
            let source_text = truncate_to_seconds(&source.render());
            let doc_text = normalize_document_timestamp(doc_text);
            return source_text == doc_text;
        }
    }

    // Source boolean stored as 0/1 on the document side
    if let SourceValue::Bool(b) = source {
        if !document.is_boolean() {
            let coerced = if *b { "1" } else { "0" };
            return coerced == doc_render(document);
        }
    }

    // Source numeric stored as text on the document side
    if matches!(source, SourceValue::Int(_) | SourceValue::Float(_)) {
        if let Some(doc_text) = document.as_str() {
            return source.render() == doc_text;
        }
    }

    // Fallback: exact string equality. Byte payloads were already decoded
    // by the rendering step.
    source.render() == doc_render(document)
}

/// Strip a trailing timezone offset or UTC marker, convert the `T`
/// separator to a space, truncate to second precision
fn normalize_document_timestamp(text: &str) -> String {
    let text = text.split('+').next().unwrap_or(text);
    let text = text.split('Z').next().unwrap_or(text);
    let text = text.trim().replace('T', " ");
    truncate_to_seconds(&text)
}

/// `YYYY-MM-DD HH:MM:SS` is 19 characters
fn truncate_to_seconds(text: &str) -> String {
    text.get(..19).unwrap_or(text).to_string()
}
