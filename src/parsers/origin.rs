//! Storage origin extraction from plaso path specifications.
//!
//! Events exported from a disk image carry a nested path specification
//! whose outermost level names the image file on the analyst's machine.
//! That location is reversed segment by segment so that values group by
//! image name first, e.g. `/media/images/fileserver.dd` becomes
//! `fileserver.dd/images/media/`.

use serde_json::Value;

use super::literal::{self, Literal};
use crate::errors::{HopTraceError, Result};

/// Extracts the reversed origin path from a record's `pathspec` field.
///
/// The field may be a nested JSON object or a stringified Python dict.
/// A missing or mistyped field yields an empty origin; a string field
/// that does not decode to a dict is a hard parse error.
pub fn storage_origin(record: &Value) -> Result<String> {
    let location = match record.get("pathspec") {
        Some(spec @ Value::Object(_)) => outermost_location(spec).to_string(),
        Some(Value::String(repr)) => {
            let decoded = literal::parse(repr)?;
            if !matches!(decoded, Literal::Dict(_)) {
                return Err(HopTraceError::LiteralDecode {
                    offset: 0,
                    message: "path specification literal is not a dict".to_string(),
                });
            }
            outermost_location_literal(&decoded).to_string()
        }
        _ => return Ok(String::new()),
    };
    Ok(reverse_path(&location))
}

fn outermost_location(spec: &Value) -> &str {
    let mut spec = spec;
    while let Some(parent) = spec.get("parent") {
        if !parent.is_object() {
            break;
        }
        spec = parent;
    }
    spec.get("location").and_then(Value::as_str).unwrap_or("")
}

fn outermost_location_literal(spec: &Literal) -> &str {
    let mut spec = spec;
    while let Some(parent) = spec.get("parent") {
        if !matches!(parent, Literal::Dict(_)) {
            break;
        }
        spec = parent;
    }
    spec.get("location").and_then(Literal::as_str).unwrap_or("")
}

fn reverse_path(location: &str) -> String {
    let mut segments: Vec<&str> = location.split('/').collect();
    segments.reverse();
    segments.join("/")
}
