//! Path resolution: turn variable-length segment lists into canonical paths.
//!
//! A path is an ordered, non-empty sequence of non-empty text segments. Paths
//! are the identity of an item inside a container. Containers that only know
//! two levels (section, option) expand a single-segment path into
//! `(default_section, segment)`.

use serde_json::Value;

use crate::error::PathError;

/// Reserved section name for single-segment paths in two-level containers.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Validate `segments` and return them as an owned path.
///
/// Fails if any segment is empty or if no segments are given.
pub fn resolve_path<S: AsRef<str>>(segments: &[S]) -> Result<Vec<String>, PathError> {
    for segment in segments {
        if segment.as_ref().is_empty() {
            return Err(PathError::EmptySegment);
        }
    }
    if segments.is_empty() {
        return Err(PathError::Empty);
    }
    Ok(segments.iter().map(|s| s.as_ref().to_string()).collect())
}

/// Like [`resolve_path`], but an empty prefix is legal and matches everything.
pub fn resolve_prefix<S: AsRef<str>>(segments: &[S]) -> Result<Vec<String>, PathError> {
    if segments.is_empty() {
        return Ok(Vec::new());
    }
    resolve_path(segments)
}

/// Resolve a path whose segments arrive as dynamic values.
///
/// Every segment must be a string; type is checked for all segments before
/// emptiness, so `[1, ""]` reports the non-text segment.
pub fn resolve_value_path(segments: &[Value]) -> Result<Vec<String>, PathError> {
    let mut texts = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Value::String(s) => texts.push(s.as_str()),
            other => return Err(PathError::NotText(describe(other))),
        }
    }
    resolve_path(&texts)
}

/// Prepend `default_section` to single-segment paths.
pub fn with_default_section(mut path: Vec<String>, default_section: &str) -> Vec<String> {
    if path.len() == 1 {
        path.insert(0, default_section.to_string());
    }
    path
}

/// Join path segments with `sep`.
pub fn join<S: AsRef<str>>(path: &[S], sep: &str) -> String {
    path.iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(sep)
}

/// True if `path` starts with every segment of `prefix`.
pub fn has_prefix(path: &[String], prefix: &[String]) -> bool {
    path.len() >= prefix.len() && path[..prefix.len()] == *prefix
}

fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    };
    format!("a {kind}: {value}")
}
