//! JSON handling: generic-tree flatten, leaf rewrite and nested documents.
//!
//! JSON input is parsed into a `serde_json::Value`, every leaf string is
//! flattened depth-first into a `path -> value` map (paths built as `/key`
//! or `key[index]`, lower-cased), and that map runs through the KV
//! pipeline. Rewriting walks the tree again and replaces each detected
//! leaf with its mask text.
//!
//! One twist: a leaf string that itself parses as a JSON object or array
//! is treated as a nested document, recursively detected/masked and
//! re-serialized back into the string leaf.

use serde_json::Value;

use crate::errors::DecodeError;

/// Parse, mapping failures to a [`DecodeError`] with a bounded snippet
/// around the failing offset.
pub(crate) fn parse_json(input: &str) -> Result<Value, DecodeError> {
    serde_json::from_str(input).map_err(|e| {
        let offset = offset_of(input, e.line(), e.column());
        DecodeError {
            offset,
            snippet: snippet_around(input, offset),
            detail: e.to_string(),
        }
    })
}

/// Convert serde_json's 1-based line/column into a byte offset.
fn offset_of(input: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let mut remaining = line - 1;
    let mut offset = 0;
    for (i, b) in input.bytes().enumerate() {
        if remaining == 0 {
            break;
        }
        if b == b'\n' {
            remaining -= 1;
            offset = i + 1;
        }
    }
    (offset + column.saturating_sub(1)).min(input.len())
}

/// Up to 16 bytes each side of `offset`, clamped to char boundaries.
fn snippet_around(input: &str, offset: usize) -> String {
    let mut lo = offset.saturating_sub(16);
    while lo > 0 && !input.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (offset + 16).min(input.len());
    while hi < input.len() && !input.is_char_boundary(hi) {
        hi += 1;
    }
    input[lo..hi].to_string()
}

/// Depth-first flatten of every leaf string into `(path, value)` pairs.
///
/// Paths are lower-cased; object fields append `/key`, array elements
/// append `[index]` to the parent path.
pub(crate) fn flatten(value: &Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let path = format!("{}/{}", prefix, k.to_lowercase());
                flatten(v, &path, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                let path = format!("{prefix}[{i}]");
                flatten(v, &path, out);
            }
        }
        Value::String(s) => {
            out.push((prefix.to_string(), s.clone()));
        }
        // Numbers, bools and nulls carry no maskable text.
        _ => {}
    }
}

/// True when a leaf string should be retried as a nested JSON document.
///
/// Only objects and arrays count; bare strings/numbers would make every
/// numeric field recurse.
pub(crate) fn parse_nested(leaf: &str) -> Option<Value> {
    let trimmed = leaf.trim_start();
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        return None;
    }
    match serde_json::from_str::<Value>(leaf) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => Some(v),
        _ => None,
    }
}

/// Rewrite leaves in place. `mask_for` maps `(path, leaf value)` to the
/// replacement text; `nested` is invoked for leaves that parse as nested
/// documents and returns the replacement string, or `None` to leave the
/// leaf alone.
pub(crate) fn rewrite_leaves(
    value: &mut Value,
    prefix: &str,
    mask_for: &dyn Fn(&str, &str) -> Option<String>,
    nested: &mut dyn FnMut(&str) -> Option<String>,
) {
    match value {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                let path = format!("{}/{}", prefix, k.to_lowercase());
                rewrite_leaves(v, &path, mask_for, nested);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter_mut().enumerate() {
                let path = format!("{prefix}[{i}]");
                rewrite_leaves(v, &path, mask_for, nested);
            }
        }
        Value::String(s) => {
            if let Some(mask) = mask_for(prefix, s) {
                *s = mask;
            } else if let Some(replaced) = nested(s) {
                *s = replaced;
            }
        }
        _ => {}
    }
}
