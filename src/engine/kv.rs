//! Key/value candidate extraction from free text.
//!
//! Lines are scanned for separator runes (`:`, `=`, the two-character forms
//! `:=` / `==`, and full-width `：`); the nearest non-cutter token to the
//! left becomes the key and the nearest non-cutter token to the right the
//! value. Cutters are whitespace, brackets, quotes and list punctuation.
//!
//! Candidates are *candidates* only: KV-typed detectors decide whether a
//! key is interesting. Extraction therefore errs on the side of producing
//! a pair per separator and lets detection discard the noise.

/// One extracted candidate. `value_start` is the byte offset of the value
/// within the scanned line, so detector spans can be rebased onto it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct KvCandidate {
    pub(crate) key: String,
    pub(crate) value: String,
    pub(crate) value_start: usize,
}

/// Bytes that terminate tokens on both sides of a separator.
fn is_cutter(b: u8) -> bool {
    b.is_ascii_whitespace()
        || matches!(
            b,
            b'(' | b')'
                | b'['
                | b']'
                | b'{'
                | b'}'
                | b'<'
                | b'>'
                | b'"'
                | b'\''
                | b'`'
                | b','
                | b';'
                | b'&'
                | b'|'
        )
}

fn is_separator(b: u8) -> bool {
    b == b':' || b == b'='
}

/// Extract key/value candidates from a (preprocessed) line.
pub(crate) fn extract_kv(line: &str) -> Vec<KvCandidate> {
    let bytes = line.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        // Full-width `：` survives when the caller skipped preprocessing.
        let (sep_len, is_sep) = if bytes[i..].starts_with("：".as_bytes()) {
            (3, true)
        } else if is_separator(bytes[i]) {
            // Treat `:=` and `==` as a single two-byte separator.
            let two = i + 1 < bytes.len() && bytes[i + 1] == b'=';
            (if two { 2 } else { 1 }, true)
        } else {
            (1, false)
        };

        if !is_sep {
            i += sep_len;
            continue;
        }

        let key = key_before(bytes, i);
        let (value, value_start) = value_after(bytes, i + sep_len);

        if let (Some(key), Some(value)) = (key, value) {
            out.push(KvCandidate {
                key,
                value,
                value_start,
            });
        }
        i += sep_len;
    }

    out
}

/// Nearest non-cutter token ending strictly before `sep`.
fn key_before(bytes: &[u8], sep: usize) -> Option<String> {
    let mut end = sep;
    while end > 0 && is_cutter(bytes[end - 1]) {
        end -= 1;
    }
    if end == 0 {
        return None;
    }
    let mut start = end;
    while start > 0 && !is_cutter(bytes[start - 1]) && !is_separator(bytes[start - 1]) {
        start -= 1;
    }
    if start == end {
        return None;
    }
    std::str::from_utf8(&bytes[start..end])
        .ok()
        .map(|s| s.to_string())
}

/// Nearest non-cutter token starting at or after `from`, plus its offset.
///
/// Separator bytes are allowed *inside* values (URLs, base64 padding); a
/// value only ends at a cutter.
fn value_after(bytes: &[u8], from: usize) -> (Option<String>, usize) {
    let mut start = from;
    while start < bytes.len() && is_cutter(bytes[start]) {
        start += 1;
    }
    if start >= bytes.len() {
        return (None, start);
    }
    let mut end = start;
    while end < bytes.len() && !is_cutter(bytes[end]) {
        end += 1;
    }
    match std::str::from_utf8(&bytes[start..end]) {
        Ok(s) => (Some(s.to_string()), start),
        Err(_) => (None, start),
    }
}
