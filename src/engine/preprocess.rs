//! Byte-length-preserving line preprocessing.
//!
//! Two normalizations run before detection: backslash escapes are unquoted
//! (the backslash is blanked and the literal control byte substituted), and
//! CJK full-width punctuation is rewritten to its ASCII equivalent padded
//! with spaces to the same byte width.
//!
//! # Invariants
//! - `preprocess_line(line).len() == line.len()` for every input. All byte
//!   offsets computed downstream stay valid against the original input; the
//!   merge and splice stages depend on this.
//! - Output is valid UTF-8: escapes touch only ASCII bytes, and each 3-byte
//!   full-width char is replaced by 3 ASCII bytes.

use std::borrow::Cow;

/// Full-width punctuation and its ASCII replacement. Each entry is a 3-byte
/// UTF-8 sequence mapped to one ASCII byte plus two spaces of padding.
const FULLWIDTH: &[(char, u8)] = &[
    ('【', b'['),
    ('】', b']'),
    ('：', b':'),
    ('「', b'"'),
    ('」', b'"'),
    ('（', b'('),
    ('）', b')'),
    ('《', b'<'),
    ('》', b'>'),
    ('。', b'.'),
    ('？', b'?'),
    ('！', b'!'),
    ('，', b','),
    ('、', b','),
    ('；', b';'),
];

fn fullwidth_ascii(c: char) -> Option<u8> {
    FULLWIDTH.iter().find(|(fw, _)| *fw == c).map(|&(_, a)| a)
}

/// Literal byte for a backslash escape, if the escape is one we unquote.
fn escape_literal(b: u8) -> Option<u8> {
    match b {
        b'n' => Some(b'\n'),
        b't' => Some(b'\t'),
        b'r' => Some(b'\r'),
        b'"' => Some(b'"'),
        b'\'' => Some(b'\''),
        b'\\' => Some(b'\\'),
        _ => None,
    }
}

/// Normalize one line for detection without changing its byte length.
///
/// Returns `Cow::Borrowed` when nothing needed rewriting, which is the
/// common case for plain ASCII log lines.
pub(crate) fn preprocess_line(line: &str) -> Cow<'_, str> {
    let bytes = line.as_bytes();
    let needs_escape = bytes.windows(2).any(|w| w[0] == b'\\' && escape_literal(w[1]).is_some());
    let needs_width = line.chars().any(|c| fullwidth_ascii(c).is_some());
    if !needs_escape && !needs_width {
        return Cow::Borrowed(line);
    }

    let mut out = bytes.to_vec();

    if needs_escape {
        let mut i = 0;
        while i + 1 < out.len() {
            if out[i] == b'\\' {
                if let Some(lit) = escape_literal(out[i + 1]) {
                    // Blank the backslash, substitute the literal byte.
                    out[i] = b' ';
                    out[i + 1] = lit;
                    i += 2;
                    continue;
                }
            }
            i += 1;
        }
    }

    if needs_width {
        // Re-walk by chars over the escape-normalized bytes. Escapes only
        // rewrote ASCII in place, so this is still valid UTF-8.
        let s = String::from_utf8(out).unwrap_or_else(|e| {
            // Escape rewriting is byte-for-byte ASCII; this cannot happen.
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        });
        let mut buf = Vec::with_capacity(s.len());
        for c in s.chars() {
            match fullwidth_ascii(c) {
                Some(a) => {
                    debug_assert_eq!(c.len_utf8(), 3);
                    buf.push(a);
                    buf.push(b' ');
                    buf.push(b' ');
                }
                None => {
                    let mut tmp = [0u8; 4];
                    buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
                }
            }
        }
        debug_assert_eq!(buf.len(), line.len());
        return Cow::Owned(String::from_utf8(buf).expect("ascii substitution kept utf-8 valid"));
    }

    debug_assert_eq!(out.len(), line.len());
    Cow::Owned(String::from_utf8(out).expect("escape substitution kept utf-8 valid"))
}
