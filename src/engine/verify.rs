//! Match verification: context windows and checksum algorithms.
//!
//! Verification runs after blacklist filtering. Context clauses require a
//! dictionary/regex hit within a fixed byte window around the match;
//! checksum algorithms validate the matched text itself. When both are
//! configured, both must hold, and every configured algorithm must pass.
//!
//! All checks mirror the semantics the detectors rely on: comparisons are
//! lower-cased, literal context hits must sit on whole-word boundaries
//! (an adjacent ASCII letter breaks the hit; any multi-byte rune always
//! counts as a boundary).

use aho_corasick::AhoCorasick;
use regex::Regex;

use crate::api::CONTEXT_WINDOW_BYTES;

// --------------------------
// Checksum algorithms
// --------------------------

/// Closed set of checksum verifiers, resolved from config strings at load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum VerifyAlgo {
    IdCard,
    AbaRouting,
    CreditCard,
    Bitcoin,
    Domain,
}

impl VerifyAlgo {
    pub(crate) fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "IDCARD" => Some(VerifyAlgo::IdCard),
            "ABAROUTING" => Some(VerifyAlgo::AbaRouting),
            "CREDITCARD" => Some(VerifyAlgo::CreditCard),
            "BITCOIN" => Some(VerifyAlgo::Bitcoin),
            "DOMAIN" => Some(VerifyAlgo::Domain),
            _ => None,
        }
    }

    pub(crate) fn check(self, text: &str) -> bool {
        match self {
            VerifyAlgo::IdCard => idcard_ok(text),
            VerifyAlgo::AbaRouting => aba_routing_ok(text),
            VerifyAlgo::CreditCard => credit_card_ok(text),
            VerifyAlgo::Bitcoin => bitcoin_ok(text),
            VerifyAlgo::Domain => domain_ok(text),
        }
    }
}

/// Chinese resident id card: 18 characters, weighted mod-11 check digit.
pub(crate) fn idcard_ok(text: &str) -> bool {
    const WEIGHTS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];
    const CHECK: [u8; 11] = [b'1', b'0', b'X', b'9', b'8', b'7', b'6', b'5', b'4', b'3', b'2'];

    let bytes = text.as_bytes();
    if bytes.len() != 18 {
        return false;
    }
    let mut sum = 0u32;
    for (i, &b) in bytes[..17].iter().enumerate() {
        if !b.is_ascii_digit() {
            return false;
        }
        sum += (b - b'0') as u32 * WEIGHTS[i];
    }
    CHECK[(sum % 11) as usize] == bytes[17].to_ascii_uppercase()
}

/// ABA routing number: exactly 9 digits (hyphens stripped), repeating
/// 3-7-1 weights summing to 0 mod 10.
pub(crate) fn aba_routing_ok(text: &str) -> bool {
    const WEIGHTS: [u32; 3] = [3, 7, 1];

    let mut sum = 0u32;
    let mut n = 0usize;
    for b in text.bytes() {
        if b == b'-' {
            continue;
        }
        if !b.is_ascii_digit() || n >= 9 {
            return false;
        }
        sum += (b - b'0') as u32 * WEIGHTS[n % 3];
        n += 1;
    }
    n == 9 && sum % 10 == 0
}

/// Payment card Luhn check over 13-19 digits (hyphens stripped).
pub(crate) fn credit_card_ok(text: &str) -> bool {
    let mut digits = [0u8; 19];
    let mut n = 0usize;
    for b in text.bytes() {
        if b == b'-' {
            continue;
        }
        if !b.is_ascii_digit() || n >= 19 {
            return false;
        }
        digits[n] = b - b'0';
        n += 1;
    }
    if n < 13 {
        return false;
    }
    let mut sum = 0u32;
    for (i, &d) in digits[..n].iter().rev().enumerate() {
        let mut v = d as u32;
        if i % 2 == 1 {
            v *= 2;
            if v > 9 {
                v -= 9;
            }
        }
        sum += v;
    }
    sum % 10 == 0
}

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn base58_value(b: u8) -> Option<u8> {
    BASE58_ALPHABET.iter().position(|&c| c == b).map(|p| p as u8)
}

/// Base58Check decode into exactly 25 bytes. Returns `None` on a foreign
/// character or if the decoded value does not fit.
fn base58_decode25(text: &str) -> Option<[u8; 25]> {
    let mut out = [0u8; 25];
    for b in text.bytes() {
        let mut carry = base58_value(b)? as u32;
        for byte in out.iter_mut().rev() {
            carry += 58 * (*byte as u32);
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        if carry != 0 {
            return None;
        }
    }
    Some(out)
}

/// Legacy bitcoin address: Base58Check, version byte 0, last 4 bytes equal
/// the first 4 of `SHA256(SHA256(payload))`.
pub(crate) fn bitcoin_ok(text: &str) -> bool {
    use sha2::{Digest, Sha256};

    let Some(raw) = base58_decode25(text) else {
        return false;
    };
    if raw[0] != 0 {
        return false;
    }
    let first = Sha256::digest(&raw[..21]);
    let second = Sha256::digest(first);
    second[..4] == raw[21..25]
}

/// Historical gTLD/ccTLD suffixes used by the DOMAIN verifier. The list is
/// embedded; rule authors pair it with a hostname-shaped regex.
const TLD_SUFFIXES: &[&str] = &[
    "com", "org", "net", "int", "edu", "gov", "mil", "arpa", "aero", "asia", "biz", "cat",
    "coop", "info", "jobs", "mobi", "museum", "name", "post", "pro", "tel", "travel", "xxx",
    "ac", "ad", "ae", "af", "ag", "ar", "at", "au", "be", "bg", "br", "by", "ca", "ch", "cl",
    "cn", "co", "cz", "de", "dk", "ee", "eg", "es", "eu", "fi", "fr", "gr", "hk", "hu", "id",
    "ie", "il", "in", "ir", "is", "it", "jp", "kr", "kz", "lt", "lu", "lv", "mo", "mx", "my",
    "nl", "no", "nz", "ph", "pk", "pl", "pt", "ro", "rs", "ru", "sa", "se", "sg", "sk", "th",
    "tr", "tw", "ua", "uk", "us", "vn", "za",
];

/// Suffix match against the embedded TLD list (case-folded).
pub(crate) fn domain_ok(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    let Some(last) = lower.rsplit('.').next() else {
        return false;
    };
    // A bare TLD is not a domain; require at least one dot.
    if last.len() == lower.len() {
        return false;
    }
    TLD_SUFFIXES.iter().any(|&t| t == last)
}

// --------------------------
// Context window
// --------------------------

/// Compiled context clause: dictionary automaton plus regexes.
///
/// Literals are lower-cased at build time; the automaton runs over a
/// lower-cased window so CJK context words match exactly and ASCII matches
/// case-insensitively.
#[derive(Clone, Debug)]
pub(crate) struct ContextClause {
    pub(crate) literals: Option<AhoCorasick>,
    pub(crate) regexs: Vec<Regex>,
}

impl ContextClause {
    pub(crate) fn is_empty(&self) -> bool {
        self.literals.is_none() && self.regexs.is_empty()
    }

    /// True when a dictionary word (whole-word) or regex hits within
    /// [`CONTEXT_WINDOW_BYTES`] of the match span.
    pub(crate) fn hit(&self, buf: &str, start: usize, end: usize) -> bool {
        let win = window(buf, start, end, CONTEXT_WINDOW_BYTES);
        let lowered = win.to_lowercase();

        if let Some(ac) = &self.literals {
            for m in ac.find_iter(&lowered) {
                if whole_word(lowered.as_bytes(), m.start(), m.end()) {
                    return true;
                }
            }
        }
        self.regexs.iter().any(|re| re.is_match(&lowered))
    }
}

/// Slice `radius` bytes around `[start, end)`, clamped to char boundaries.
fn window(buf: &str, start: usize, end: usize, radius: usize) -> &str {
    let mut lo = start.saturating_sub(radius);
    while lo > 0 && !buf.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + radius).min(buf.len());
    while hi < buf.len() && !buf.is_char_boundary(hi) {
        hi += 1;
    }
    &buf[lo..hi]
}

/// Whole-word test for a literal hit: an adjacent ASCII letter breaks the
/// hit; any multi-byte (non-ASCII) rune counts as a boundary.
fn whole_word(buf: &[u8], start: usize, end: usize) -> bool {
    if start > 0 && buf[start - 1].is_ascii_alphabetic() {
        return false;
    }
    if end < buf.len() && buf[end].is_ascii_alphabetic() {
        return false;
    }
    true
}
