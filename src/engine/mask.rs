//! Compiled maskers: one redaction strategy per configured mask rule.
//!
//! Mask rules arrive as strings (`mask_type`, algorithm names, character
//! classes) and are resolved here into a closed [`MaskKind`] at load time,
//! so the per-call path dispatches on an enum instead of comparing strings.
//!
//! The DEIDENTIFY algorithm re-enters the detection pipeline on the
//! substring being masked; the masker reaches back through [`MaskContext`]
//! rather than holding a reference to the engine.

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD as BASE64_STD;
use base64::Engine as _;
use md5::{Digest as _, Md5};

use crate::api::MaskRuleCfg;
use crate::errors::{ConfigError, MaskError};

/// Callback surface the ALGO maskers use to re-enter the engine.
pub(crate) trait MaskContext {
    /// Run the full detect-and-mask pipeline on `text` (DEIDENTIFY).
    fn deidentify_fragment(&self, text: &str) -> Option<String>;
}

/// A no-op context for paths that must not recurse (e.g. inside a
/// DEIDENTIFY expansion already in flight).
pub(crate) struct NoRecurse;

impl MaskContext for NoRecurse {
    fn deidentify_fragment(&self, _text: &str) -> Option<String> {
        None
    }
}

// --------------------------
// Ignored-character set
// --------------------------

/// Byte-class set built from named classes plus explicit characters.
#[derive(Clone, Debug, Default)]
pub(crate) struct IgnoreSet {
    numeric: bool,
    uppercase: bool,
    lowercase: bool,
    whitespace: bool,
    punctuation: bool,
    chars: Vec<char>,
}

impl IgnoreSet {
    fn from_cfg(rule: &str, classes: &[String], chars: &str) -> Result<Self, ConfigError> {
        let mut set = IgnoreSet {
            chars: chars.chars().collect(),
            ..IgnoreSet::default()
        };
        for class in classes {
            match class.to_ascii_uppercase().as_str() {
                "NUMERIC" => set.numeric = true,
                "UPPERCASE" => set.uppercase = true,
                "LOWERCASE" => set.lowercase = true,
                "WHITESPACE" => set.whitespace = true,
                "PUNCTUATION" => set.punctuation = true,
                _ => {
                    return Err(ConfigError::UnknownCharClass {
                        rule: rule.to_string(),
                        class: class.clone(),
                    })
                }
            }
        }
        Ok(set)
    }

    fn contains(&self, c: char) -> bool {
        (self.numeric && c.is_ascii_digit())
            || (self.uppercase && c.is_ascii_uppercase())
            || (self.lowercase && c.is_ascii_lowercase())
            || (self.whitespace && c.is_whitespace())
            || (self.punctuation && c.is_ascii_punctuation())
            || self.chars.contains(&c)
    }
}

// --------------------------
// Compiled mask kinds
// --------------------------

/// Parameters for CHAR substitution masking.
#[derive(Clone, Debug)]
pub(crate) struct CharMask {
    pub(crate) mask_char: char,
    /// Characters preserved at the scan start.
    pub(crate) offset: usize,
    /// Characters preserved at the far end.
    pub(crate) padding: usize,
    /// Cap on replaced characters; zero means no cap.
    pub(crate) length: usize,
    /// Scan backward from the end.
    pub(crate) reverse: bool,
    pub(crate) ignore: IgnoreSet,
}

/// Closed set of ALGO masker algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MaskAlgo {
    Base64,
    Md5,
    Crc32,
    Address,
    Number,
    Deidentify,
}

impl MaskAlgo {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "BASE64" => Some(MaskAlgo::Base64),
            "MD5" => Some(MaskAlgo::Md5),
            "CRC32" => Some(MaskAlgo::Crc32),
            "ADDRESS" => Some(MaskAlgo::Address),
            "NUMBER" => Some(MaskAlgo::Number),
            "DEIDENTIFY" => Some(MaskAlgo::Deidentify),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum MaskKind {
    Char(CharMask),
    Tag,
    Replace(String),
    Algo(MaskAlgo),
}

/// One compiled mask rule.
#[derive(Clone, Debug)]
pub(crate) struct Masker {
    pub(crate) name: String,
    pub(crate) kind: MaskKind,
}

impl Masker {
    /// Resolve a parsed mask rule into its compiled form.
    pub(crate) fn compile(cfg: &MaskRuleCfg) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("offset", cfg.offset),
            ("padding", cfg.padding),
            ("length", cfg.length),
        ] {
            if value < 0 {
                return Err(ConfigError::NegativeParam {
                    rule: cfg.name.clone(),
                    field,
                    value,
                });
            }
        }

        let kind = match cfg.mask_type.to_ascii_uppercase().as_str() {
            "CHAR" => MaskKind::Char(CharMask {
                mask_char: cfg.value.chars().next().unwrap_or('*'),
                offset: cfg.offset as usize,
                padding: cfg.padding as usize,
                length: cfg.length as usize,
                reverse: cfg.reverse,
                ignore: IgnoreSet::from_cfg(&cfg.name, &cfg.ignore_charsets, &cfg.ignore_chars)?,
            }),
            "TAG" => MaskKind::Tag,
            "REPLACE" => MaskKind::Replace(cfg.value.clone()),
            "ALGO" => match MaskAlgo::parse(&cfg.value) {
                Some(algo) => MaskKind::Algo(algo),
                None => {
                    return Err(ConfigError::UnknownMaskAlgo {
                        rule: cfg.name.clone(),
                        algo: cfg.value.clone(),
                    })
                }
            },
            _ => {
                return Err(ConfigError::UnknownMaskType {
                    rule: cfg.name.clone(),
                    mask_type: cfg.mask_type.clone(),
                })
            }
        };

        Ok(Masker {
            name: cfg.name.clone(),
            kind,
        })
    }

    /// Apply this masker. `info_type` feeds the TAG strategy; `ctx` feeds
    /// DEIDENTIFY.
    pub(crate) fn mask(
        &self,
        text: &str,
        info_type: &str,
        ctx: &dyn MaskContext,
    ) -> Result<String, MaskError> {
        match &self.kind {
            MaskKind::Char(m) => Ok(mask_char(text, m)),
            MaskKind::Tag => Ok(format!("<{info_type}>")),
            MaskKind::Replace(value) => Ok(value.clone()),
            MaskKind::Algo(algo) => match algo {
                MaskAlgo::Base64 => Ok(BASE64_STD.encode(text.as_bytes())),
                MaskAlgo::Md5 => {
                    let digest = Md5::digest(text.as_bytes());
                    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
                }
                MaskAlgo::Crc32 => Ok(crc32fast::hash(text.as_bytes()).to_string()),
                MaskAlgo::Address => Ok(mask_address(text)),
                MaskAlgo::Number => Ok(text
                    .chars()
                    .map(|c| if c.is_ascii_digit() { '*' } else { c })
                    .collect()),
                MaskAlgo::Deidentify => match ctx.deidentify_fragment(text) {
                    Some(masked) => Ok(masked),
                    None => Ok(text.to_string()),
                },
            },
        }
    }
}

// --------------------------
// CHAR masking
// --------------------------

/// Replace up to `length` characters with the mask char, scanning forward
/// from `offset` (or backward from the end when `reverse`), stopping
/// `padding` characters before the far end and skipping ignored characters.
fn mask_char(text: &str, m: &CharMask) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    if m.offset + m.padding >= n {
        return text.to_string();
    }

    // Eligible span in character indices, before direction is applied.
    let (lo, hi) = if m.reverse {
        (m.padding, n - m.offset)
    } else {
        (m.offset, n - m.padding)
    };

    let mut replaced = 0usize;
    let mut apply = |c: &mut char| -> bool {
        if m.length != 0 && replaced >= m.length {
            return false;
        }
        if !m.ignore.contains(*c) {
            *c = m.mask_char;
            replaced += 1;
        }
        true
    };

    if m.reverse {
        for c in chars[lo..hi].iter_mut().rev() {
            if !apply(c) {
                break;
            }
        }
    } else {
        for c in chars[lo..hi].iter_mut() {
            if !apply(c) {
                break;
            }
        }
    }

    chars.into_iter().collect()
}

// --------------------------
// ADDRESS masking
// --------------------------

/// Landmark lists for geographic address masking. Process-wide read-only
/// singleton, initialized on first use.
struct Landmarks {
    /// Administrative-unit suffixes; everything up to and including the
    /// last one found is preserved.
    entries: &'static [&'static str],
    /// Street/landmark suffixes; preserved while the runs between them are
    /// blanked.
    mids: &'static [&'static str],
}

fn landmarks() -> &'static Landmarks {
    static LANDMARKS: OnceLock<Landmarks> = OnceLock::new();
    LANDMARKS.get_or_init(|| Landmarks {
        entries: &[
            "自治州", "自治区", "省", "市", "区", "县", "旗", "盟", "州", "乡", "镇",
        ],
        mids: &[
            "街道", "大道", "广场", "大厦", "单元", "路", "街", "道", "巷", "村", "号",
            "弄", "栋", "幢", "楼", "层", "室", "院",
        ],
    })
}

/// Blank an address body while keeping recognizable landmarks.
///
/// Keeps everything through the last administrative suffix, replaces the
/// runs between street/landmark suffixes with `*` of matching character
/// length, then masks all digits. If nothing matched at all, falls back to
/// masking the last 3 runes.
fn mask_address(text: &str) -> String {
    let lm = landmarks();

    let cut = lm
        .entries
        .iter()
        .filter_map(|e| text.rfind(e).map(|i| i + e.len()))
        .max()
        .unwrap_or(0);

    let (head, tail) = text.split_at(cut);
    let mut out = String::with_capacity(text.len());
    out.push_str(head);

    let mut rest = tail;
    loop {
        // Earliest next mid landmark in the remaining tail.
        let next = lm
            .mids
            .iter()
            .filter_map(|m| rest.find(m).map(|i| (i, *m)))
            .min_by_key(|&(i, m)| (i, std::cmp::Reverse(m.len())));
        match next {
            Some((i, m)) => {
                out.extend(std::iter::repeat('*').take(rest[..i].chars().count()));
                out.push_str(m);
                rest = &rest[i + m.len()..];
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }

    let masked: String = out
        .chars()
        .map(|c| if c.is_ascii_digit() { '*' } else { c })
        .collect();

    if masked == text {
        // No landmark and no digit matched: mask the last 3 runes.
        let n = text.chars().count();
        return text
            .chars()
            .enumerate()
            .map(|(i, c)| if i + 3 >= n { '*' } else { c })
            .collect();
    }
    masked
}
