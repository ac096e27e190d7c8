//! Public data model: the parsed rule document consumed by the engine and
//! the detection results it produces.
//!
//! The document schema (YAML/JSON) is owned by the collaborator that parses
//! it; these structs are the contract it deserializes into. Stringly-typed
//! fields (`mask_type`, algorithm names, character classes) stay strings
//! here and are resolved into closed enums when the engine compiles a
//! snapshot, so unknown values are rejected once at load time instead of
//! being compared per call.
//!
//! # Invariants
//! - `RuleId` is globally unique across loaded rules and doubles as the
//!   merge tie-break priority.
//! - `DetectResult` byte offsets are half-open and index the *original*
//!   input handed to the engine, never a preprocessed copy.

use serde::{Deserialize, Serialize};

/// Rule identifier, priority and join key.
pub type RuleId = i32;

/// Default ceiling for free-text input (1 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

/// Default ceiling for map/JSON entries after flattening.
pub const DEFAULT_MAX_MAP_ENTRIES: usize = 4096;

/// Context window radius (bytes) for verify dictionaries, each side of a match.
pub const CONTEXT_WINDOW_BYTES: usize = 32;

// --------------------------
// Rule document
// --------------------------

/// Global engine options from the rule document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GlobalCfg {
    /// API version prefix, opaque to the engine.
    pub api_version: String,
    /// `debug` or `release`; opaque to the engine.
    pub mode: String,
    /// Rule ids to compile. Empty means all.
    pub enable_rules: Vec<RuleId>,
    /// Rule ids to skip. Wins over `enable_rules`.
    pub disable_rules: Vec<RuleId>,
    /// Free-text input ceiling in bytes. Zero selects the default.
    pub max_input_bytes: usize,
    /// Map/JSON entry ceiling after flattening. Zero selects the default.
    pub max_map_entries: usize,
    /// Highest rule id still considered cheap enough for the log-safe view.
    /// Regex-driven detectors above this id are excluded from `detect_log`.
    /// Zero disables the cut.
    pub max_regex_rule_id: RuleId,
}

impl GlobalCfg {
    pub(crate) fn max_input_bytes_or_default(&self) -> usize {
        if self.max_input_bytes == 0 {
            DEFAULT_MAX_INPUT_BYTES
        } else {
            self.max_input_bytes
        }
    }

    pub(crate) fn max_map_entries_or_default(&self) -> usize {
        if self.max_map_entries == 0 {
            DEFAULT_MAX_MAP_ENTRIES
        } else {
            self.max_map_entries
        }
    }
}

/// Detect clause: what a rule matches on.
///
/// A rule with no key clauses is VALUE-typed (raw text); otherwise it is
/// KV-typed and only inspects extracted key/value pairs whose key matches.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DetectClause {
    /// Regexes matched against the terminal key segment.
    pub key_regexs: Vec<String>,
    /// Key literals, compared case-folded.
    pub key_dict: Vec<String>,
    /// Regexes matched against the value (or raw text for VALUE rules).
    pub value_regexs: Vec<String>,
    /// Value literals found by forward substring search.
    pub value_dict: Vec<String>,
}

impl DetectClause {
    /// True when any key clause exists, making the rule KV-typed.
    pub fn is_kv(&self) -> bool {
        !self.key_regexs.is_empty() || !self.key_dict.is_empty()
    }

    /// True when no clause at all is populated (a config error).
    pub fn is_empty(&self) -> bool {
        self.key_regexs.is_empty()
            && self.key_dict.is_empty()
            && self.value_regexs.is_empty()
            && self.value_dict.is_empty()
    }
}

/// Blacklist applied to matched text before verification.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FilterClause {
    /// Exact-match blacklist literals.
    pub value_dict: Vec<String>,
    /// Blacklist regexes.
    pub value_regexs: Vec<String>,
    /// Blacklist algorithms. Supported: `MASKED` (drop text that already
    /// contains mask characters).
    pub algos: Vec<String>,
}

/// Verification applied to matches that survive the filter.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyClause {
    /// Context literals that must appear near the match (whole-word).
    pub key_dict: Vec<String>,
    /// Context regexes that must hit near the match.
    pub key_regexs: Vec<String>,
    /// Checksum algorithms; all configured ones must pass. Supported:
    /// IDCARD, ABAROUTING, CREDITCARD, BITCOIN, DOMAIN.
    pub algos: Vec<String>,
}

/// One detection rule from the document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RuleCfg {
    /// Globally unique id; larger wins merge ties.
    pub id: RuleId,
    /// Classification metadata, opaque to the engine.
    pub info_type: String,
    pub en_name: String,
    pub cn_name: String,
    pub level: String,
    /// What to match.
    pub detect: DetectClause,
    /// Optional blacklist.
    pub filter: Option<FilterClause>,
    /// Optional verification.
    pub verify: Option<VerifyClause>,
    /// Name of the mask rule applied to results.
    pub mask: String,
}

/// One masking rule from the document.
///
/// `mask_type` selects the strategy: `CHAR` (character substitution),
/// `TAG` (`<InfoType>` replacement), `REPLACE` (fixed literal), or `ALGO`
/// (`value` names the algorithm).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MaskRuleCfg {
    /// Unique lookup key referenced by `RuleCfg::mask`.
    pub name: String,
    pub mask_type: String,
    /// CHAR: replacement character (first char, default `*`).
    /// REPLACE: the literal. ALGO: the algorithm name.
    pub value: String,
    /// CHAR: characters preserved at the scan start.
    pub offset: i64,
    /// CHAR: characters preserved at the far end.
    pub padding: i64,
    /// CHAR: cap on replaced characters; zero means no cap.
    pub length: i64,
    /// CHAR: scan backward from the end.
    pub reverse: bool,
    /// Named classes joined into the ignored-character set:
    /// NUMERIC, UPPERCASE, LOWERCASE, WHITESPACE, PUNCTUATION.
    pub ignore_charsets: Vec<String>,
    /// Extra characters added to the ignored set.
    pub ignore_chars: String,
}

/// The whole parsed rule document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DlpCfg {
    pub global: GlobalCfg,
    pub mask_rules: Vec<MaskRuleCfg>,
    pub rules: Vec<RuleCfg>,
}

// --------------------------
// Results
// --------------------------

/// Whether a result came from raw-text matching or key/value matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultType {
    Value,
    Kv,
}

/// One detected (and optionally masked) sensitive span.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectResult {
    /// Id of the rule that produced this result.
    pub rule_id: RuleId,
    /// Matched substring of the original input.
    pub text: String,
    /// Masked form; equals `text` when masking degraded to pass-through.
    pub mask_text: String,
    pub result_type: ResultType,
    /// Matched key or JSON path for KV results; empty for VALUE results.
    pub key: String,
    /// Half-open byte range into the original input.
    pub byte_start: usize,
    pub byte_end: usize,
    /// Copied rule metadata.
    pub info_type: String,
    pub en_name: String,
    pub cn_name: String,
    pub level: String,
}

impl DetectResult {
    /// Byte length of the matched span.
    pub fn len(&self) -> usize {
        self.byte_end - self.byte_start
    }

    pub fn is_empty(&self) -> bool {
        self.byte_end == self.byte_start
    }
}
