//! Error types for the detection and masking pipeline.
//!
//! Errors are stage-specific to keep diagnostics precise and avoid a single
//! monolithic enum that grows unbounded. All enums are `#[non_exhaustive]`
//! so variants can be added without breaking callers; consumers should keep
//! a fallback match arm.
//!
//! # Design Notes
//! - Configuration errors are fatal to engine (re)configuration; nothing is
//!   swapped in on failure and the previous rule table stays active.
//! - Mask errors on the result-masking path are *not* surfaced through the
//!   API: the engine degrades to pass-through text and logs the failure.
//!   The explicit `mask()` entry point does surface them.
//! - Decode errors carry a bounded snippet around the failing byte offset
//!   and are not stable for machine parsing.

use std::error::Error as StdError;
use std::fmt;

use crate::api::RuleId;

/// Errors from compiling a parsed rule document into a live rule table.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// A mask rule names a mask type outside {CHAR, TAG, REPLACE, ALGO}.
    UnknownMaskType { rule: String, mask_type: String },
    /// An ALGO mask rule names an unsupported algorithm.
    UnknownMaskAlgo { rule: String, algo: String },
    /// A verify clause names an unsupported checksum algorithm.
    UnknownVerifyAlgo { rule_id: RuleId, algo: String },
    /// A filter clause names an unsupported blacklist algorithm.
    UnknownFilterAlgo { rule_id: RuleId, algo: String },
    /// A mask rule names an unsupported ignore character class.
    UnknownCharClass { rule: String, class: String },
    /// A mask rule carries a negative offset/padding/length.
    NegativeParam {
        rule: String,
        field: &'static str,
        value: i64,
    },
    /// A detect clause has none of key/value regex/dict populated.
    EmptyDetect { rule_id: RuleId },
    /// Two rules share the same id.
    DuplicateRuleId { rule_id: RuleId },
    /// Two mask rules share the same name.
    DuplicateMaskRule { name: String },
    /// A rule references a mask rule that is not configured.
    DanglingMaskRef { rule_id: RuleId, mask: String },
    /// A detect/filter/verify regex failed to compile.
    BadRegex {
        rule_id: RuleId,
        pattern: String,
        detail: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownMaskType { rule, mask_type } => {
                write!(f, "mask rule {rule:?}: unknown mask type {mask_type:?}")
            }
            ConfigError::UnknownMaskAlgo { rule, algo } => {
                write!(f, "mask rule {rule:?}: unknown mask algorithm {algo:?}")
            }
            ConfigError::UnknownVerifyAlgo { rule_id, algo } => {
                write!(f, "rule {rule_id}: unknown verify algorithm {algo:?}")
            }
            ConfigError::UnknownFilterAlgo { rule_id, algo } => {
                write!(f, "rule {rule_id}: unknown filter algorithm {algo:?}")
            }
            ConfigError::UnknownCharClass { rule, class } => {
                write!(f, "mask rule {rule:?}: unknown character class {class:?}")
            }
            ConfigError::NegativeParam { rule, field, value } => {
                write!(f, "mask rule {rule:?}: {field} must be >= 0 (got {value})")
            }
            ConfigError::EmptyDetect { rule_id } => {
                write!(f, "rule {rule_id}: detect clause has no key or value patterns")
            }
            ConfigError::DuplicateRuleId { rule_id } => {
                write!(f, "duplicate rule id {rule_id}")
            }
            ConfigError::DuplicateMaskRule { name } => {
                write!(f, "duplicate mask rule name {name:?}")
            }
            ConfigError::DanglingMaskRef { rule_id, mask } => {
                write!(f, "rule {rule_id}: mask rule {mask:?} is not configured")
            }
            ConfigError::BadRegex {
                rule_id,
                pattern,
                detail,
            } => {
                write!(f, "rule {rule_id}: invalid regex {pattern:?}: {detail}")
            }
        }
    }
}

impl StdError for ConfigError {}

/// Engine lifecycle misuse: detection/masking invoked outside the
/// configured window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StateError {
    /// No configuration has been applied yet.
    NotConfigured,
    /// The engine has been closed.
    Closed,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::NotConfigured => write!(f, "engine is not configured"),
            StateError::Closed => write!(f, "engine is closed"),
        }
    }
}

impl StdError for StateError {}

/// Input exceeds a configured size ceiling.
///
/// The engine never truncates silently; callers should chunk upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum LimitError {
    /// Free-text input is larger than `max_input_bytes`.
    InputTooLarge { got: usize, max: usize },
    /// Map/JSON input flattens to more entries than `max_map_entries`.
    TooManyEntries { got: usize, max: usize },
}

impl fmt::Display for LimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitError::InputTooLarge { got, max } => {
                write!(f, "input is {got} bytes, limit is {max}")
            }
            LimitError::TooManyEntries { got, max } => {
                write!(f, "input has {got} entries, limit is {max}")
            }
        }
    }
}

impl StdError for LimitError {}

/// Masking failures from the explicit `mask()` entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum MaskError {
    /// No configured or custom mask rule with this name.
    UnknownRule(String),
}

impl fmt::Display for MaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskError::UnknownRule(name) => write!(f, "unknown mask rule {name:?}"),
        }
    }
}

impl StdError for MaskError {}

/// Malformed JSON handed to the JSON-family APIs.
///
/// `snippet` is a bounded slice of the input around the failing offset,
/// clamped to character boundaries.
#[derive(Clone, Debug)]
pub struct DecodeError {
    pub offset: usize,
    pub snippet: String,
    pub detail: String,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid JSON at byte {}: {} (near {:?})",
            self.offset, self.detail, self.snippet
        )
    }
}

impl StdError for DecodeError {}

/// Top-level error returned by the engine API surface.
#[derive(Debug)]
#[non_exhaustive]
pub enum DlpError {
    Config(ConfigError),
    State(StateError),
    Limit(LimitError),
    Mask(MaskError),
    Decode(DecodeError),
}

impl fmt::Display for DlpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DlpError::Config(e) => write!(f, "config: {e}"),
            DlpError::State(e) => write!(f, "state: {e}"),
            DlpError::Limit(e) => write!(f, "limit: {e}"),
            DlpError::Mask(e) => write!(f, "mask: {e}"),
            DlpError::Decode(e) => write!(f, "decode: {e}"),
        }
    }
}

impl StdError for DlpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DlpError::Config(e) => Some(e),
            DlpError::State(e) => Some(e),
            DlpError::Limit(e) => Some(e),
            DlpError::Mask(e) => Some(e),
            DlpError::Decode(e) => Some(e),
        }
    }
}

impl From<ConfigError> for DlpError {
    fn from(e: ConfigError) -> Self {
        DlpError::Config(e)
    }
}

impl From<StateError> for DlpError {
    fn from(e: StateError) -> Self {
        DlpError::State(e)
    }
}

impl From<LimitError> for DlpError {
    fn from(e: LimitError) -> Self {
        DlpError::Limit(e)
    }
}

impl From<MaskError> for DlpError {
    fn from(e: MaskError) -> Self {
        DlpError::Mask(e)
    }
}

impl From<DecodeError> for DlpError {
    fn from(e: DecodeError) -> Self {
        DlpError::Decode(e)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DlpError>;

impl DlpError {
    /// True for lifecycle-misuse errors (not-configured / closed).
    pub fn is_state(&self) -> bool {
        matches!(self, DlpError::State(_))
    }

    /// True for size-ceiling rejections.
    pub fn is_limit(&self) -> bool {
        matches!(self, DlpError::Limit(_))
    }
}
