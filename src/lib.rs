//! Rule-driven sensitive-data detection and masking.
//!
//! `dlp_rs` scans free text, key/value maps and JSON documents for
//! sensitive information (phone numbers, id cards, payment cards, and
//! whatever else the rule document describes) and redacts what it finds.
//!
//! # Pipeline
//! Input is split into lines and preprocessed (escape unquoting and
//! full-width punctuation folding, byte-length-preserving so offsets stay
//! valid against the original). VALUE rules match the raw line; KV rules
//! match extracted `key:value` / `key=value` candidates, map entries and
//! flattened JSON leaves. Matches pass a blacklist filter, then
//! verification (context words near the match, checksum algorithms), then
//! overlap merge, then masking.
//!
//! # Lifecycle
//! An [`Engine`] starts unconfigured; [`Engine::apply_config`] compiles a
//! rule document into an immutable snapshot and swaps it in atomically, so
//! reloads never race in-flight detection. [`Engine::close`] retires the
//! engine permanently.
//!
//! ```no_run
//! use dlp_rs::{demo_config, Engine};
//!
//! # fn main() -> dlp_rs::Result<()> {
//! let engine = Engine::with_config(demo_config())?;
//! let (masked, results) = engine.deidentify("my phone is 18612341234")?;
//! assert_eq!(masked, "my phone is 186****1234");
//! assert_eq!(results.len(), 1);
//! # Ok(())
//! # }
//! ```

mod api;
mod demo;
mod engine;
mod errors;
mod redact;

pub use api::{
    DetectClause, DetectResult, DlpCfg, FilterClause, GlobalCfg, MaskRuleCfg, ResultType, RuleCfg,
    RuleId, VerifyClause, CONTEXT_WINDOW_BYTES, DEFAULT_MAX_INPUT_BYTES, DEFAULT_MAX_MAP_ENTRIES,
};
pub use demo::demo_config;
pub use engine::{CustomMasker, Engine};
pub use errors::{
    ConfigError, DecodeError, DlpError, LimitError, MaskError, Result, StateError,
};
pub use redact::{RedactWalker, Redactable};
