//! Compiled form of one detection rule.
//!
//! A detector owns its precompiled regexes, case-folded key dictionary and
//! verify/filter state. Construction derives the rule type: rules with no
//! key clauses are VALUE-typed and match raw text; the rest are KV-typed
//! and only inspect extracted key/value pairs whose key matches.
//!
//! Matching semantics:
//! - value regexes run with non-overlapping leftmost-first semantics (the
//!   regex crate default);
//! - value literals run as forward substring searches, advancing past each
//!   hit, so overlapping occurrences of one literal are not both reported;
//! - the blacklist filter runs post-match, verification post-filter.

use aho_corasick::AhoCorasickBuilder;
use ahash::AHashSet;
use memchr::memmem;
use regex::Regex;

use crate::api::{DetectResult, ResultType, RuleCfg, RuleId};
use crate::engine::verify::{ContextClause, VerifyAlgo};
use crate::errors::ConfigError;

/// Rule metadata copied into every result.
#[derive(Clone, Debug)]
pub(crate) struct RuleMeta {
    pub(crate) rule_id: RuleId,
    pub(crate) info_type: String,
    pub(crate) en_name: String,
    pub(crate) cn_name: String,
    pub(crate) level: String,
    pub(crate) mask: String,
}

/// Compiled blacklist.
#[derive(Clone, Debug)]
struct FilterCompiled {
    dict: AHashSet<String>,
    regexs: Vec<Regex>,
    /// Drop text that already contains mask characters (`*` / `#`).
    drop_masked: bool,
}

/// Compiled verification clause.
#[derive(Clone, Debug)]
struct VerifyCompiled {
    context: ContextClause,
    algos: Vec<VerifyAlgo>,
}

/// Compiled detection rule.
#[derive(Clone, Debug)]
pub(crate) struct Detector {
    pub(crate) meta: RuleMeta,
    pub(crate) rule_type: ResultType,
    /// True when byte-mode matching needs a regex pass (log-safe exclusion).
    pub(crate) uses_value_regex: bool,
    key_regexs: Vec<Regex>,
    key_dict: AHashSet<String>,
    value_regexs: Vec<Regex>,
    value_dict: Vec<String>,
    filter: Option<FilterCompiled>,
    verify: Option<VerifyCompiled>,
}

/// A raw span produced by value matching, relative to the scanned buffer.
#[derive(Clone, Copy, Debug)]
struct RawSpan {
    start: usize,
    end: usize,
}

fn compile_regexs(rule_id: RuleId, patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigError::BadRegex {
                rule_id,
                pattern: p.clone(),
                detail: e.to_string(),
            })
        })
        .collect()
}

impl Detector {
    pub(crate) fn compile(cfg: &RuleCfg) -> Result<Self, ConfigError> {
        if cfg.detect.is_empty() {
            return Err(ConfigError::EmptyDetect { rule_id: cfg.id });
        }

        let rule_type = if cfg.detect.is_kv() {
            ResultType::Kv
        } else {
            ResultType::Value
        };

        let filter = match &cfg.filter {
            Some(f) => {
                let mut drop_masked = false;
                for algo in &f.algos {
                    match algo.to_ascii_uppercase().as_str() {
                        "MASKED" => drop_masked = true,
                        _ => {
                            return Err(ConfigError::UnknownFilterAlgo {
                                rule_id: cfg.id,
                                algo: algo.clone(),
                            })
                        }
                    }
                }
                Some(FilterCompiled {
                    dict: f.value_dict.iter().cloned().collect(),
                    regexs: compile_regexs(cfg.id, &f.value_regexs)?,
                    drop_masked,
                })
            }
            None => None,
        };

        let verify = match &cfg.verify {
            Some(v) => {
                let algos = v
                    .algos
                    .iter()
                    .map(|a| {
                        VerifyAlgo::parse(a).ok_or_else(|| ConfigError::UnknownVerifyAlgo {
                            rule_id: cfg.id,
                            algo: a.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let literals = if v.key_dict.is_empty() {
                    None
                } else {
                    let lowered: Vec<String> =
                        v.key_dict.iter().map(|w| w.to_lowercase()).collect();
                    Some(AhoCorasickBuilder::new().build(&lowered).map_err(|e| {
                        ConfigError::BadRegex {
                            rule_id: cfg.id,
                            pattern: lowered.join("|"),
                            detail: e.to_string(),
                        }
                    })?)
                };
                Some(VerifyCompiled {
                    context: ContextClause {
                        literals,
                        regexs: compile_regexs(cfg.id, &v.key_regexs)?,
                    },
                    algos,
                })
            }
            None => None,
        };

        Ok(Detector {
            meta: RuleMeta {
                rule_id: cfg.id,
                info_type: cfg.info_type.clone(),
                en_name: cfg.en_name.clone(),
                cn_name: cfg.cn_name.clone(),
                level: cfg.level.clone(),
                mask: cfg.mask.clone(),
            },
            rule_type,
            uses_value_regex: !cfg.detect.value_regexs.is_empty(),
            key_regexs: compile_regexs(cfg.id, &cfg.detect.key_regexs)?,
            key_dict: cfg.detect.key_dict.iter().map(|k| k.to_lowercase()).collect(),
            value_regexs: compile_regexs(cfg.id, &cfg.detect.value_regexs)?,
            value_dict: cfg.detect.value_dict.clone(),
            filter,
            verify,
        })
    }

    // --------------------------
    // Matching
    // --------------------------

    /// Value-mode spans in `buf`: regex `find_iter` plus forward literal
    /// search.
    fn value_spans(&self, buf: &str) -> Vec<RawSpan> {
        let mut spans = Vec::new();
        for re in &self.value_regexs {
            for m in re.find_iter(buf) {
                spans.push(RawSpan {
                    start: m.start(),
                    end: m.end(),
                });
            }
        }
        for lit in &self.value_dict {
            if lit.is_empty() {
                continue;
            }
            for start in memmem::find_iter(buf.as_bytes(), lit.as_bytes()) {
                spans.push(RawSpan {
                    start,
                    end: start + lit.len(),
                });
            }
        }
        spans
    }

    /// Run filter + verify for a span matched inside `buf`; emit a result
    /// with offsets relative to `buf`.
    fn accept(&self, buf: &str, span: RawSpan) -> Option<DetectResult> {
        let text = &buf[span.start..span.end];
        if !self.filter_ok(text) {
            return None;
        }
        if !self.verify_ok(buf, span, text) {
            return None;
        }
        Some(DetectResult {
            rule_id: self.meta.rule_id,
            text: text.to_string(),
            mask_text: String::new(),
            result_type: self.rule_type,
            key: String::new(),
            byte_start: span.start,
            byte_end: span.end,
            info_type: self.meta.info_type.clone(),
            en_name: self.meta.en_name.clone(),
            cn_name: self.meta.cn_name.clone(),
            level: self.meta.level.clone(),
        })
    }

    fn filter_ok(&self, text: &str) -> bool {
        let Some(f) = &self.filter else {
            return true;
        };
        if f.dict.contains(text) {
            return false;
        }
        if f.regexs.iter().any(|re| re.is_match(text)) {
            return false;
        }
        if f.drop_masked && text.contains(['*', '#']) {
            return false;
        }
        true
    }

    fn verify_ok(&self, buf: &str, span: RawSpan, text: &str) -> bool {
        let Some(v) = &self.verify else {
            return true;
        };
        if !v.context.is_empty() && !v.context.hit(buf, span.start, span.end) {
            return false;
        }
        v.algos.iter().all(|a| a.check(text))
    }

    /// Byte-mode detection over raw (preprocessed) text. VALUE rules only.
    pub(crate) fn detect_text(&self, buf: &str) -> Vec<DetectResult> {
        debug_assert_eq!(self.rule_type, ResultType::Value);
        self.value_spans(buf)
            .into_iter()
            .filter_map(|s| self.accept(buf, s))
            .collect()
    }

    /// True when this rule's key clauses match the key path.
    pub(crate) fn key_matches(&self, key_path: &str) -> bool {
        let terminal = terminal_key(key_path);
        let lowered = terminal.to_lowercase();
        if self.key_dict.contains(&lowered) {
            return true;
        }
        // Unwrap an `name[index]` array-element suffix and retry.
        if let Some(stripped) = strip_array_index(&lowered) {
            if self.key_dict.contains(stripped) {
                return true;
            }
        }
        self.key_regexs.iter().any(|re| re.is_match(terminal))
    }

    /// KV-mode detection for one key/value pair. `base` shifts result
    /// offsets to the value's position in the wider document.
    pub(crate) fn detect_kv(&self, key_path: &str, value: &str, base: usize) -> Vec<DetectResult> {
        debug_assert_eq!(self.rule_type, ResultType::Kv);
        if !self.key_matches(key_path) {
            return Vec::new();
        }

        let key = key_path.to_lowercase();
        let spans: Vec<RawSpan> =
            if self.value_regexs.is_empty() && self.value_dict.is_empty() {
                // No value clause: the whole value is one KV result.
                vec![RawSpan {
                    start: 0,
                    end: value.len(),
                }]
            } else {
                self.value_spans(value)
            };

        spans
            .into_iter()
            .filter_map(|s| self.accept(value, s))
            .map(|mut r| {
                r.result_type = ResultType::Kv;
                r.key = key.clone();
                r.byte_start += base;
                r.byte_end += base;
                r
            })
            .collect()
    }
}

/// Terminal segment of a slash-delimited JSON path.
fn terminal_key(key_path: &str) -> &str {
    match key_path.rsplit('/').next() {
        Some(seg) if !seg.is_empty() => seg,
        _ => key_path,
    }
}

/// Strip a `[index]` suffix, returning the bare key name.
fn strip_array_index(key: &str) -> Option<&str> {
    let open = key.rfind('[')?;
    if !key.ends_with(']') {
        return None;
    }
    let inner = &key[open + 1..key.len() - 1];
    if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(&key[..open])
}
