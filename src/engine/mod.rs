//! Engine orchestration: rule-table snapshots, line-chunked scanning,
//! merge/mask, and the public detect/deidentify API surface.
//!
//! ## Engine flow (free text)
//! 1) Split input into lines (trailing delimiter kept).
//! 2) Preprocess each line byte-length-preserving (escapes, width folding).
//! 3) Run VALUE detectors on the line; extract key/value candidates and
//!    run KV detectors on those.
//! 4) Merge/dedup per line, shift offsets by the cumulative prior-line
//!    length, mask surviving results.
//! 5) For deidentify, splice mask text into a copy of the *original* input.
//!
//! ## Concurrency
//! The compiled rule table is an immutable [`Snapshot`] behind a
//! read/write lock: detection calls clone an `Arc` under the read lock and
//! run lock-free; `apply_config` swaps the whole table under the write
//! lock, so a reload never races in-flight calls.
//!
//! ## Failure semantics
//! Lifecycle misuse returns [`StateError`]; oversized input returns
//! [`LimitError`]; panics inside the scanning internals are caught at the
//! API boundary, logged, and converted into empty results / pass-through
//! output.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use ahash::AHashMap;
use serde_json::Value;
use tracing::warn;

use crate::api::{DetectResult, DlpCfg, RuleId};
use crate::errors::{ConfigError, DlpError, LimitError, MaskError, Result, StateError};

mod detector;
mod json;
mod kv;
mod mask;
mod merge;
mod preprocess;
mod verify;

pub(crate) use mask::MaskContext;

use detector::Detector;
use kv::extract_kv;
use mask::{Masker, NoRecurse};
use merge::merge_results;
use preprocess::preprocess_line;

/// Caller-supplied masking function registered under a name.
pub type CustomMasker = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Nesting bound for JSON-in-string recursion.
const MAX_NESTED_JSON_DEPTH: usize = 4;

// --------------------------
// Snapshot
// --------------------------

/// Immutable compiled rule table. Built once per `apply_config` and shared
/// read-only by all detection calls.
pub(crate) struct Snapshot {
    detectors: Vec<Detector>,
    maskers: AHashMap<String, Masker>,
    /// Rule id -> mask rule name, for result masking.
    mask_by_rule: AHashMap<RuleId, String>,
    max_input_bytes: usize,
    max_map_entries: usize,
    max_regex_rule_id: RuleId,
}

impl Snapshot {
    fn compile(cfg: &DlpCfg, custom_names: &[String]) -> std::result::Result<Self, ConfigError> {
        let mut maskers = AHashMap::with_capacity(cfg.mask_rules.len());
        for mr in &cfg.mask_rules {
            let compiled = Masker::compile(mr)?;
            if maskers.insert(compiled.name.clone(), compiled).is_some() {
                return Err(ConfigError::DuplicateMaskRule {
                    name: mr.name.clone(),
                });
            }
        }

        let enabled = |id: RuleId| {
            if cfg.global.disable_rules.contains(&id) {
                return false;
            }
            cfg.global.enable_rules.is_empty() || cfg.global.enable_rules.contains(&id)
        };

        let mut detectors = Vec::new();
        let mut mask_by_rule = AHashMap::new();
        for rule in &cfg.rules {
            if mask_by_rule.contains_key(&rule.id) {
                return Err(ConfigError::DuplicateRuleId { rule_id: rule.id });
            }
            // Dangling mask references are rejected at load time; an empty
            // reference means "no masking" and degrades to pass-through.
            if !rule.mask.is_empty()
                && !maskers.contains_key(&rule.mask)
                && !custom_names.contains(&rule.mask)
            {
                return Err(ConfigError::DanglingMaskRef {
                    rule_id: rule.id,
                    mask: rule.mask.clone(),
                });
            }
            mask_by_rule.insert(rule.id, rule.mask.clone());
            if enabled(rule.id) {
                detectors.push(Detector::compile(rule)?);
            }
        }

        Ok(Snapshot {
            detectors,
            maskers,
            mask_by_rule,
            max_input_bytes: cfg.global.max_input_bytes_or_default(),
            max_map_entries: cfg.global.max_map_entries_or_default(),
            max_regex_rule_id: cfg.global.max_regex_rule_id,
        })
    }

    /// Log-safe exclusion: regex-driven detectors above the configured id
    /// threshold are skipped for high-rate callers.
    fn excluded_from_log(&self, d: &Detector) -> bool {
        self.max_regex_rule_id > 0
            && d.uses_value_regex
            && d.meta.rule_id > self.max_regex_rule_id
    }

    // --------------------------
    // Text pipeline
    // --------------------------

    fn detect_text_inner(
        &self,
        text: &str,
        log_safe: bool,
        custom: &AHashMap<String, CustomMasker>,
        ctx: &dyn MaskContext,
    ) -> Vec<DetectResult> {
        let mut all = Vec::new();
        let mut offset = 0usize;

        for line in text.split_inclusive('\n') {
            let pre = preprocess_line(line);
            let buf = pre.as_ref();

            let mut line_results = Vec::new();
            for d in self.detectors.iter().filter(|d| {
                matches!(d.rule_type, crate::api::ResultType::Value)
                    && !(log_safe && self.excluded_from_log(d))
            }) {
                line_results.extend(d.detect_text(buf));
            }

            let candidates = extract_kv(buf);
            for cand in &candidates {
                for d in self.detectors.iter().filter(|d| {
                    matches!(d.rule_type, crate::api::ResultType::Kv)
                        && !(log_safe && self.excluded_from_log(d))
                }) {
                    line_results.extend(d.detect_kv(&cand.key, &cand.value, cand.value_start));
                }
            }

            for mut r in merge_results(line_results) {
                r.byte_start += offset;
                r.byte_end += offset;
                // Surface the matched span from the original input; the
                // preprocess stage guarantees identical byte positions.
                r.text = text[r.byte_start..r.byte_end].to_string();
                self.mask_result(&mut r, custom, ctx);
                all.push(r);
            }

            offset += line.len();
        }
        all
    }

    /// Splice mask text into `original` between match offsets. Overlapping
    /// survivors (partial overlap is legal after merge) are skipped rather
    /// than spliced twice.
    pub(crate) fn splice(original: &str, results: &[DetectResult]) -> String {
        let mut out = String::with_capacity(original.len());
        let mut last = 0usize;
        for r in results {
            if r.byte_start < last || r.byte_end > original.len() {
                continue;
            }
            out.push_str(&original[last..r.byte_start]);
            out.push_str(&r.mask_text);
            last = r.byte_end;
        }
        out.push_str(&original[last..]);
        out
    }

    /// DEIDENTIFY fragments re-run the pipeline without further recursion.
    fn deidentify_fragment_inner(
        &self,
        text: &str,
        custom: &AHashMap<String, CustomMasker>,
    ) -> String {
        let results = self.detect_text_inner(text, false, custom, &NoRecurse);
        Self::splice(text, &results)
    }

    // --------------------------
    // Map pipeline
    // --------------------------

    fn detect_pairs_inner<'a>(
        &self,
        pairs: impl Iterator<Item = (&'a str, &'a str)>,
        custom: &AHashMap<String, CustomMasker>,
        ctx: &dyn MaskContext,
    ) -> Vec<DetectResult> {
        let mut all = Vec::new();
        for (key, value) in pairs {
            let lowered_key = key.to_lowercase();

            // Map/JSON values are scanned verbatim: no escape unquoting and
            // no line chunking, unlike the free-text pipeline.
            let mut entry_results = Vec::new();
            for d in &self.detectors {
                match d.rule_type {
                    // KV rules gate on the key path.
                    crate::api::ResultType::Kv => {
                        entry_results.extend(d.detect_kv(key, value, 0));
                    }
                    // VALUE rules match the value regardless of key.
                    crate::api::ResultType::Value => {
                        entry_results.extend(d.detect_text(value).into_iter().map(|mut r| {
                            r.result_type = crate::api::ResultType::Kv;
                            r.key = lowered_key.clone();
                            r
                        }));
                    }
                }
            }
            for mut r in merge_results(entry_results) {
                self.mask_result(&mut r, custom, ctx);
                all.push(r);
            }
        }
        all
    }

    /// Detect over a parsed JSON tree, recursing into string leaves that
    /// are themselves JSON documents. Result keys are leaf paths; byte
    /// offsets are relative to each leaf value.
    fn detect_tree_inner(
        &self,
        tree: &Value,
        depth: usize,
        custom: &AHashMap<String, CustomMasker>,
        ctx: &dyn MaskContext,
    ) -> std::result::Result<Vec<DetectResult>, LimitError> {
        let mut pairs = Vec::new();
        json::flatten(tree, "", &mut pairs);
        if pairs.len() > self.max_map_entries {
            return Err(LimitError::TooManyEntries {
                got: pairs.len(),
                max: self.max_map_entries,
            });
        }

        let mut results =
            self.detect_pairs_inner(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())), custom, ctx);

        if depth > 0 {
            for (_, value) in &pairs {
                if let Some(nested) = json::parse_nested(value) {
                    results.extend(self.detect_tree_inner(&nested, depth - 1, custom, ctx)?);
                }
            }
        }
        Ok(results)
    }

    /// One masked KV scan of a single entry; the struct-redaction walker's
    /// per-field entry point.
    pub(crate) fn scan_entry(
        &self,
        key: &str,
        value: &str,
        custom: &AHashMap<String, CustomMasker>,
    ) -> Vec<DetectResult> {
        let ctx = SnapshotCtx { snap: self, custom };
        self.detect_pairs_inner(std::iter::once((key, value)), custom, &ctx)
    }

    // --------------------------
    // Masking
    // --------------------------

    fn lookup_mask<'a>(
        &'a self,
        name: &str,
        custom: &'a AHashMap<String, CustomMasker>,
    ) -> Option<MaskTarget<'a>> {
        if let Some(m) = self.maskers.get(name) {
            return Some(MaskTarget::Rule(m));
        }
        custom.get(name).map(MaskTarget::Custom)
    }

    /// Apply the named mask rule (configured or custom) to `text`. No
    /// originating detection rule exists here, so TAG falls back to the
    /// mask rule's own name.
    pub(crate) fn apply_named_mask(
        &self,
        text: &str,
        name: &str,
        custom: &AHashMap<String, CustomMasker>,
    ) -> std::result::Result<String, MaskError> {
        match self.lookup_mask(name, custom) {
            Some(MaskTarget::Rule(m)) => {
                let ctx = SnapshotCtx { snap: self, custom };
                m.mask(text, name, &ctx)
            }
            Some(MaskTarget::Custom(f)) => Ok(f(text)),
            None => Err(MaskError::UnknownRule(name.to_string())),
        }
    }

    /// Populate `mask_text`, degrading to pass-through on failure. The
    /// pass-through default surfaces matched text unmasked by design; the
    /// load-time dangling-reference check makes it unreachable for static
    /// configs, but custom-masker references can still miss at runtime.
    fn mask_result(
        &self,
        r: &mut DetectResult,
        custom: &AHashMap<String, CustomMasker>,
        ctx: &dyn MaskContext,
    ) {
        let name = match self.mask_by_rule.get(&r.rule_id) {
            Some(name) if !name.is_empty() => name,
            _ => {
                r.mask_text = r.text.clone();
                return;
            }
        };
        match self.lookup_mask(name, custom) {
            Some(MaskTarget::Rule(m)) => match m.mask(&r.text, &r.info_type, ctx) {
                Ok(masked) => r.mask_text = masked,
                Err(e) => {
                    warn!(rule_id = r.rule_id, mask = %name, error = %e, "mask failed, passing through");
                    r.mask_text = r.text.clone();
                }
            },
            Some(MaskTarget::Custom(f)) => r.mask_text = f(&r.text),
            None => {
                warn!(rule_id = r.rule_id, mask = %name, "mask rule missing, passing through");
                r.mask_text = r.text.clone();
            }
        }
    }
}

enum MaskTarget<'a> {
    Rule(&'a Masker),
    Custom(&'a CustomMasker),
}

/// Bridges ALGO/DEIDENTIFY maskers back into the snapshot pipeline.
struct SnapshotCtx<'a> {
    snap: &'a Snapshot,
    custom: &'a AHashMap<String, CustomMasker>,
}

impl MaskContext for SnapshotCtx<'_> {
    fn deidentify_fragment(&self, text: &str) -> Option<String> {
        Some(self.snap.deidentify_fragment_inner(text, self.custom))
    }
}

// --------------------------
// Engine
// --------------------------

enum EngineState {
    Unconfigured,
    Ready(Arc<Snapshot>),
    Closed,
}

/// The detection and masking engine.
///
/// One instance serves any number of threads; see the module docs for the
/// snapshot/reload model.
pub struct Engine {
    state: RwLock<EngineState>,
    custom: RwLock<AHashMap<String, CustomMasker>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an unconfigured engine. Detection calls fail with
    /// [`StateError::NotConfigured`] until [`Engine::apply_config`] runs.
    pub fn new() -> Self {
        Engine {
            state: RwLock::new(EngineState::Unconfigured),
            custom: RwLock::new(AHashMap::new()),
        }
    }

    /// Create and configure in one step.
    pub fn with_config(cfg: DlpCfg) -> Result<Self> {
        let engine = Engine::new();
        engine.apply_config(cfg)?;
        Ok(engine)
    }

    /// Compile `cfg` and atomically swap it in as the active rule table.
    ///
    /// On error the previous table (if any) stays active.
    pub fn apply_config(&self, cfg: DlpCfg) -> Result<()> {
        let custom_names: Vec<String> = self
            .custom
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        let snapshot = Snapshot::compile(&cfg, &custom_names)?;

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if matches!(*state, EngineState::Closed) {
            return Err(StateError::Closed.into());
        }
        *state = EngineState::Ready(Arc::new(snapshot));
        Ok(())
    }

    /// Register a named masking function, addressable from `mask()` and
    /// from rule mask references.
    pub fn register_custom_masker(&self, name: &str, f: CustomMasker) -> Result<()> {
        if matches!(
            *self.state.read().unwrap_or_else(|e| e.into_inner()),
            EngineState::Closed
        ) {
            return Err(StateError::Closed.into());
        }
        self.custom
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), f);
        Ok(())
    }

    /// Shut the engine down. Subsequent calls fail with
    /// [`StateError::Closed`].
    pub fn close(&self) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = EngineState::Closed;
    }

    pub(crate) fn snapshot(&self) -> Result<Arc<Snapshot>> {
        match &*self.state.read().unwrap_or_else(|e| e.into_inner()) {
            EngineState::Unconfigured => Err(StateError::NotConfigured.into()),
            EngineState::Closed => Err(StateError::Closed.into()),
            EngineState::Ready(snap) => Ok(Arc::clone(snap)),
        }
    }

    pub(crate) fn custom_snapshot(&self) -> AHashMap<String, CustomMasker> {
        self.custom
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn check_text_limit(snap: &Snapshot, text: &str) -> Result<()> {
        if text.len() > snap.max_input_bytes {
            return Err(LimitError::InputTooLarge {
                got: text.len(),
                max: snap.max_input_bytes,
            }
            .into());
        }
        Ok(())
    }

    /// Catch panics from the scanning internals at the API boundary.
    fn guarded<T>(fallback: impl FnOnce() -> T, f: impl FnOnce() -> T) -> T {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(v) => v,
            Err(_) => {
                warn!("detection internals panicked; returning fallback output");
                fallback()
            }
        }
    }

    // --------------------------
    // Text API
    // --------------------------

    /// Detect sensitive spans in free text.
    pub fn detect(&self, text: &str) -> Result<Vec<DetectResult>> {
        self.detect_opts(text, false)
    }

    /// Detection variant for high-rate log callers: regex-driven detectors
    /// above the configured rule-id threshold are skipped.
    pub fn detect_log(&self, text: &str) -> Result<Vec<DetectResult>> {
        self.detect_opts(text, true)
    }

    fn detect_opts(&self, text: &str, log_safe: bool) -> Result<Vec<DetectResult>> {
        let snap = self.snapshot()?;
        Self::check_text_limit(&snap, text)?;
        let custom = self.custom_snapshot();
        Ok(Self::guarded(Vec::new, || {
            let ctx = SnapshotCtx {
                snap: &snap,
                custom: &custom,
            };
            snap.detect_text_inner(text, log_safe, &custom, &ctx)
        }))
    }

    /// Detect and redact free text. Returns the masked text and the
    /// results used to produce it.
    pub fn deidentify(&self, text: &str) -> Result<(String, Vec<DetectResult>)> {
        let results = self.detect(text)?;
        let masked = Self::guarded(|| text.to_string(), || Snapshot::splice(text, &results));
        Ok((masked, results))
    }

    /// Mask `text` with a named mask rule (configured or custom).
    ///
    /// Unlike result masking, an unknown name here is an error rather than
    /// pass-through: the caller asked for a specific rule.
    pub fn mask(&self, text: &str, mask_rule: &str) -> Result<String> {
        let snap = self.snapshot()?;
        let custom = self.custom_snapshot();
        Ok(snap.apply_named_mask(text, mask_rule, &custom)?)
    }

    // --------------------------
    // Map API
    // --------------------------

    /// Detect over key/value pairs. Offsets are relative to each value.
    pub fn detect_map(&self, map: &BTreeMap<String, String>) -> Result<Vec<DetectResult>> {
        let snap = self.snapshot()?;
        if map.len() > snap.max_map_entries {
            return Err(LimitError::TooManyEntries {
                got: map.len(),
                max: snap.max_map_entries,
            }
            .into());
        }
        let custom = self.custom_snapshot();
        Ok(Self::guarded(Vec::new, || {
            let ctx = SnapshotCtx {
                snap: &snap,
                custom: &custom,
            };
            snap.detect_pairs_inner(
                map.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                &custom,
                &ctx,
            )
        }))
    }

    /// Detect and redact map values.
    pub fn deidentify_map(
        &self,
        map: &BTreeMap<String, String>,
    ) -> Result<(BTreeMap<String, String>, Vec<DetectResult>)> {
        let results = self.detect_map(map)?;

        let mut grouped: AHashMap<&str, Vec<&DetectResult>> = AHashMap::new();
        for r in &results {
            grouped.entry(r.key.as_str()).or_default().push(r);
        }

        let mut out = map.clone();
        for (key, value) in out.iter_mut() {
            if let Some(group) = grouped.get(key.to_lowercase().as_str()) {
                let owned: Vec<DetectResult> = group.iter().map(|r| (*r).clone()).collect();
                *value = Snapshot::splice(value, &owned);
            }
        }
        Ok((out, results))
    }

    // --------------------------
    // JSON API
    // --------------------------

    /// Detect over a JSON document. Result keys are lower-cased leaf paths
    /// (`/key`, `key[index]`); offsets are relative to each leaf value.
    pub fn detect_json(&self, json: &str) -> Result<Vec<DetectResult>> {
        let snap = self.snapshot()?;
        Self::check_text_limit(&snap, json)?;
        let tree = json::parse_json(json).map_err(DlpError::Decode)?;
        let custom = self.custom_snapshot();

        Self::guarded(
            || Ok(Vec::new()),
            || {
                let ctx = SnapshotCtx {
                    snap: &snap,
                    custom: &custom,
                };
                snap.detect_tree_inner(&tree, MAX_NESTED_JSON_DEPTH, &custom, &ctx)
                    .map_err(DlpError::Limit)
            },
        )
    }

    /// Detect and redact a JSON document, preserving its structure.
    pub fn deidentify_json(&self, json: &str) -> Result<(String, Vec<DetectResult>)> {
        let snap = self.snapshot()?;
        Self::check_text_limit(&snap, json)?;
        let mut tree = json::parse_json(json).map_err(DlpError::Decode)?;
        let custom = self.custom_snapshot();

        let results = Self::guarded(
            || Ok(Vec::new()),
            || {
                let ctx = SnapshotCtx {
                    snap: &snap,
                    custom: &custom,
                };
                snap.detect_tree_inner(&tree, MAX_NESTED_JSON_DEPTH, &custom, &ctx)
                    .map_err(DlpError::Limit)
            },
        )?;

        let grouped = group_by_key(&results);
        rewrite_tree(&snap, &custom, &mut tree, &grouped, MAX_NESTED_JSON_DEPTH);

        let masked = serde_json::to_string(&tree).unwrap_or_else(|_| json.to_string());
        Ok((masked, results))
    }

    /// Reapply a previously computed result set to (possibly different)
    /// JSON text. Keys missing from the new document are ignored; no
    /// re-detection happens.
    pub fn deidentify_json_by_result(
        &self,
        json: &str,
        results: &[DetectResult],
    ) -> Result<String> {
        let snap = self.snapshot()?;
        Self::check_text_limit(&snap, json)?;
        let mut tree = json::parse_json(json).map_err(DlpError::Decode)?;

        let grouped = group_by_key(results);
        json::rewrite_leaves(
            &mut tree,
            "",
            &|path, leaf| {
                grouped
                    .get(path)
                    .map(|group| splice_group(leaf, group))
            },
            &mut |_| None,
        );
        Ok(serde_json::to_string(&tree).unwrap_or_else(|_| json.to_string()))
    }
}

/// Group results by key path for leaf rewriting.
fn group_by_key<'a>(results: &'a [DetectResult]) -> AHashMap<&'a str, Vec<&'a DetectResult>> {
    let mut grouped: AHashMap<&str, Vec<&DetectResult>> = AHashMap::new();
    for r in results {
        grouped.entry(r.key.as_str()).or_default().push(r);
    }
    grouped
}

/// Splice a group of results (offsets relative to the leaf) into the leaf.
fn splice_group(leaf: &str, group: &[&DetectResult]) -> String {
    let mut owned: Vec<DetectResult> = group.iter().map(|r| (*r).clone()).collect();
    owned.sort_by_key(|r| (r.byte_start, r.byte_end));
    // Tolerate results computed against an older document shape.
    owned.retain(|r| leaf.get(r.byte_start..r.byte_end) == Some(r.text.as_str()));
    Snapshot::splice(leaf, &owned)
}

/// Rewrite a tree's detected leaves, recursing into nested JSON strings.
fn rewrite_tree(
    snap: &Snapshot,
    custom: &AHashMap<String, CustomMasker>,
    tree: &mut Value,
    grouped: &AHashMap<&str, Vec<&DetectResult>>,
    depth: usize,
) {
    let mut nested = |leaf: &str| -> Option<String> {
        if depth == 0 {
            return None;
        }
        let mut inner = json::parse_nested(leaf)?;
        let ctx = SnapshotCtx { snap, custom };
        let results = snap
            .detect_tree_inner(&inner, depth - 1, custom, &ctx)
            .ok()?;
        if results.is_empty() {
            return None;
        }
        let inner_grouped = group_by_key(&results);
        rewrite_tree(snap, custom, &mut inner, &inner_grouped, depth - 1);
        serde_json::to_string(&inner).ok()
    };

    json::rewrite_leaves(
        tree,
        "",
        &|path, leaf| grouped.get(path).map(|group| splice_group(leaf, group)),
        &mut nested,
    );
}
