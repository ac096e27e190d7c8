//! In-place struct redaction.
//!
//! There is no runtime reflection to walk arbitrary structs, so types opt
//! in through [`Redactable`]: the implementation names its string fields
//! and nested children, and the walker runs each field through the KV
//! detection pipeline, splicing mask text into the field in place.
//!
//! The walker carries a depth budget and an identity set of visited
//! children, so shared or self-referential object graphs terminate instead
//! of looping.

use ahash::{AHashMap, AHashSet};
use tracing::warn;

use crate::api::DetectResult;
use crate::engine::{CustomMasker, Engine, Snapshot};
use crate::errors::Result;

/// Nesting budget for [`RedactWalker::nested`].
const MAX_STRUCT_DEPTH: usize = 8;

/// A type whose string fields can be detected and masked in place.
///
/// Implementations call [`RedactWalker::field`] for each owned string and
/// [`RedactWalker::nested`] for each child that is itself `Redactable`.
/// Field names participate in key matching exactly like map keys.
///
/// ```ignore
/// impl Redactable for Profile {
///     fn redact_fields(&mut self, w: &mut RedactWalker<'_>) {
///         w.field("phone", &mut self.phone);
///         w.field("address", &mut self.address);
///         w.nested("owner", &mut self.owner);
///     }
/// }
/// ```
pub trait Redactable {
    fn redact_fields(&mut self, walker: &mut RedactWalker<'_>);
}

/// Visitor handed to [`Redactable::redact_fields`].
pub struct RedactWalker<'a> {
    snap: &'a Snapshot,
    custom: &'a AHashMap<String, CustomMasker>,
    results: Vec<DetectResult>,
    /// Slash-delimited path of the current nesting position.
    path: String,
    depth: usize,
    /// Data-pointer identities of children already visited.
    visited: AHashSet<usize>,
}

impl RedactWalker<'_> {
    /// Scan one string field and splice mask text into it in place.
    ///
    /// Result offsets are relative to the field's (pre-mask) value; the
    /// result key is the field's slash-delimited path.
    pub fn field(&mut self, name: &str, value: &mut String) {
        let key = format!("{}/{}", self.path, name);
        let found = self.snap.scan_entry(&key, value, self.custom);
        if found.is_empty() {
            return;
        }
        *value = Snapshot::splice(value, &found);
        self.results.extend(found);
    }

    /// Mask a field with a named mask rule (configured or custom),
    /// bypassing detection: the value is rewritten unconditionally.
    ///
    /// An unknown rule name leaves the field untouched and logs a warning,
    /// matching the pass-through behavior of result masking. No detection
    /// result is recorded.
    pub fn mask_field(&mut self, name: &str, value: &mut String, mask_rule: &str) {
        match self.snap.apply_named_mask(value, mask_rule, self.custom) {
            Ok(masked) => *value = masked,
            Err(e) => {
                warn!(field = %name, mask = %mask_rule, error = %e, "field mask missing, passing through");
            }
        }
    }

    /// Scan an optional string field; `None` is skipped.
    pub fn optional_field(&mut self, name: &str, value: &mut Option<String>) {
        if let Some(v) = value {
            self.field(name, v);
        }
    }

    /// Scan every element of a string collection, keyed `name[index]`.
    pub fn field_slice(&mut self, name: &str, values: &mut [String]) {
        for (i, v) in values.iter_mut().enumerate() {
            self.field(&format!("{name}[{i}]"), v);
        }
    }

    /// Descend into a nested child. Stops silently at the depth budget or
    /// when the child has already been visited.
    pub fn nested(&mut self, name: &str, child: &mut dyn Redactable) {
        if self.depth == 0 {
            return;
        }
        let identity = child as *mut dyn Redactable as *mut () as usize;
        if !self.visited.insert(identity) {
            return;
        }

        let saved_len = self.path.len();
        self.path.push('/');
        self.path.push_str(name);
        self.depth -= 1;

        child.redact_fields(self);

        self.depth += 1;
        self.path.truncate(saved_len);
    }
}

impl Engine {
    /// Detect and mask the string fields of a [`Redactable`] value in
    /// place, returning the detection results.
    pub fn mask_struct(&self, target: &mut dyn Redactable) -> Result<Vec<DetectResult>> {
        let snap = self.snapshot()?;
        let custom = self.custom_snapshot();
        let mut walker = RedactWalker {
            snap: &snap,
            custom: &custom,
            results: Vec::new(),
            path: String::new(),
            depth: MAX_STRUCT_DEPTH,
            visited: AHashSet::new(),
        };
        target.redact_fields(&mut walker);
        Ok(walker.results)
    }
}
