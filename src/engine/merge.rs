//! Result merge: ordering, duplicate collapse and containment dedup.
//!
//! Results are sorted by `(byte_start, byte_end, rule_id)` ascending, then
//! overlaps are resolved pairwise for results sharing a key:
//! - identical spans collapse to the larger rule id (later in sort order);
//! - a span strictly contained in another is dropped, whichever arrived
//!   first.
//!
//! The surviving set stays order-stable by original position.

use crate::api::DetectResult;

pub(crate) fn merge_results(mut results: Vec<DetectResult>) -> Vec<DetectResult> {
    if results.len() <= 1 {
        return results;
    }
    results.sort_by(|a, b| {
        (a.byte_start, a.byte_end, a.rule_id).cmp(&(b.byte_start, b.byte_end, b.rule_id))
    });

    let mut out: Vec<DetectResult> = Vec::with_capacity(results.len());
    'next: for r in results {
        // Compare against every kept result with the same key. Sorting
        // guarantees kept.byte_start <= r.byte_start, so containment checks
        // reduce to end comparisons. Result counts per line are small.
        let mut i = out.len();
        while i > 0 {
            i -= 1;
            if out[i].key != r.key {
                continue;
            }
            let kept = &out[i];
            if kept.byte_start == r.byte_start && kept.byte_end == r.byte_end {
                // Duplicate span: sort order puts the larger rule id last.
                out[i] = r;
                continue 'next;
            }
            if kept.byte_start <= r.byte_start && r.byte_end <= kept.byte_end {
                // `r` is strictly inside a kept span.
                continue 'next;
            }
            if kept.byte_start == r.byte_start && kept.byte_end < r.byte_end {
                // The kept span is strictly inside `r`.
                out.remove(i);
            }
        }
        out.push(r);
    }
    out
}
