//! Pipeline-level invariants that must hold for arbitrary input.

use dlp_rs::{demo_config, Engine};
use proptest::prelude::*;

fn engine() -> Engine {
    Engine::with_config(demo_config()).expect("demo config compiles")
}

/// Text mixing ASCII, escapes, CJK and full-width punctuation.
fn arbitrary_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            "[ -~]{0,8}",
            Just("\\n".to_string()),
            Just("【电话】".to_string()),
            Just("：".to_string()),
            Just("18612341234".to_string()),
            Just("13800138000".to_string()),
            Just("uid=1234567890".to_string()),
            Just("\n".to_string()),
        ],
        0..12,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    /// Every reported span indexes the original input on char boundaries
    /// and reproduces the result's `text` field.
    #[test]
    fn spans_index_the_original_input(input in arbitrary_text()) {
        let e = engine();
        let results = e.detect(&input).unwrap();
        for r in &results {
            prop_assert!(r.byte_end <= input.len());
            prop_assert!(input.is_char_boundary(r.byte_start));
            prop_assert!(input.is_char_boundary(r.byte_end));
            prop_assert_eq!(&input[r.byte_start..r.byte_end], r.text.as_str());
        }
    }

    /// Surviving spans never nest; at most they partially overlap.
    #[test]
    fn merged_spans_never_nest(input in arbitrary_text()) {
        let e = engine();
        let results = e.detect(&input).unwrap();
        for a in &results {
            for b in &results {
                if std::ptr::eq(a, b) || a.key != b.key {
                    continue;
                }
                let same = a.byte_start == b.byte_start && a.byte_end == b.byte_end;
                let nested = a.byte_start <= b.byte_start && b.byte_end <= a.byte_end;
                prop_assert!(!(nested && !same), "nested spans survived merge");
            }
        }
    }

    /// Deidentify is the identity on inputs with no detections, and every
    /// applied mask shows up verbatim in the output.
    #[test]
    fn deidentify_output_reflects_results(input in arbitrary_text()) {
        let e = engine();
        let (masked, results) = e.deidentify(&input).unwrap();
        if results.is_empty() {
            prop_assert_eq!(masked, input);
        } else {
            // Later results can overlap an earlier span and be skipped by
            // the splice, but the first one is always applied.
            let first = &results[0];
            if !first.mask_text.is_empty() {
                prop_assert!(masked.contains(first.mask_text.as_str()));
            }
        }
    }

    /// Detection is a pure function of input and rule table.
    #[test]
    fn detection_is_deterministic(input in arbitrary_text()) {
        let e = engine();
        let a = e.detect(&input).unwrap();
        let b = e.detect(&input).unwrap();
        prop_assert_eq!(a, b);
    }
}
