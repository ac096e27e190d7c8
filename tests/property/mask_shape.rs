//! Shape invariants of the CHAR masking strategy, via the public `mask`
//! entry point and the demo rule set.

use dlp_rs::{demo_config, Engine};
use proptest::prelude::*;

fn engine() -> Engine {
    Engine::with_config(demo_config()).expect("demo config compiles")
}

proptest! {
    /// CHAR masking never changes the character count.
    #[test]
    fn char_mask_preserves_char_count(text in "[a-z0-9一二三]{0,24}") {
        let e = engine();
        let masked = e.mask(&text, "NAME_MASK").unwrap();
        prop_assert_eq!(masked.chars().count(), text.chars().count());
    }

    /// The offset prefix survives unmasked and everything after it is
    /// replaced (NAME_MASK: offset 3, no padding, no cap).
    #[test]
    fn char_mask_respects_offset(text in "[a-z]{4,24}") {
        let e = engine();
        let masked = e.mask(&text, "NAME_MASK").unwrap();
        let keep: String = text.chars().take(3).collect();
        prop_assert!(masked.starts_with(&keep));
        prop_assert!(masked.chars().skip(3).all(|c| c == '*'));
    }

    /// Too-short input passes through untouched (offset + padding exceed
    /// the length).
    #[test]
    fn char_mask_short_input_is_identity(text in "[0-9]{0,7}") {
        let e = engine();
        // CHINAPHONE_MASK keeps 3 + 4 characters.
        let masked = e.mask(&text, "CHINAPHONE_MASK").unwrap();
        prop_assert_eq!(masked, text);
    }

    /// NUMBER masking touches digits and nothing else.
    #[test]
    fn number_algo_masks_only_digits(text in "[a-z0-9 ]{0,24}") {
        let e = engine();
        let cfg = {
            let mut c = demo_config();
            c.mask_rules.push(dlp_rs::MaskRuleCfg {
                name: "NUM".into(),
                mask_type: "ALGO".into(),
                value: "NUMBER".into(),
                ..dlp_rs::MaskRuleCfg::default()
            });
            c
        };
        e.apply_config(cfg).unwrap();
        let masked = e.mask(&text, "NUM").unwrap();
        for (a, b) in text.chars().zip(masked.chars()) {
            if a.is_ascii_digit() {
                prop_assert_eq!(b, '*');
            } else {
                prop_assert_eq!(a, b);
            }
        }
    }
}
