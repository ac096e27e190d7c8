//! Free-text detection and masking.

use dlp_rs::{demo_config, Engine, ResultType};

fn engine() -> Engine {
    Engine::with_config(demo_config()).expect("demo config compiles")
}

#[test]
fn phone_in_cjk_sentence() {
    let e = engine();
    let results = e.detect("18612341234是我的电话").unwrap();
    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.info_type, "CHINAPHONE");
    assert_eq!(r.text, "18612341234");
    assert_eq!(r.mask_text, "186****1234");
    assert_eq!((r.byte_start, r.byte_end), (0, 11));
    assert_eq!(r.result_type, ResultType::Value);
}

#[test]
fn deidentify_splices_mask_text() {
    let e = engine();
    let (masked, results) = e.deidentify("my phone is 18612341234, call me").unwrap();
    assert_eq!(masked, "my phone is 186****1234, call me");
    assert_eq!(results.len(), 1);
}

#[test]
fn clean_text_passes_through_unchanged() {
    let e = engine();
    let input = "nothing sensitive here, just words";
    let (masked, results) = e.deidentify(input).unwrap();
    assert_eq!(masked, input);
    assert!(results.is_empty());
}

#[test]
fn blacklisted_phone_is_dropped() {
    let e = engine();
    assert!(e.detect("13800138000").unwrap().is_empty());
}

#[test]
fn already_masked_text_is_dropped() {
    let e = engine();
    // MASKED filter: a span holding mask characters is not re-reported.
    assert!(e.detect("186****1234").unwrap().is_empty());
}

#[test]
fn idcard_checksum_gates_the_match() {
    let e = engine();
    // Fixture chosen so no digit run inside it also shapes like a mobile
    // number; only the id-card rule can claim it.
    let good = e.detect("身份证110105200102030040号").unwrap();
    assert_eq!(good.len(), 1);
    assert_eq!(good[0].info_type, "IDCARD");
    assert_eq!(good[0].mask_text, "1101**********0040");

    // Same shape, broken check digit: nothing fires at all.
    assert!(e.detect("身份证110105200102030041号").unwrap().is_empty());
}

#[test]
fn bankcard_needs_context_and_luhn() {
    let e = engine();
    let hit = e.detect("bank card 4111111111111111 on file").unwrap();
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].info_type, "BANKCARD");

    // Luhn failure.
    assert!(e.detect("bank card 4111111111111112 on file").unwrap().is_empty());
    // No context word in the window.
    assert!(e.detect("4111111111111111").unwrap().is_empty());
}

#[test]
fn bitcoin_address_gets_tag_mask() {
    let e = engine();
    let results = e
        .detect("wallet 1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa here")
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].mask_text, "<BITCOIN>");
}

#[test]
fn email_requires_known_tld() {
    let e = engine();
    assert_eq!(e.detect("mail me at bob@example.com").unwrap().len(), 1);
    assert!(e.detect("mail me at bob@example.invalidtld").unwrap().is_empty());
}

#[test]
fn offsets_accumulate_across_lines() {
    let e = engine();
    let input = "first line\nphone 18612341234\n";
    let results = e.detect(input).unwrap();
    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(&input[r.byte_start..r.byte_end], "18612341234");
    assert_eq!(r.byte_start, 17);
}

#[test]
fn full_width_punctuation_is_folded_before_matching() {
    let e = engine();
    // The phone sits right after a full-width colon; folding keeps byte
    // positions aligned with the original text.
    let input = "电话：18612341234";
    let results = e.detect(input).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(&input[results[0].byte_start..results[0].byte_end], "18612341234");
}

#[test]
fn escaped_text_is_unquoted_before_matching() {
    let e = engine();
    let results = e.detect(r#"{\"phone\":\"18612341234\"}"#).unwrap();
    assert!(results.iter().any(|r| r.text == "18612341234"));
}

#[test]
fn explicit_mask_applies_named_rule() {
    let e = engine();
    assert_eq!(e.mask("18612341234", "CHINAPHONE_MASK").unwrap(), "186****1234");
    assert_eq!(e.mask("abcdefg", "NAME_MASK").unwrap(), "abc****");
}

#[test]
fn explicit_mask_unknown_rule_is_an_error() {
    let e = engine();
    let err = e.mask("x", "NO_SUCH_RULE").unwrap_err();
    assert!(err.to_string().contains("NO_SUCH_RULE"));
}

#[test]
fn custom_masker_is_addressable_by_name() {
    let e = engine();
    e.register_custom_masker("upper", std::sync::Arc::new(|t: &str| t.to_uppercase()))
        .unwrap();
    assert_eq!(e.mask("abc", "upper").unwrap(), "ABC");
}

#[test]
fn detect_log_skips_expensive_regex_rules() {
    let mut cfg = demo_config();
    // Everything above 101 is excluded from the log-safe view when it
    // relies on value regexes.
    cfg.global.max_regex_rule_id = 101;
    let e = Engine::with_config(cfg).unwrap();

    let text = "phone 18612341234 id 110105200102030040";
    let full = e.detect(text).unwrap();
    assert_eq!(full.len(), 2);

    let log = e.detect_log(text).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].info_type, "CHINAPHONE");
}

#[test]
fn disabled_rules_are_not_compiled() {
    let mut cfg = demo_config();
    cfg.global.disable_rules = vec![101];
    let e = Engine::with_config(cfg).unwrap();
    assert!(e.detect("18612341234").unwrap().is_empty());
}

#[test]
fn enable_list_narrows_the_rule_set() {
    let mut cfg = demo_config();
    cfg.global.enable_rules = vec![102];
    let e = Engine::with_config(cfg).unwrap();
    assert!(e.detect("18612341234").unwrap().is_empty());
    assert_eq!(e.detect("110225196403026127").unwrap().len(), 1);
}

#[test]
fn results_survive_serialization() {
    let e = engine();
    let results = e.detect("18612341234").unwrap();
    let json = serde_json::to_string(&results).unwrap();
    let back: Vec<dlp_rs::DetectResult> = serde_json::from_str(&json).unwrap();
    assert_eq!(results, back);
}
