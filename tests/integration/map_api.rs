//! Key/value map detection and masking.

use std::collections::BTreeMap;

use dlp_rs::{demo_config, Engine, ResultType};

fn engine() -> Engine {
    Engine::with_config(demo_config()).expect("demo config compiles")
}

fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn keyed_rules_match_map_entries() {
    let e = engine();
    let results = e
        .detect_map(&map(&[("name", "abcdefg"), ("uid", "1234567890")]))
        .unwrap();
    assert_eq!(results.len(), 2);
    for r in &results {
        assert_eq!(r.result_type, ResultType::Kv);
    }
}

#[test]
fn deidentify_map_masks_values_in_place() {
    let e = engine();
    let (masked, results) = e
        .deidentify_map(&map(&[("name", "abcdefg"), ("uid", "1234567890")]))
        .unwrap();
    assert_eq!(masked["name"], "abc****");
    assert_eq!(masked["uid"], "1*********");
    assert_eq!(results.len(), 2);
}

#[test]
fn key_matching_is_case_insensitive() {
    let e = engine();
    let (masked, results) = e.deidentify_map(&map(&[("NAME", "abcdefg")])).unwrap();
    assert_eq!(masked["NAME"], "abc****");
    assert_eq!(results[0].key, "name");
}

#[test]
fn value_rules_apply_to_unkeyed_entries() {
    let e = engine();
    // "comment" matches no keyed rule; the phone pattern still fires.
    let (masked, results) = e
        .deidentify_map(&map(&[("comment", "call 18612341234 now")]))
        .unwrap();
    assert_eq!(masked["comment"], "call 186****1234 now");
    assert_eq!(results[0].key, "comment");
    assert_eq!(results[0].info_type, "CHINAPHONE");
}

#[test]
fn address_values_keep_landmarks() {
    let e = engine();
    let (masked, _) = e
        .deidentify_map(&map(&[("address", "浙江省杭州市西湖区文一西路969号")]))
        .unwrap();
    let out = &masked["address"];
    assert!(out.starts_with("浙江省杭州市西湖区"));
    assert!(!out.contains("文一西"));
    assert!(!out.contains("969"));
}

#[test]
fn deidentify_algo_recurses_one_level() {
    let e = engine();
    let (masked, _) = e
        .deidentify_map(&map(&[("payload", "my phone is 18612341234")]))
        .unwrap();
    assert_eq!(masked["payload"], "my phone is 186****1234");
}

#[test]
fn untouched_entries_are_preserved() {
    let e = engine();
    let (masked, _) = e
        .deidentify_map(&map(&[("color", "blue"), ("uid", "1234567890")]))
        .unwrap();
    assert_eq!(masked["color"], "blue");
    assert_eq!(masked["uid"], "1*********");
}

#[test]
fn entry_ceiling_is_enforced() {
    let mut cfg = demo_config();
    cfg.global.max_map_entries = 2;
    let e = Engine::with_config(cfg).unwrap();
    let big = map(&[("a", "1"), ("b", "2"), ("c", "3")]);
    let err = e.detect_map(&big).unwrap_err();
    assert!(err.is_limit());
}

#[test]
fn map_values_are_scanned_verbatim() {
    // The free-text path unquotes escapes before matching; the map path
    // must not. A literal backslash-n in a value stays matchable.
    let mut cfg = demo_config();
    cfg.mask_rules.push(dlp_rs::MaskRuleCfg {
        name: "TAG".into(),
        mask_type: "TAG".into(),
        ..dlp_rs::MaskRuleCfg::default()
    });
    cfg.rules.push(dlp_rs::RuleCfg {
        id: 900,
        info_type: "ESCAPE".into(),
        detect: dlp_rs::DetectClause {
            value_dict: vec![r"\n".into()],
            ..dlp_rs::DetectClause::default()
        },
        mask: "TAG".into(),
        ..dlp_rs::RuleCfg::default()
    });
    let e = Engine::with_config(cfg).unwrap();

    let results = e.detect_map(&map(&[("x", r"a\nb")])).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, r"\n");
    assert_eq!((results[0].byte_start, results[0].byte_end), (1, 3));
}

#[test]
fn result_offsets_are_value_relative() {
    let e = engine();
    let results = e
        .detect_map(&map(&[("comment", "tel 18612341234")]))
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!((results[0].byte_start, results[0].byte_end), (4, 15));
}
