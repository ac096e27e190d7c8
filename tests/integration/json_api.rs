//! JSON detection and structure-preserving masking.

use dlp_rs::{demo_config, Engine};
use serde_json::Value;

fn engine() -> Engine {
    Engine::with_config(demo_config()).expect("demo config compiles")
}

#[test]
fn leaf_paths_drive_key_matching() {
    let e = engine();
    let results = e
        .detect_json(r#"{"user":{"name":"abcdefg","uid":"1234567890"}}"#)
        .unwrap();
    let mut keys: Vec<&str> = results.iter().map(|r| r.key.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["/user/name", "/user/uid"]);
}

#[test]
fn deidentify_json_masks_leaves() {
    let e = engine();
    let (masked, results) = e
        .deidentify_json(r#"{"name":"abcdefg","uid":"1234567890"}"#)
        .unwrap();
    let v: Value = serde_json::from_str(&masked).unwrap();
    assert_eq!(v["name"], "abc****");
    assert_eq!(v["uid"], "1*********");
    assert_eq!(results.len(), 2);
}

#[test]
fn array_elements_match_through_index_suffix() {
    let e = engine();
    let (masked, results) = e
        .deidentify_json(r#"{"name":["abcdefg","hijklmn"]}"#)
        .unwrap();
    let v: Value = serde_json::from_str(&masked).unwrap();
    assert_eq!(v["name"][0], "abc****");
    assert_eq!(v["name"][1], "hij****");
    assert_eq!(results.len(), 2);
    assert!(results.iter().any(|r| r.key == "/name[0]"));
}

#[test]
fn value_rules_fire_on_any_leaf() {
    let e = engine();
    let (masked, _) = e
        .deidentify_json(r#"{"note":"call 18612341234"}"#)
        .unwrap();
    let v: Value = serde_json::from_str(&masked).unwrap();
    assert_eq!(v["note"], "call 186****1234");
}

#[test]
fn non_string_leaves_are_ignored() {
    let e = engine();
    let input = r#"{"uid":1234567890,"flag":true,"nothing":null}"#;
    let (masked, results) = e.deidentify_json(input).unwrap();
    assert!(results.is_empty());
    let v: Value = serde_json::from_str(&masked).unwrap();
    assert_eq!(v["uid"], 1234567890);
}

#[test]
fn nested_json_in_string_is_recursed() {
    let e = engine();
    let inner = r#"{"uid":"1234567890"}"#;
    let outer = serde_json::json!({ "blob": inner }).to_string();
    let (masked, results) = e.deidentify_json(&outer).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key, "/uid");

    let v: Value = serde_json::from_str(&masked).unwrap();
    let rewritten: Value = serde_json::from_str(v["blob"].as_str().unwrap()).unwrap();
    assert_eq!(rewritten["uid"], "1*********");
}

#[test]
fn malformed_json_reports_offset_and_snippet() {
    let e = engine();
    let err = e.detect_json(r#"{"a": nope}"#).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("invalid JSON"), "{msg}");
}

#[test]
fn by_result_replays_without_redetection() {
    let e = engine();
    let doc = r#"{"name":"abcdefg","uid":"1234567890"}"#;
    let (_, results) = e.deidentify_json(doc).unwrap();

    let replayed = e.deidentify_json_by_result(doc, &results).unwrap();
    let v: Value = serde_json::from_str(&replayed).unwrap();
    assert_eq!(v["name"], "abc****");
    assert_eq!(v["uid"], "1*********");
}

#[test]
fn by_result_masks_only_the_kept_info_types() {
    let e = engine();
    let doc = r#"{"name":"abcdefg","uid":"1234567890"}"#;
    let (_, results) = e.deidentify_json(doc).unwrap();
    assert_eq!(results.len(), 2);

    // Caller drops one info type before replaying; that field must come
    // back untouched while the rest still mask.
    let kept: Vec<_> = results
        .into_iter()
        .filter(|r| r.info_type != "NAME")
        .collect();
    let replayed = e.deidentify_json_by_result(doc, &kept).unwrap();
    let v: Value = serde_json::from_str(&replayed).unwrap();
    assert_eq!(v["name"], "abcdefg");
    assert_eq!(v["uid"], "1*********");
}

#[test]
fn by_result_tolerates_missing_and_stale_keys() {
    let e = engine();
    let (_, results) = e
        .deidentify_json(r#"{"name":"abcdefg","uid":"1234567890"}"#)
        .unwrap();

    // A different document: one key gone, one value changed shape.
    let other = r#"{"uid":"99","extra":"x"}"#;
    let replayed = e.deidentify_json_by_result(other, &results).unwrap();
    let v: Value = serde_json::from_str(&replayed).unwrap();
    // Stale offsets no longer line up, so the value is left alone.
    assert_eq!(v["uid"], "99");
    assert_eq!(v["extra"], "x");
}

#[test]
fn entry_ceiling_applies_to_flattened_leaves() {
    let mut cfg = demo_config();
    cfg.global.max_map_entries = 2;
    let e = Engine::with_config(cfg).unwrap();
    let err = e
        .detect_json(r#"{"a":"1","b":"2","c":"3"}"#)
        .unwrap_err();
    assert!(err.is_limit());
}
