//! Engine lifecycle, limits and concurrent reload.

use std::sync::Arc;
use std::thread;

use dlp_rs::{demo_config, Engine};

#[test]
fn unconfigured_engine_rejects_detection() {
    let e = Engine::new();
    let err = e.detect("18612341234").unwrap_err();
    assert!(err.is_state());
}

#[test]
fn closed_engine_rejects_everything() {
    let e = Engine::with_config(demo_config()).unwrap();
    e.close();
    assert!(e.detect("x").unwrap_err().is_state());
    assert!(e.apply_config(demo_config()).unwrap_err().is_state());
    assert!(e
        .register_custom_masker("m", Arc::new(|t: &str| t.to_string()))
        .unwrap_err()
        .is_state());
}

#[test]
fn failed_reload_keeps_previous_rules() {
    let e = Engine::with_config(demo_config()).unwrap();

    let mut broken = demo_config();
    broken.rules[0].mask = "NO_SUCH_MASK".into();
    assert!(e.apply_config(broken).is_err());

    // The original table still serves.
    assert_eq!(e.detect("18612341234").unwrap().len(), 1);
}

#[test]
fn input_ceiling_is_enforced() {
    let mut cfg = demo_config();
    cfg.global.max_input_bytes = 16;
    let e = Engine::with_config(cfg).unwrap();
    let err = e.detect("a very long line of text over the limit").unwrap_err();
    assert!(err.is_limit());
}

#[test]
fn duplicate_rule_ids_are_rejected() {
    let mut cfg = demo_config();
    let dup = cfg.rules[0].clone();
    cfg.rules.push(dup);
    assert!(Engine::with_config(cfg).is_err());
}

#[test]
fn custom_masker_satisfies_rule_references() {
    let e = Engine::new();
    e.register_custom_masker("bracket", Arc::new(|t: &str| format!("[{t}]")))
        .unwrap();

    let mut cfg = demo_config();
    cfg.rules[0].mask = "bracket".into();
    e.apply_config(cfg).unwrap();

    let results = e.detect("18612341234").unwrap();
    assert_eq!(results[0].mask_text, "[18612341234]");
}

#[test]
fn detection_races_cleanly_with_reload() {
    let e = Arc::new(Engine::with_config(demo_config()).unwrap());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let e = Arc::clone(&e);
            thread::spawn(move || {
                for _ in 0..200 {
                    let results = e.detect("phone 18612341234 here").unwrap();
                    assert_eq!(results.len(), 1);
                    assert_eq!(results[0].mask_text, "186****1234");
                }
            })
        })
        .collect();

    let writer = {
        let e = Arc::clone(&e);
        thread::spawn(move || {
            for _ in 0..50 {
                e.apply_config(demo_config()).unwrap();
            }
        })
    };

    for h in readers {
        h.join().unwrap();
    }
    writer.join().unwrap();
}
