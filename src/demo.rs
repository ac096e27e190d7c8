//! Built-in demonstration rule document.
//!
//! A small but representative rule set covering every detection mode
//! (VALUE and KV), every verify algorithm and every mask strategy. Used by
//! the integration tests and as a starting point for callers exploring the
//! engine before wiring up their own document.

use crate::api::{
    DetectClause, DlpCfg, FilterClause, GlobalCfg, MaskRuleCfg, RuleCfg, VerifyClause,
};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn char_mask(name: &str, offset: i64, padding: i64, length: i64) -> MaskRuleCfg {
    MaskRuleCfg {
        name: name.into(),
        mask_type: "CHAR".into(),
        value: "*".into(),
        offset,
        padding,
        length,
        ..MaskRuleCfg::default()
    }
}

fn algo_mask(name: &str, algo: &str) -> MaskRuleCfg {
    MaskRuleCfg {
        name: name.into(),
        mask_type: "ALGO".into(),
        value: algo.into(),
        ..MaskRuleCfg::default()
    }
}

/// Build the demonstration rule document.
pub fn demo_config() -> DlpCfg {
    let mask_rules = vec![
        // 186****1234
        char_mask("CHINAPHONE_MASK", 3, 4, 6),
        char_mask("IDCARD_MASK", 4, 4, 0),
        char_mask("BANKCARD_MASK", 6, 4, 0),
        // abc**** / 1*********
        char_mask("NAME_MASK", 3, 0, 0),
        char_mask("UID_MASK", 1, 0, 0),
        MaskRuleCfg {
            name: "EMAIL_MASK".into(),
            mask_type: "CHAR".into(),
            value: "*".into(),
            offset: 2,
            ignore_chars: "@.".into(),
            ..MaskRuleCfg::default()
        },
        MaskRuleCfg {
            name: "TAG_MASK".into(),
            mask_type: "TAG".into(),
            ..MaskRuleCfg::default()
        },
        MaskRuleCfg {
            name: "ERASE".into(),
            mask_type: "REPLACE".into(),
            value: String::new(),
            ..MaskRuleCfg::default()
        },
        algo_mask("ADDRESS_MASK", "ADDRESS"),
        algo_mask("MD5_MASK", "MD5"),
        algo_mask("DEIDENTIFY_MASK", "DEIDENTIFY"),
    ];

    let rules = vec![
        RuleCfg {
            id: 101,
            info_type: "CHINAPHONE".into(),
            en_name: "chinese mobile number".into(),
            cn_name: "手机号".into(),
            level: "L4".into(),
            detect: DetectClause {
                value_regexs: strings(&[r"1[3-9]\d{9}"]),
                ..DetectClause::default()
            },
            filter: Some(FilterClause {
                // Carrier service number, not a subscriber.
                value_dict: strings(&["13800138000"]),
                algos: strings(&["MASKED"]),
                ..FilterClause::default()
            }),
            verify: None,
            mask: "CHINAPHONE_MASK".into(),
        },
        RuleCfg {
            id: 102,
            info_type: "IDCARD".into(),
            en_name: "resident id card".into(),
            cn_name: "身份证号".into(),
            level: "L4".into(),
            detect: DetectClause {
                value_regexs: strings(&[
                    r"[1-9]\d{5}(18|19|20)\d{2}(0[1-9]|1[0-2])(0[1-9]|[12]\d|3[01])\d{3}[\dXx]",
                ]),
                ..DetectClause::default()
            },
            filter: None,
            verify: Some(VerifyClause {
                algos: strings(&["IDCARD"]),
                ..VerifyClause::default()
            }),
            mask: "IDCARD_MASK".into(),
        },
        RuleCfg {
            id: 103,
            info_type: "BANKCARD".into(),
            en_name: "payment card number".into(),
            cn_name: "银行卡号".into(),
            level: "L4".into(),
            detect: DetectClause {
                value_regexs: strings(&[r"\b[3-6]\d{12,18}\b"]),
                ..DetectClause::default()
            },
            filter: None,
            verify: Some(VerifyClause {
                key_dict: strings(&["card", "bank", "账户", "卡号"]),
                algos: strings(&["CREDITCARD"]),
                ..VerifyClause::default()
            }),
            mask: "BANKCARD_MASK".into(),
        },
        RuleCfg {
            id: 104,
            info_type: "ABAROUTING".into(),
            en_name: "aba routing number".into(),
            cn_name: "ABA路由号".into(),
            level: "L3".into(),
            detect: DetectClause {
                key_dict: strings(&["aba", "routing_number"]),
                value_regexs: strings(&[r"\d{4}-?\d{4}-?\d"]),
                ..DetectClause::default()
            },
            filter: None,
            verify: Some(VerifyClause {
                algos: strings(&["ABAROUTING"]),
                ..VerifyClause::default()
            }),
            mask: "TAG_MASK".into(),
        },
        RuleCfg {
            id: 105,
            info_type: "BITCOIN".into(),
            en_name: "bitcoin address".into(),
            cn_name: "比特币地址".into(),
            level: "L3".into(),
            detect: DetectClause {
                value_regexs: strings(&[r"\b1[1-9A-HJ-NP-Za-km-z]{25,34}\b"]),
                ..DetectClause::default()
            },
            filter: None,
            verify: Some(VerifyClause {
                algos: strings(&["BITCOIN"]),
                ..VerifyClause::default()
            }),
            mask: "TAG_MASK".into(),
        },
        RuleCfg {
            id: 106,
            info_type: "EMAIL".into(),
            en_name: "email address".into(),
            cn_name: "电子邮箱".into(),
            level: "L2".into(),
            detect: DetectClause {
                value_regexs: strings(&[r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"]),
                ..DetectClause::default()
            },
            filter: None,
            verify: Some(VerifyClause {
                algos: strings(&["DOMAIN"]),
                ..VerifyClause::default()
            }),
            mask: "EMAIL_MASK".into(),
        },
        RuleCfg {
            id: 107,
            info_type: "ADDRESS".into(),
            en_name: "postal address".into(),
            cn_name: "地址".into(),
            level: "L3".into(),
            detect: DetectClause {
                key_dict: strings(&["address", "addr", "地址"]),
                ..DetectClause::default()
            },
            filter: None,
            verify: None,
            mask: "ADDRESS_MASK".into(),
        },
        RuleCfg {
            id: 108,
            info_type: "NAME".into(),
            en_name: "person name".into(),
            cn_name: "姓名".into(),
            level: "L2".into(),
            detect: DetectClause {
                key_dict: strings(&["name", "username"]),
                ..DetectClause::default()
            },
            filter: None,
            verify: None,
            mask: "NAME_MASK".into(),
        },
        RuleCfg {
            id: 109,
            info_type: "UID".into(),
            en_name: "user id".into(),
            cn_name: "用户ID".into(),
            level: "L2".into(),
            detect: DetectClause {
                key_dict: strings(&["uid", "user_id"]),
                ..DetectClause::default()
            },
            filter: None,
            verify: None,
            mask: "UID_MASK".into(),
        },
        RuleCfg {
            id: 110,
            info_type: "PAYLOAD".into(),
            en_name: "free-text payload".into(),
            cn_name: "透传内容".into(),
            level: "L1".into(),
            detect: DetectClause {
                key_dict: strings(&["payload", "content"]),
                ..DetectClause::default()
            },
            filter: None,
            verify: None,
            mask: "DEIDENTIFY_MASK".into(),
        },
    ];

    DlpCfg {
        global: GlobalCfg {
            api_version: "v1".into(),
            mode: "release".into(),
            ..GlobalCfg::default()
        },
        mask_rules,
        rules,
    }
}
