use serde_json::{json, Value};
use template_render::pipeline::normalize::{positive_f64, positive_u32, strict_bool};

#[test]
fn positive_f64_accepts_finite_positive_numbers_and_numeric_strings() {
    assert_eq!(positive_f64(Some(&json!(2)), 1.0), 2.0);
    assert_eq!(positive_f64(Some(&json!(1.5)), 1.0), 1.5);
    assert_eq!(positive_f64(Some(&json!(" 2.25 ")), 1.0), 2.25);
}

#[test]
fn positive_f64_falls_back_on_anything_unusable() {
    let fallback = 6.0;
    let cases: Vec<Option<Value>> = vec![
        None,
        Some(Value::Null),
        Some(json!(0)),
        Some(json!(-3.5)),
        Some(json!("abc")),
        Some(json!("NaN")),
        Some(json!("inf")),
        Some(json!("-inf")),
        Some(json!(true)),
        Some(json!([1])),
        Some(json!({"v": 1})),
    ];
    for case in cases {
        let out = positive_f64(case.as_ref(), fallback);
        assert_eq!(out, fallback, "input {:?}", case);
    }
}

#[test]
fn positive_f64_never_returns_non_positive_or_non_finite() {
    let samples = [
        json!(1e308),
        json!("1e400"),
        json!(-0.0),
        json!(f64::MIN_POSITIVE),
        json!("0x10"),
        json!(""),
    ];
    for sample in samples {
        let out = positive_f64(Some(&sample), 1.0);
        assert!(out.is_finite() && out > 0.0, "input {} gave {}", sample, out);
    }
}

#[test]
fn positive_u32_truncates_and_rejects_zero() {
    assert_eq!(positive_u32(Some(&json!(24)), 30), 24);
    assert_eq!(positive_u32(Some(&json!("60")), 30), 60);
    assert_eq!(positive_u32(Some(&json!(29.97)), 30), 29);
    assert_eq!(positive_u32(Some(&json!(0.5)), 30), 30);
    assert_eq!(positive_u32(Some(&json!(0)), 30), 30);
    assert_eq!(positive_u32(Some(&json!(-24)), 30), 30);
    assert_eq!(positive_u32(Some(&json!(1e12)), 30), 30);
    assert_eq!(positive_u32(None, 30), 30);
}

#[test]
fn strict_bool_only_accepts_json_true() {
    assert!(strict_bool(Some(&json!(true))));
    assert!(!strict_bool(Some(&json!("true"))));
    assert!(!strict_bool(Some(&json!(1))));
    assert!(!strict_bool(Some(&json!(false))));
    assert!(!strict_bool(None));
}
