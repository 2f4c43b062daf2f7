//! Coercion of untrusted request fields into safe positive numbers.
//!
//! Every helper here is total: malformed, non-finite or non-positive input
//! yields the caller's fallback instead of an error.

use serde_json::Value;

/// Parses a JSON number or numeric string into a finite `f64`.
fn parse_number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Positive float (device scale factor, durations).
pub fn positive_f64(value: Option<&Value>, fallback: f64) -> f64 {
    match parse_number(value) {
        Some(v) if v > 0.0 => v,
        _ => fallback,
    }
}

/// Positive integer (dimensions, frame rates). Fractions are truncated, so
/// `0.5` truncates to zero and falls back.
pub fn positive_u32(value: Option<&Value>, fallback: u32) -> u32 {
    match parse_number(value).map(f64::trunc) {
        Some(v) if v >= 1.0 && v <= u32::MAX as f64 => v as u32,
        _ => fallback,
    }
}

/// Strict boolean: only a JSON `true` counts.
pub fn strict_bool(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}
