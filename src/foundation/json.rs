//! Lenient accessors over `serde_json::Value` for descriptor parsing.
//!
//! Descriptor producers disagree on key spelling and on whether numbers are encoded as JSON
//! numbers or strings, so every accessor takes a list of accepted keys and coerces loosely.

use serde_json::Value;

/// First present (non-null) value among `keys`.
pub(crate) fn field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let map = obj.as_object()?;
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
}

pub(crate) fn array<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    field(obj, keys)?.as_array()
}

/// Number coercion: JSON numbers, numeric strings and booleans.
pub(crate) fn to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub(crate) fn number(obj: &Value, keys: &[&str]) -> Option<f64> {
    field(obj, keys).and_then(to_f64)
}

pub(crate) fn number_or(obj: &Value, keys: &[&str], default: f64) -> f64 {
    number(obj, keys)
        .filter(|n| n.is_finite())
        .unwrap_or(default)
}

/// Non-negative integer; fractional values are truncated, negatives clamp to zero.
pub(crate) fn index(obj: &Value, keys: &[&str]) -> Option<u64> {
    number(obj, keys)
        .filter(|n| n.is_finite())
        .map(|n| n.max(0.0) as u64)
}

/// Names may be encoded as strings or bare numbers (`"0014"` vs `14`).
pub(crate) fn text(obj: &Value, keys: &[&str]) -> Option<String> {
    match field(obj, keys)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn flag(obj: &Value, keys: &[&str]) -> bool {
    match field(obj, keys) {
        Some(Value::Bool(b)) => *b,
        Some(v) => to_f64(v).is_some_and(|n| n != 0.0),
        None => false,
    }
}
