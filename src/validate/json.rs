//! Structured-data answers.

use indexmap::IndexMap;
use serde_json::Value;

/// Parses `answer` and compares the expected fields.
///
/// Returns `Err(())` when the answer is not JSON at all, `Ok(false)` when
/// it parses but is not an object or a field differs.
pub(super) fn check_fields(expected: &IndexMap<String, Value>, answer: &str) -> Result<bool, ()> {
    let parsed: Value = serde_json::from_str(answer.trim()).map_err(|_| ())?;
    let Some(object) = parsed.as_object() else {
        return Ok(false);
    };
    Ok(expected
        .iter()
        .all(|(key, want)| object.get(key).is_some_and(|got| values_match(want, got))))
}

/// Typed equality where numbers compare by value (`1` == `1.0`).
fn values_match(want: &Value, got: &Value) -> bool {
    match (want, got) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= f64::EPSILON * x.abs().max(1.0),
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_match(x, y))
        }
        (Value::Object(a), Value::Object(b)) => a
            .iter()
            .all(|(k, v)| b.get(k).is_some_and(|other| values_match(v, other))),
        _ => want == got,
    }
}
