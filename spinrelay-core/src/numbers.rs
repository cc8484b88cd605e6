//! Numeric helpers for reading loosely typed upstream JSON.
//!
//! The upstream API mixes integers, floats, numeric strings and nulls for the
//! same field across game kinds. Every read of an amount or counter goes
//! through this module so the coercion rules live in one place.

use num_traits::cast::cast;
use serde_json::Value;

/// Round a f64 and clamp it to the i64 range, returning 0 for non-finite values.
#[must_use]
pub fn round_f64_to_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).round();
    cast::<f64, i64>(clamped).unwrap_or(0)
}

/// Read a JSON number as a whole amount. Strings are not coerced.
#[must_use]
pub fn amount(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().map(round_f64_to_i64)),
        _ => None,
    }
}

/// Like [`amount`] but also accepts numeric strings (`"42"`, `" 7 "`).
#[must_use]
pub fn lenient_int(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(round_f64_to_i64))
        }
        other => amount(other),
    }
}

/// First candidate that reads as a non-zero amount, mirroring `a || b || c`.
#[must_use]
pub fn first_nonzero<'a, I>(candidates: I) -> Option<i64>
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    candidates
        .into_iter()
        .flatten()
        .filter_map(amount)
        .find(|v| *v != 0)
}

/// First candidate that reads as a positive integer, numeric strings included.
#[must_use]
pub fn first_positive_lenient<'a, I>(candidates: I) -> Option<i64>
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    candidates
        .into_iter()
        .flatten()
        .filter_map(lenient_int)
        .find(|v| *v > 0)
}

/// Clamp an amount into a sub-spin counter.
#[must_use]
pub fn to_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Loose truthiness used by the upstream's flag fields.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a scalar id (`"abc"` or `17`) as an owned token string.
#[must_use]
pub fn token_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
