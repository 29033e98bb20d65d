//! Explicit coercions applied at the boundary of statistics and execution.
//!
//! Every function takes `Option<&Value>` so that an absent key
//! (`None`, "undefined") can be told apart from an explicit `null`.

use chrono::{DateTime, NaiveDate};

use crate::model::Value;

/// A value is present unless it is absent, null, or a blank string.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Text(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Generic numeric parse. `None` stands for NaN.
///
/// - absent -> NaN, null -> 0, booleans -> 0/1
/// - strings are trimmed; blank -> 0; decimal, exponent, `0x`/`0o`/`0b`
///   and `Infinity` forms are accepted; anything else is NaN
/// - a list coerces through its stringification (`[]` -> 0, `[7]` -> 7,
///   `[null]` -> 0, `[1, 2]` -> NaN); objects are NaN
pub fn to_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => (!n.is_nan()).then_some(*n),
        Value::Text(s) => parse_numeric_text(s),
        list @ Value::List(_) => parse_numeric_text(&display_string(list)),
        Value::Object(_) => None,
    }
}

/// Numeric parse of a string, following the same rules as [`to_number`].
pub fn parse_numeric_text(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Some(0.0);
    }
    match t {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = t.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix).ok().map(|n| n as f64);
        }
    }
    // f64::from_str also takes "inf" and "nan"; the generic parse does not
    if !t.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
        return None;
    }
    t.parse::<f64>().ok()
}

/// Only real booleans are booleans. `"true"` is text.
pub fn to_bool(value: Option<&Value>) -> Option<bool> {
    value.and_then(Value::as_bool)
}

/// Days since 1970-01-01 for RFC 3339 timestamps and `YYYY-MM-DD` dates.
pub fn to_date_ordinal(value: Option<&Value>) -> Option<i64> {
    let text = value?.as_str()?.trim();
    let date = DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()?;
    Some((date - epoch()).num_days())
}

/// Inverse of [`to_date_ordinal`], rendered as `YYYY-MM-DD`.
pub fn date_from_ordinal(days: i64) -> String {
    (epoch() + chrono::Duration::days(days)).format("%Y-%m-%d").to_string()
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Stringification used for categorical counting and `contains`.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::Text(s) => s.clone(),
        Value::List(items) => items
            .iter()
            .map(|item| if item.is_null() { String::new() } else { display_string(item) })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Shortest round-trip rendering: `30`, not `30.0`; `-0` prints as `0`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}
