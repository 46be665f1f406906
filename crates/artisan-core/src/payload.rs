//! Field access over untyped model payloads
//!
//! Model responses arrive as loosely shaped JSON objects. These helpers read
//! a field under any of its accepted spellings and coerce it to the expected
//! shape, treating wrong types as absent.

use serde_json::{Map, Value};

pub(crate) type Object = Map<String, Value>;

/// First present, non-null value among `keys`
pub(crate) fn field<'a>(object: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find(|v| !v.is_null())
}

/// String field, trimmed; blank strings count as absent
pub(crate) fn string_field(object: &Object, keys: &[&str]) -> Option<String> {
    field(object, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Raw string field, untrimmed; empty strings are kept
pub(crate) fn raw_string_field(object: &Object, keys: &[&str]) -> Option<String> {
    field(object, keys).and_then(Value::as_str).map(str::to_string)
}

/// List of strings; a single string becomes a one-element list
pub(crate) fn string_list(object: &Object, keys: &[&str]) -> Vec<String> {
    match field(object, keys) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Number field; numeric strings are accepted
pub(crate) fn number_field(object: &Object, keys: &[&str]) -> Option<f64> {
    let number = match field(object, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}
