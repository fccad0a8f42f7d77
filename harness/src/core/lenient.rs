//! Defensive field parsing for the hand-edited task document.
//!
//! Workers and humans both edit `harness-tasks.json`, so numbers arrive as
//! strings, lists arrive as scalars and ids arrive as numbers. Every helper here
//! falls back to a default instead of rejecting the document.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Interpret a JSON value as a non-negative integer (numbers or numeric strings).
pub fn value_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// Interpret a JSON scalar as a string. Objects, arrays and null yield `None`.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => Some(raw.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

pub fn u32_or_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_u32(&value).unwrap_or(0))
}

pub fn optional_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_u32(&value))
}

pub fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(&value).unwrap_or_default())
}

pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

/// A list of strings; scalars inside the list are stringified, anything that is
/// not a list becomes empty.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(value_to_string).collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_accept_numeric_strings_only() {
        assert_eq!(value_to_u32(&json!(3)), Some(3));
        assert_eq!(value_to_u32(&json!(" 7 ")), Some(7));
        assert_eq!(value_to_u32(&json!("oops")), None);
        assert_eq!(value_to_u32(&json!(-1)), None);
        assert_eq!(value_to_u32(&json!(null)), None);
    }

    #[test]
    fn strings_stringify_scalars() {
        assert_eq!(value_to_string(&json!(12)), Some("12".to_string()));
        assert_eq!(value_to_string(&json!("t1")), Some("t1".to_string()));
        assert_eq!(value_to_string(&json!({"a": 1})), None);
    }
}
