use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Reads a JSON scalar as display text.
///
/// Strings pass through, numbers and `true` are stringified. Empty strings, `false`,
/// `null`, arrays and objects count as absent.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Looks up `key` on an object and reads it with [`scalar_text`].
pub(crate) fn field_text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_text)
}

/// `deserialize_with` adapter that never fails on a mistyped field.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_text))
}
