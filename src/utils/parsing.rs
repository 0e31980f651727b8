use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::RemoteError;

/// Parse a response body into a JSON object. A top-level array is wrapped as
/// `{"data": [...]}` first so every handler sees an object.
pub fn normalize_json_body(body: &str) -> Result<Value, RemoteError> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('[') {
        let data: Value = serde_json::from_str(trimmed)?;
        let mut wrapped = serde_json::Map::new();
        wrapped.insert("data".to_string(), data);
        return Ok(Value::Object(wrapped));
    }
    Ok(serde_json::from_str(trimmed)?)
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Metadata blocks sometimes carry lists (e.g. several images); use the first entry
        Value::Array(items) => items.into_iter().next().map(value_to_string).unwrap_or_default(),
        Value::Object(mut map) => map
            .remove("url")
            .or_else(|| map.remove("name"))
            .map(value_to_string)
            .unwrap_or_default(),
    }
}

/// Accept a string, number, null or list where a string is expected.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_string(Value::deserialize(deserializer)?))
}

/// Accept `3`, `"3"` or garbage (0) where a count is expected.
pub fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}
