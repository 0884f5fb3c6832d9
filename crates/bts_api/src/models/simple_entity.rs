use serde::de::Deserializer;
use serde::Deserialize;
use serde_json::Value;

/// Accepts string, numeric or boolean identifiers and stores them as trimmed text.
///
/// Trackers disagree on whether ids are `"10010"` or `10010`; both map to `Some("10010")`.
pub fn deserialize_string_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|val| match val {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => None,
        other => serde_json::to_string(&other).ok(),
    }))
}
