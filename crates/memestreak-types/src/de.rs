//! Lenient serde helpers.
//!
//! The website posts codes as either numbers or strings, and PostgREST returns
//! `tg_user_id` as text. Both are accepted here.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts a string, number or bool and keeps its textual form. Empty strings
/// and `null` become `None`.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Accepts an integer chat id stored either as a JSON number or as text.
pub fn lenient_chat_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("chat id out of range: {n}"))),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid chat id: {s}"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "unexpected chat id value: {other}"
        ))),
    }
}

/// Serializes a chat id as text, matching the `tg_user_id text` column.
pub fn chat_id_as_text<S>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(id) => serializer.serialize_str(&id.to_string()),
        None => serializer.serialize_none(),
    }
}
