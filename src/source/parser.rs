//! Wire JSON to model mapping
//!
//! Stateless functions shared by every resource type. The field mapping itself
//! lives in the models' serde attributes; these functions deal with envelopes
//! and turn decoding failures into [`SourceError::Parse`].

use super::{SourceError, SourceResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Envelope keys the API may wrap payloads in
const ENVELOPE_KEYS: [&str; 3] = ["data", "items", "results"];

/// Strip a single-key `{"data": ...}` style envelope, if present
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 => {
            let key = map.keys().next().cloned().unwrap_or_default();
            if ENVELOPE_KEYS.contains(&key.as_str()) {
                map.remove(&key).unwrap_or(Value::Null)
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

/// Map one resource from its wire JSON
pub fn parse_resource<R: DeserializeOwned>(value: Value) -> SourceResult<R> {
    serde_json::from_value(unwrap_envelope(value))
        .map_err(|e| SourceError::Parse(format!("Invalid {}: {e}", short_type_name::<R>())))
}

/// Map a collection from a bare array or an `{"items": [...]}` style envelope
pub fn parse_collection<R: DeserializeOwned>(value: Value) -> SourceResult<Vec<R>> {
    match unwrap_envelope(value) {
        Value::Array(items) => items.into_iter().map(parse_resource).collect(),
        Value::Object(map) => {
            // Paginated responses carry metadata next to the items
            for key in ENVELOPE_KEYS {
                if let Some(Value::Array(items)) = map.get(key) {
                    return items.iter().cloned().map(parse_resource).collect();
                }
            }
            Err(SourceError::Parse(
                "Expected an array of resources".to_string(),
            ))
        }
        Value::Null => Ok(Vec::new()),
        other => Err(SourceError::Parse(format!(
            "Expected an array of resources, got {other}"
        ))),
    }
}

/// Extract the bearer token from a login response
pub fn parse_token(value: &Value) -> SourceResult<String> {
    ["token", "accessToken", "access_token"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SourceError::Parse("Token response has no token".to_string()))
}

fn short_type_name<R>() -> &'static str {
    let name = std::any::type_name::<R>();
    name.rsplit("::").next().unwrap_or(name)
}
