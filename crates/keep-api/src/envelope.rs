//! The notes service is inconsistent about wrapping payloads: some endpoints
//! answer with a bare value, others with `{"data": ...}`. Everything read
//! from the service (or from a cache written by older clients) goes through
//! these helpers.

use keep_core::{KeepError, KeepResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Returns the items of a collection response: the body itself when it is an
/// array, or its `data` field when that is an array.
pub fn normalize_collection(value: Value) -> KeepResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(KeepError::malformed(format!(
                "expected `data` to be an array, found {}",
                describe(&other)
            ))),
            None => Err(KeepError::malformed(
                "expected an array or an object with a `data` array",
            )),
        },
        other => Err(KeepError::malformed(format!(
            "expected an array or an object with a `data` array, found {}",
            describe(&other)
        ))),
    }
}

/// Returns the entity of a single-item response: `data` when it is an object
/// carrying an `id`, otherwise the body itself.
pub fn unwrap_entity(value: Value) -> Value {
    if let Value::Object(object) = &value
        && let Some(data @ Value::Object(inner)) = object.get("data")
        && inner.get("id").is_some_and(|id| !id.is_null())
    {
        return data.clone();
    }

    value
}

/// Decodes each item, dropping (and logging) the ones that do not fit `T`.
pub fn decode_items<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> Vec<T> {
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!("dropping {what} entry that failed to decode: {err}");
                None
            }
        })
        .collect();

    if decoded.len() != total {
        tracing::warn!("kept {} of {total} {what} entries", decoded.len());
    }

    decoded
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
