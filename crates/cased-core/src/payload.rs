//! Event payloads and the deep-merge rule.
//!
//! Every layer that contributes fields to an outgoing event (plugins, context,
//! caller data, PII annotations) is combined with the same rule:
//!
//! - both values are objects: merge key-wise, recursively
//! - both values are arrays: concatenate current then incoming, keeping order
//!   and duplicates
//! - anything else: the incoming value replaces the current one

use serde_json::{Map, Value};

use crate::error::ValidationError;

/// An event payload: an ordered mapping of case-sensitive keys to JSON values.
pub type Payload = Map<String, Value>;

/// Deep-merges `incoming` into `current`.
///
/// `incoming` wins on scalar conflicts. Type mismatches never fail, the
/// incoming value simply replaces the current one.
///
/// # Examples
///
/// ```
/// use cased_core::{deep_merge, Payload};
/// use serde_json::json;
///
/// let mut current: Payload = serde_json::from_value(json!({
///     "user": "ctx",
///     "m": {"x": "1"},
/// })).unwrap();
/// let incoming: Payload = serde_json::from_value(json!({
///     "user": "evt",
///     "m": {"y": "2"},
/// })).unwrap();
///
/// deep_merge(&mut current, incoming);
/// assert_eq!(current["user"], "evt");
/// assert_eq!(current["m"], json!({"x": "1", "y": "2"}));
/// ```
pub fn deep_merge(current: &mut Payload, incoming: Payload) {
    for (key, value) in incoming {
        match current.get_mut(&key) {
            Some(existing) => merge_values(existing, value),
            None => {
                current.insert(key, value);
            }
        }
    }
}

/// Merges a single `incoming` value into `current` using the deep-merge rule.
pub fn merge_values(current: &mut Value, incoming: Value) {
    match (current, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => deep_merge(existing, incoming),
        (Value::Array(existing), Value::Array(incoming)) => existing.extend(incoming),
        (slot, incoming) => *slot = incoming,
    }
}

/// Returns the payload inside `value`, or a validation error naming `field`
/// when `value` is not a JSON object.
///
/// # Errors
///
/// Returns [`ValidationError`] for arrays, strings, numbers, booleans and null.
pub fn expect_object(value: Value, field: &str) -> Result<Payload, ValidationError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::expected_object(field, kind_of(&other))),
    }
}

/// Short JSON type name used in error messages.
#[must_use]
pub const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
