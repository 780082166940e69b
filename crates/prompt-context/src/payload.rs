//! Lazy-diff payload coercion
//!
//! Turns the loosely typed payload of a `lazy-diff` item into the argument
//! vector for `git diff`. Pure; failures come back as `InvalidPayload` so the
//! renderer can show them inline.

use crate::argv::parse_argv;
use crate::error::{ContextError, ContextResult};
use serde_json::Value;

/// JSON type name used in payload error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Coerce a payload into diff arguments.
///
/// - absent or `null`: `Ok(None)`, the default policy decides
/// - array: every element must be a string
/// - string: split with shell-like quoting
/// - anything else: `InvalidPayload` naming the observed type
///
/// An empty array or blank string yields `Some(vec![])`; the caller treats
/// that like absent.
pub fn coerce_payload(payload: Option<&Value>) -> ContextResult<Option<Vec<String>>> {
    match payload {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(elements)) => coerce_elements(elements).map(Some),
        Some(Value::String(line)) => Ok(Some(parse_argv(line))),
        Some(other) => Err(ContextError::invalid_payload(format!(
            "Invalid payload: expected a string or string array, but got type '{}'",
            type_name(other)
        ))),
    }
}

fn coerce_elements(elements: &[Value]) -> ContextResult<Vec<String>> {
    let mut args = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        match element {
            Value::String(s) => args.push(s.clone()),
            Value::Null => {
                return Err(ContextError::invalid_payload(format!(
                    "Invalid payload: expected a string array, but found null/undefined at index {}",
                    index
                )))
            }
            other => {
                return Err(ContextError::invalid_payload(format!(
                    "Invalid payload: expected a string array, but found non-string element at index {} (type '{}')",
                    index,
                    type_name(other)
                )))
            }
        }
    }
    Ok(args)
}
