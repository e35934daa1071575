//! Argument validation against a tool's input schema.
//!
//! Validates exactly what dispatch needs before a handler runs: the
//! arguments form an object, every `required` field is present, and each
//! declared property with a primitive `type` matches. Anything deeper is the
//! handler's business.

use serde_json::{Map, Value};

/// Check `arguments` against `schema`, returning the offending field on
/// failure.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), String> {
    let Some(schema) = schema.as_object() else {
        return Ok(());
    };

    if schema.get("type").and_then(Value::as_str) == Some("object")
        && !(arguments.is_object() || arguments.is_null())
    {
        return Err("arguments must be an object".to_string());
    }

    let empty = Map::new();
    let args = arguments.as_object().unwrap_or(&empty);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(field) {
                return Err(format!("missing required argument '{field}'"));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (field, property) in properties {
            let Some(value) = args.get(field) else {
                continue;
            };
            let Some(expected) = property.get("type").and_then(Value::as_str) else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(format!("argument '{field}' should be {expected}"));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}
