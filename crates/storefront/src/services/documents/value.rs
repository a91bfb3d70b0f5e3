//! Conversion between plain JSON and Firestore's typed value encoding.
//!
//! Firestore's REST API wraps every value in a single-key object naming its
//! type, e.g. `{"stringValue": "Rose Quartz"}` or
//! `{"mapValue": {"fields": {...}}}`. Our documents are defined with serde, so
//! the codec works on `serde_json::Value` and the document types never see
//! the wire encoding.

use serde_json::{Map, Number, Value};

use super::DocumentError;

/// Encode a JSON object as a Firestore `fields` map.
///
/// # Errors
///
/// Returns an error if `value` is not a JSON object.
pub fn encode_fields(value: &Value) -> Result<Value, DocumentError> {
    let Value::Object(map) = value else {
        return Err(DocumentError::Parse(
            "document root must be an object".to_string(),
        ));
    };
    Ok(Value::Object(
        map.iter()
            .map(|(key, value)| (key.clone(), encode(value)))
            .collect(),
    ))
}

/// Decode a Firestore `fields` map into a JSON object.
///
/// # Errors
///
/// Returns an error if `fields` is not an object or holds an unknown value type.
pub fn decode_fields(fields: &Value) -> Result<Value, DocumentError> {
    let Value::Object(map) = fields else {
        return Err(DocumentError::Parse("fields must be an object".to_string()));
    };
    map.iter()
        .map(|(key, value)| Ok((key.clone(), decode(value)?)))
        .collect::<Result<Map<String, Value>, DocumentError>>()
        .map(Value::Object)
}

/// Encode one JSON value.
#[must_use]
pub fn encode(value: &Value) -> Value {
    let mut wrapper = Map::new();
    match value {
        Value::Null => {
            wrapper.insert("nullValue".to_string(), Value::Null);
        }
        Value::Bool(b) => {
            wrapper.insert("booleanValue".to_string(), Value::Bool(*b));
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                wrapper.insert("integerValue".to_string(), Value::String(i.to_string()));
            } else {
                wrapper.insert("doubleValue".to_string(), Value::Number(n.clone()));
            }
        }
        Value::String(s) => {
            wrapper.insert("stringValue".to_string(), Value::String(s.clone()));
        }
        Value::Array(items) => {
            let mut array = Map::new();
            if !items.is_empty() {
                array.insert(
                    "values".to_string(),
                    Value::Array(items.iter().map(encode).collect()),
                );
            }
            wrapper.insert("arrayValue".to_string(), Value::Object(array));
        }
        Value::Object(map) => {
            let fields: Map<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), encode(v))).collect();
            let mut inner = Map::new();
            inner.insert("fields".to_string(), Value::Object(fields));
            wrapper.insert("mapValue".to_string(), Value::Object(inner));
        }
    }
    Value::Object(wrapper)
}

/// Decode one Firestore value.
///
/// # Errors
///
/// Returns an error if the value is not a single-key typed wrapper.
pub fn decode(value: &Value) -> Result<Value, DocumentError> {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Err(DocumentError::Parse(format!("not a typed value: {value}")));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or_default())),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(Number::from(i)))
                .ok_or_else(|| DocumentError::Parse(format!("bad integerValue: {inner}")))
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::Number(n) => n.as_f64(),
                // NaN and Infinity arrive as strings.
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            Ok(parsed
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number))
        }
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Ok(Value::String(inner.as_str().unwrap_or_default().to_string()))
        }
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => inner
            .get("values")
            .and_then(Value::as_array)
            .map_or_else(|| Ok(Vec::new()), |values| values.iter().map(decode).collect())
            .map(Value::Array),
        "mapValue" => inner
            .get("fields")
            .map_or_else(|| Ok(Value::Object(Map::new())), decode_fields),
        other => Err(DocumentError::Parse(format!("unknown value type: {other}"))),
    }
}
