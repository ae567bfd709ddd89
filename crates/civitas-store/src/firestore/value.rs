//! Conversion between plain JSON and Firestore typed values

use civitas_core::{Error, Result};
use serde_json::{json, Map, Number, Value};

/// Encode a JSON value as a Firestore `Value`
pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // integerValue is transported as a decimal string
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode the top-level fields of a document
pub fn encode_fields(map: &Map<String, Value>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), encode(v))).collect())
}

/// Decode a Firestore `Value` back into plain JSON
pub fn decode(value: &Value) -> Result<Value> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::store(format!("Firestore value is not an object: {}", value)))?;
    let (kind, inner) = object
        .iter()
        .next()
        .ok_or_else(|| Error::store("Empty Firestore value"))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| invalid(kind, inner)),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .or_else(|| inner.as_i64())
            .map(|i| Value::Number(i.into()))
            .ok_or_else(|| invalid(kind, inner)),
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid(kind, inner)),
        "stringValue" | "timestampValue" | "referenceValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| invalid(kind, inner)),
        "arrayValue" => {
            let items: Vec<Value> = match inner.get("values") {
                Some(Value::Array(items)) => items.iter().map(decode).collect::<Result<_>>()?,
                _ => Vec::new(),
            };
            Ok(Value::Array(items))
        }
        "mapValue" => match inner.get("fields") {
            Some(fields) => decode_fields(fields),
            None => Ok(Value::Object(Map::new())),
        },
        other => Err(Error::store(format!("Unsupported Firestore value type: {}", other))),
    }
}

/// Decode the `fields` object of a document
pub fn decode_fields(fields: &Value) -> Result<Value> {
    let map = fields
        .as_object()
        .ok_or_else(|| Error::store("Firestore fields is not an object"))?;
    map.iter()
        .map(|(k, v)| decode(v).map(|v| (k.clone(), v)))
        .collect::<Result<Map<_, _>>>()
        .map(Value::Object)
}

fn invalid(kind: &str, inner: &Value) -> Error {
    Error::store(format!("Invalid Firestore {}: {}", kind, inner))
}
