//! JSON <-> TaggedValue conversion
//!
//! A debugging and interop bridge. JSON has a single integer kind, so
//! width information does not survive the trip; bytes render as base64
//! strings and decimals as their text form.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::Result;
use crate::value::{Compound, TaggedValue};

/// Convert a JSON value to a tree
pub fn from_json(json: &JsonValue) -> TaggedValue {
    match json {
        JsonValue::Null => TaggedValue::Null,
        JsonValue::Bool(b) => TaggedValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                TaggedValue::I64(i)
            } else if let Some(u) = n.as_u64() {
                TaggedValue::U64(u)
            } else {
                TaggedValue::F64(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => TaggedValue::Str(s.clone()),
        JsonValue::Array(arr) => TaggedValue::List(arr.iter().map(from_json).collect()),
        JsonValue::Object(obj) => {
            let mut compound = Compound::with_capacity(obj.len());
            for (k, v) in obj {
                compound.insert(k.clone(), from_json(v));
            }
            TaggedValue::Compound(compound)
        }
    }
}

/// Convert a tree to a JSON value
pub fn to_json(value: &TaggedValue) -> JsonValue {
    match value {
        TaggedValue::Null => JsonValue::Null,
        TaggedValue::Bool(b) => JsonValue::Bool(*b),
        TaggedValue::I8(v) => JsonValue::Number(Number::from(*v)),
        TaggedValue::I16(v) => JsonValue::Number(Number::from(*v)),
        TaggedValue::I32(v) => JsonValue::Number(Number::from(*v)),
        TaggedValue::I64(v) => JsonValue::Number(Number::from(*v)),
        TaggedValue::U8(v) => JsonValue::Number(Number::from(*v)),
        TaggedValue::U16(v) => JsonValue::Number(Number::from(*v)),
        TaggedValue::U32(v) => JsonValue::Number(Number::from(*v)),
        TaggedValue::U64(v) => JsonValue::Number(Number::from(*v)),
        TaggedValue::F32(v) => Number::from_f64(*v as f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        TaggedValue::F64(v) => Number::from_f64(*v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        TaggedValue::Decimal(d) => JsonValue::String(d.to_string()),
        TaggedValue::Str(s) => JsonValue::String(s.clone()),
        TaggedValue::Bytes(data) => JsonValue::String(BASE64.encode(data)),
        TaggedValue::List(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        TaggedValue::Compound(compound) => {
            let mut map = Map::new();
            for (k, v) in compound.iter() {
                map.insert(k.to_string(), to_json(v));
            }
            JsonValue::Object(map)
        }
    }
}

/// Parse a JSON string to a tree
pub fn parse_json(json_str: &str) -> Result<TaggedValue> {
    let json: JsonValue = serde_json::from_str(json_str)?;
    Ok(from_json(&json))
}

/// Stringify a tree to a JSON string
pub fn stringify_json(value: &TaggedValue) -> String {
    serde_json::to_string(&to_json(value)).unwrap_or_default()
}

/// Stringify a tree to a pretty JSON string
pub fn stringify_json_pretty(value: &TaggedValue) -> String {
    serde_json::to_string_pretty(&to_json(value)).unwrap_or_default()
}
