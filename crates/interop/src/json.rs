//! JSON bridging for the `json` host module.

use quill_core::{Error, Result};
use quill_object::Value;
use serde_json::{Map as JsonMap, Number, Value as Json};
use std::collections::BTreeMap;

const MAX_DEPTH: usize = 128;

/// Converts a runtime value into a JSON document.
pub fn value_to_json(value: &Value) -> Result<Json> {
    to_json(value, 0)
}

fn to_json(value: &Value, depth: usize) -> Result<Json> {
    if depth > MAX_DEPTH {
        return Err(Error::value("JSON nesting too deep"));
    }
    match value {
        Value::Nil => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Int(i) => Ok(Json::Number(Number::from(*i))),
        Value::Byte(b) => Ok(Json::Number(Number::from(*b))),
        Value::Float(x) => Number::from_f64(*x)
            .map(Json::Number)
            .ok_or_else(|| Error::value("cannot marshal a non-finite float")),
        Value::String(s) => Ok(Json::String(s.to_string())),
        Value::Bytes(bytes) => Ok(Json::Array(
            bytes
                .read()
                .iter()
                .map(|&b| Json::Number(Number::from(b)))
                .collect(),
        )),
        Value::List(items) => {
            let items = items.read().clone();
            let array: Result<Vec<Json>> =
                items.iter().map(|item| to_json(item, depth + 1)).collect();
            Ok(Json::Array(array?))
        }
        Value::Map(entries) => {
            let entries = entries.read().clone();
            let mut object = JsonMap::new();
            for (key, item) in entries.iter() {
                object.insert(key.clone(), to_json(item, depth + 1)?);
            }
            Ok(Json::Object(object))
        }
        Value::Time(t) => Ok(Json::String(t.to_rfc3339())),
        other => Err(Error::type_error(format!(
            "cannot marshal {} to JSON",
            other.type_name()
        ))),
    }
}

/// Converts a parsed JSON document into a runtime value.
pub fn json_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::string(s.clone()),
        Json::Array(items) => Value::list(items.iter().map(json_to_value).collect()),
        Json::Object(entries) => {
            let map: BTreeMap<String, Value> = entries
                .iter()
                .map(|(key, item)| (key.clone(), json_to_value(item)))
                .collect();
            Value::map(map)
        }
    }
}
