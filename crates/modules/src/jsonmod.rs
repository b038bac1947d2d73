//! The `json` host module.

use quill_core::{Error, Result};
use quill_interop::{json_to_value, value_to_json, wrap_fn1};
use quill_object::{Module, NativeFunction, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) fn module() -> Module {
    let mut attrs = BTreeMap::new();
    let mut add = |native: NativeFunction| {
        attrs.insert(native.name().to_string(), Value::Native(Arc::new(native)));
    };

    add(wrap_fn1("marshal", |_cx, value: Value| {
        let json = value_to_json(&value)?;
        serde_json::to_string(&json)
            .map_err(|err| Error::value(format!("cannot marshal to JSON: {err}")))
    }));
    add(wrap_fn1("unmarshal", |_cx, text: String| {
        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|err| Error::value(format!("invalid JSON: {err}")))?;
        Ok(json_to_value(&json))
    }));

    Module::new("json", attrs)
}
