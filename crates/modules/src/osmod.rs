//! The `os` host module: process environment access.

use quill_core::Result;
use quill_interop::{wrap_fn0, wrap_fn1, wrap_fn2};
use quill_object::{Module, NativeFunction, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) fn module() -> Module {
    let mut attrs = BTreeMap::new();
    let mut add = |native: NativeFunction| {
        attrs.insert(native.name().to_string(), Value::Native(Arc::new(native)));
    };

    add(wrap_fn1("getenv", |_cx, name: String| {
        Ok(std::env::var(&name).unwrap_or_default())
    }));
    add(wrap_fn2("setenv", |_cx, name: String, value: String| {
        std::env::set_var(name, value);
        Ok(Value::Nil)
    }));
    add(wrap_fn0("environ", |_cx| {
        let vars: BTreeMap<String, String> = std::env::vars().collect();
        Ok(vars)
    }));

    Module::new("os", attrs)
}
