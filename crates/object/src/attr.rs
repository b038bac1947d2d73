//! Attribute access.
//!
//! Every variant exposes a fixed attribute registry: a compile-time match
//! from name to either a property (a plain value) or a bound method (a
//! native callable closed over the receiver). Unknown attribute reads
//! return `None`; the caller decides whether that is an error. Attribute
//! writes succeed only where declared — map entries — and fail with a
//! type error everywhere else.

use crate::native::{CallContext, NativeFunction};
use crate::value::Value;
use crate::{bytes, list, map, string, time};
use quill_core::{Error, Result};
use std::sync::Arc;

/// Builds a bound method: a native callable that closes over the receiver.
pub(crate) fn method<F>(receiver: &Value, name: &'static str, f: F) -> Value
where
    F: Fn(&mut dyn CallContext, &Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
{
    let receiver = receiver.clone();
    Value::Native(Arc::new(NativeFunction::new(name, move |cx, args| {
        f(cx, &receiver, args)
    })))
}

/// Resolves an attribute on `value`. Returns `None` when the attribute is
/// not declared for the variant.
pub fn get_attr(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::String(_) => string::attr(value, name),
        Value::Bytes(_) => bytes::attr(value, name),
        Value::List(_) => list::attr(value, name),
        Value::Map(_) => map::attr(value, name),
        Value::Time(_) => time::attr(value, name),
        Value::Range(range) => match name {
            "start" => Some(Value::Int(range.start())),
            "stop" => Some(Value::Int(range.stop())),
            "step" => Some(Value::Int(range.step())),
            _ => None,
        },
        Value::Error(err) => match name {
            "message" => Some(Value::string(err.message())),
            "kind" => Some(Value::string(err.kind().to_string())),
            _ => None,
        },
        Value::Module(module) => module.get(name),
        _ => None,
    }
}

/// Assigns an attribute. Only map entries are writable this way.
pub fn set_attr(value: &Value, name: &str, item: Value) -> Result<()> {
    match value {
        Value::Map(entries) => {
            entries.write().insert(name.to_string(), item);
            Ok(())
        }
        other => Err(Error::type_error(format!(
            "cannot set attribute {name:?} on {}",
            other.type_name()
        ))),
    }
}
