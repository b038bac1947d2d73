//! Map methods.

use crate::attr::method;
use crate::native::{require_args_range, CallContext};
use crate::value::Value;
use quill_core::{Error, Result};

pub(crate) fn attr(receiver: &Value, name: &str) -> Option<Value> {
    match name {
        "get" => Some(method(receiver, "get", get)),
        "pop" => Some(method(receiver, "pop", pop)),
        "set_default" => Some(method(receiver, "set_default", set_default)),
        "update" => Some(method(receiver, "update", update)),
        "clear" => Some(method(receiver, "clear", clear)),
        // Attribute-style access falls through to the entries themselves.
        _ => entries(receiver).read().get(name).cloned(),
    }
}

fn entries(receiver: &Value) -> &crate::value::MapRef {
    match receiver {
        Value::Map(entries) => entries,
        _ => unreachable!("map method bound to non-map receiver"),
    }
}

fn key_arg(name: &str, args: &[Value]) -> Result<String> {
    match &args[0] {
        Value::String(k) => Ok(k.to_string()),
        other => Err(Error::type_error(format!(
            "{name}: map keys must be string, got {}",
            other.type_name()
        ))),
    }
}

fn get(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args_range("get", args, 1, 2)?;
    let key = key_arg("get", args)?;
    match entries(receiver).read().get(&key) {
        Some(value) => Ok(value.clone()),
        None => Ok(args.get(1).cloned().unwrap_or(Value::Nil)),
    }
}

fn pop(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args_range("pop", args, 1, 2)?;
    let key = key_arg("pop", args)?;
    match entries(receiver).write().remove(&key) {
        Some(value) => Ok(value),
        None => match args.get(1) {
            Some(default) => Ok(default.clone()),
            None => Err(Error::index(format!("key not found: {key:?}"))),
        },
    }
}

fn set_default(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args_range("set_default", args, 1, 2)?;
    let key = key_arg("set_default", args)?;
    let default = args.get(1).cloned().unwrap_or(Value::Nil);
    let mut entries = entries(receiver).write();
    Ok(entries.entry(key).or_insert(default).clone())
}

fn update(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args_range("update", args, 1, 1)?;
    let other = match &args[0] {
        Value::Map(other) => other.read().clone(),
        other => {
            return Err(Error::type_error(format!(
                "update: expected map, got {}",
                other.type_name()
            )))
        }
    };
    entries(receiver).write().extend(other);
    Ok(Value::Nil)
}

fn clear(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args_range("clear", args, 0, 0)?;
    entries(receiver).write().clear();
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::get_attr;
    use quill_core::Context;
    use std::collections::BTreeMap;

    struct NoCalls(Context);

    impl CallContext for NoCalls {
        fn context(&self) -> &Context {
            &self.0
        }

        fn call(&mut self, _callable: &Value, _args: Vec<Value>) -> Result<Value> {
            Err(Error::runtime("no calls"))
        }
    }

    fn invoke(receiver: &Value, name: &str, args: &[Value]) -> Result<Value> {
        let bound = get_attr(receiver, name).expect("method exists");
        match bound {
            Value::Native(native) => native.invoke(&mut NoCalls(Context::background()), args),
            _ => panic!("expected bound method"),
        }
    }

    fn sample() -> Value {
        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), Value::Int(1));
        entries.insert("b".to_string(), Value::Int(2));
        Value::map(entries)
    }

    #[test]
    fn test_get_with_default() {
        let map = sample();
        assert_eq!(
            invoke(&map, "get", &[Value::string("a")]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            invoke(&map, "get", &[Value::string("z")]).unwrap(),
            Value::Nil
        );
        assert_eq!(
            invoke(&map, "get", &[Value::string("z"), Value::Int(9)]).unwrap(),
            Value::Int(9)
        );
    }

    #[test]
    fn test_pop() {
        let map = sample();
        assert_eq!(
            invoke(&map, "pop", &[Value::string("a")]).unwrap(),
            Value::Int(1)
        );
        assert!(invoke(&map, "pop", &[Value::string("a")]).is_err());
        assert_eq!(
            invoke(&map, "pop", &[Value::string("a"), Value::Nil]).unwrap(),
            Value::Nil
        );
    }

    #[test]
    fn test_set_default() {
        let map = sample();
        assert_eq!(
            invoke(&map, "set_default", &[Value::string("a"), Value::Int(9)]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            invoke(&map, "set_default", &[Value::string("c"), Value::Int(9)]).unwrap(),
            Value::Int(9)
        );
        assert_eq!(
            invoke(&map, "get", &[Value::string("c")]).unwrap(),
            Value::Int(9)
        );
    }

    #[test]
    fn test_update_and_clear() {
        let map = sample();
        let mut other = BTreeMap::new();
        other.insert("b".to_string(), Value::Int(20));
        other.insert("c".to_string(), Value::Int(3));
        invoke(&map, "update", &[Value::map(other)]).unwrap();
        assert_eq!(
            invoke(&map, "get", &[Value::string("b")]).unwrap(),
            Value::Int(20)
        );

        invoke(&map, "clear", &[]).unwrap();
        assert!(!map.truthy());
    }

    #[test]
    fn test_attribute_style_key_access() {
        let map = sample();
        assert_eq!(get_attr(&map, "a"), Some(Value::Int(1)));
        assert_eq!(get_attr(&map, "missing"), None);
        // Method names shadow same-named keys.
        let _ = invoke(&map, "get", &[Value::string("get")]);
        assert!(matches!(get_attr(&map, "get"), Some(Value::Native(_))));
    }
}
