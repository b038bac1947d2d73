//! Builtin functions available in the default global scope.

use quill_core::{Error, Result};
use quill_interop::wrap_variadic;
use quill_object::{
    compare_values, length, require_args, require_args_range, CallContext, NativeFunction,
    RangeValue, Value, ValueIterator,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) fn globals() -> BTreeMap<String, Value> {
    let mut globals = BTreeMap::new();
    let mut add = |native: NativeFunction| {
        globals.insert(native.name().to_string(), Value::Native(Arc::new(native)));
    };

    add(wrap_variadic("all", all));
    add(wrap_variadic("any", any));
    add(wrap_variadic("assert", assert_builtin));
    add(wrap_variadic("bool", bool_builtin));
    add(wrap_variadic("byte", byte_builtin));
    add(wrap_variadic("bytes", bytes_builtin));
    add(wrap_variadic("chr", chr));
    add(wrap_variadic("error", error_builtin));
    add(wrap_variadic("float", float_builtin));
    add(wrap_variadic("int", int_builtin));
    add(wrap_variadic("keys", keys));
    add(wrap_variadic("len", len));
    add(wrap_variadic("list", list_builtin));
    add(wrap_variadic("map", map_builtin));
    add(wrap_variadic("ord", ord));
    add(wrap_variadic("print", print));
    add(wrap_variadic("printf", printf));
    add(wrap_variadic("range", range_builtin));
    add(wrap_variadic("sorted", sorted));
    add(wrap_variadic("sprintf", sprintf));
    add(wrap_variadic("string", string_builtin));
    add(wrap_variadic("type", type_builtin));
    globals
}

fn iterate_values(value: &Value) -> Result<Vec<Value>> {
    let mut iter = ValueIterator::new(value)?;
    let mut out = Vec::new();
    while let Some((key, item)) = iter.next_entry() {
        out.push(iter.primary(key, item));
    }
    Ok(out)
}

fn all(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("all", args, 1)?;
    Ok(Value::Bool(
        iterate_values(&args[0])?.iter().all(Value::truthy),
    ))
}

fn any(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("any", args, 1)?;
    Ok(Value::Bool(
        iterate_values(&args[0])?.iter().any(Value::truthy),
    ))
}

fn assert_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args_range("assert", args, 1, 2)?;
    if args[0].truthy() {
        return Ok(Value::Nil);
    }
    let message = match args.get(1) {
        Some(message) => message.to_string(),
        None => "assertion failed".to_string(),
    };
    Err(Error::runtime(message))
}

fn bool_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("bool", args, 1)?;
    Ok(Value::Bool(args[0].truthy()))
}

fn byte_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("byte", args, 1)?;
    let wide = args[0].as_int()?;
    u8::try_from(wide)
        .map(Value::Byte)
        .map_err(|_| Error::value(format!("byte value out of range: {wide}")))
}

fn bytes_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args_range("bytes", args, 0, 1)?;
    let Some(source) = args.first() else {
        return Ok(Value::bytes(Vec::new()));
    };
    match source {
        Value::Bytes(bytes) => Ok(Value::bytes(bytes.read().clone())),
        Value::String(s) => Ok(Value::bytes(s.as_bytes().to_vec())),
        Value::List(_) => {
            let mut out = Vec::new();
            for item in iterate_values(source)? {
                let wide = item.as_int()?;
                out.push(
                    u8::try_from(wide)
                        .map_err(|_| Error::value(format!("byte value out of range: {wide}")))?,
                );
            }
            Ok(Value::bytes(out))
        }
        other => Err(Error::type_error(format!(
            "bytes: cannot convert {}",
            other.type_name()
        ))),
    }
}

fn chr(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("chr", args, 1)?;
    let code = args[0].as_int()?;
    let code = u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| Error::value(format!("invalid character code: {}", args[0])))?;
    Ok(Value::string(code.to_string()))
}

fn ord(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("ord", args, 1)?;
    let text = args[0].as_str()?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Int(c as i64)),
        _ => Err(Error::value(format!(
            "ord: expected a single character, got {text:?}"
        ))),
    }
}

fn error_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("error", args, 1)?;
    Ok(Value::error(Error::runtime(args[0].to_string())))
}

fn float_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("float", args, 1)?;
    match &args[0] {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Error::value(format!("invalid float literal: {s:?}"))),
        other => Ok(Value::Float(other.as_float()?)),
    }
}

fn int_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("int", args, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Byte(b) => Ok(Value::Int(*b as i64)),
        Value::Float(x) => Ok(Value::Int(*x as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Error::value(format!("invalid int literal: {s:?}"))),
        other => Err(Error::type_error(format!(
            "int: cannot convert {}",
            other.type_name()
        ))),
    }
}

fn keys(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("keys", args, 1)?;
    match &args[0] {
        Value::Map(entries) => Ok(Value::list(
            entries.read().keys().cloned().map(Value::string).collect(),
        )),
        other => Err(Error::type_error(format!(
            "keys: expected map, got {}",
            other.type_name()
        ))),
    }
}

fn len(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("len", args, 1)?;
    length(&args[0])
}

fn list_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args_range("list", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::list(Vec::new())),
        Some(source) => Ok(Value::list(iterate_values(source)?)),
    }
}

fn map_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args_range("map", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::map(BTreeMap::new())),
        Some(Value::Map(entries)) => Ok(Value::map(entries.read().clone())),
        Some(other) => Err(Error::type_error(format!(
            "map: cannot convert {}",
            other.type_name()
        ))),
    }
}

fn print(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    let parts: Vec<String> = args.iter().map(Value::to_string).collect();
    println!("{}", parts.join(" "));
    Ok(Value::Nil)
}

/// Replaces each `{}` in the format string with the next argument's
/// display form. `{{` and `}}` escape literal braces.
fn format_with(name: &str, format: &str, args: &[Value]) -> Result<String> {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut next = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' if chars.peek() == Some(&'}') => {
                chars.next();
                let arg = args.get(next).ok_or_else(|| {
                    Error::args(format!("{name}: not enough arguments for format string"))
                })?;
                out.push_str(&arg.to_string());
                next += 1;
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn printf(cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    let text = sprintf(cx, args)?;
    print!("{text}");
    Ok(Value::Nil)
}

fn sprintf(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args_range("sprintf", args, 1, usize::MAX)?;
    let format = args[0].as_str()?;
    format_with("sprintf", format, &args[1..]).map(Value::string)
}

fn range_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args_range("range", args, 1, 3)?;
    let (start, stop, step) = match args.len() {
        1 => (0, args[0].as_int()?, 1),
        2 => (args[0].as_int()?, args[1].as_int()?, 1),
        _ => (args[0].as_int()?, args[1].as_int()?, args[2].as_int()?),
    };
    Ok(Value::Range(Arc::new(RangeValue::new(start, stop, step)?)))
}

fn sorted(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("sorted", args, 1)?;
    let mut items = iterate_values(&args[0])?;
    let mut error: Option<Error> = None;
    items.sort_by(|a, b| {
        if error.is_some() {
            return Ordering::Equal;
        }
        match compare_values(a, b) {
            Ok(ordering) => ordering,
            Err(e) => {
                error = Some(e);
                Ordering::Equal
            }
        }
    });
    match error {
        Some(e) => Err(e),
        None => Ok(Value::list(items)),
    }
}

fn string_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("string", args, 1)?;
    Ok(Value::string(args[0].to_string()))
}

fn type_builtin(_cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
    require_args("type", args, 1)?;
    Ok(Value::string(args[0].type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::Context;

    struct NoCalls(Context);

    impl CallContext for NoCalls {
        fn context(&self) -> &Context {
            &self.0
        }

        fn call(&mut self, _callable: &Value, _args: Vec<Value>) -> Result<Value> {
            Err(Error::runtime("no calls"))
        }
    }

    fn invoke(name: &str, args: &[Value]) -> Result<Value> {
        let globals = globals();
        match globals.get(name) {
            Some(Value::Native(native)) => {
                native.invoke(&mut NoCalls(Context::background()), args)
            }
            _ => panic!("no builtin {name}"),
        }
    }

    #[test]
    fn test_len_and_type() {
        assert_eq!(
            invoke("len", &[Value::string("héllo")]).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            invoke("type", &[Value::Int(1)]).unwrap(),
            Value::string("int")
        );
        assert!(invoke("len", &[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(
            invoke("int", &[Value::string(" 42 ")]).unwrap(),
            Value::Int(42)
        );
        assert_eq!(invoke("int", &[Value::Float(3.9)]).unwrap(), Value::Int(3));
        assert_eq!(
            invoke("float", &[Value::Int(2)]).unwrap(),
            Value::Float(2.0)
        );
        assert_eq!(
            invoke("bool", &[Value::string("")]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            invoke("string", &[Value::Int(42)]).unwrap(),
            Value::string("42")
        );
        assert!(invoke("int", &[Value::string("nope")]).is_err());
        assert!(invoke("byte", &[Value::Int(300)]).is_err());
    }

    #[test]
    fn test_chr_ord() {
        assert_eq!(invoke("chr", &[Value::Int(97)]).unwrap(), Value::string("a"));
        assert_eq!(
            invoke("ord", &[Value::string("a")]).unwrap(),
            Value::Int(97)
        );
        assert!(invoke("ord", &[Value::string("ab")]).is_err());
    }

    #[test]
    fn test_keys_sorted_order() {
        let mut entries = BTreeMap::new();
        entries.insert("b".to_string(), Value::Int(1));
        entries.insert("a".to_string(), Value::Int(2));
        assert_eq!(
            invoke("keys", &[Value::map(entries)]).unwrap(),
            Value::list(vec![Value::string("a"), Value::string("b")])
        );
    }

    #[test]
    fn test_sorted_does_not_mutate() {
        let original = Value::list(vec![Value::Int(3), Value::Int(1)]);
        let result = invoke("sorted", &[original.clone()]).unwrap();
        assert_eq!(result, Value::list(vec![Value::Int(1), Value::Int(3)]));
        assert_eq!(
            original,
            Value::list(vec![Value::Int(3), Value::Int(1)])
        );
    }

    #[test]
    fn test_all_any() {
        let list = Value::list(vec![Value::Int(1), Value::Int(0)]);
        assert_eq!(invoke("all", &[list.clone()]).unwrap(), Value::Bool(false));
        assert_eq!(invoke("any", &[list]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_sprintf() {
        assert_eq!(
            invoke(
                "sprintf",
                &[
                    Value::string("{} + {} = {}"),
                    Value::Int(1),
                    Value::Int(2),
                    Value::Int(3)
                ]
            )
            .unwrap(),
            Value::string("1 + 2 = 3")
        );
        assert_eq!(
            invoke("sprintf", &[Value::string("{{literal}}")]).unwrap(),
            Value::string("{literal}")
        );
        let err = invoke("sprintf", &[Value::string("{}")]).unwrap_err();
        assert_eq!(err.kind(), quill_core::ErrorKind::Args);
    }

    #[test]
    fn test_range_builtin() {
        let range = invoke("range", &[Value::Int(3)]).unwrap();
        match &range {
            Value::Range(r) => {
                assert_eq!(r.start(), 0);
                assert_eq!(r.stop(), 3);
                assert_eq!(r.step(), 1);
            }
            other => panic!("expected range, got {other:?}"),
        }
        assert!(invoke("range", &[Value::Int(0), Value::Int(1), Value::Int(0)]).is_err());
    }

    #[test]
    fn test_assert_and_error() {
        assert_eq!(
            invoke("assert", &[Value::Bool(true)]).unwrap(),
            Value::Nil
        );
        let err = invoke("assert", &[Value::Bool(false)]).unwrap_err();
        assert_eq!(err.message(), "assertion failed");

        let value = invoke("error", &[Value::string("nope")]).unwrap();
        match value {
            Value::Error(err) => assert_eq!(err.message(), "nope"),
            other => panic!("expected error value, got {other:?}"),
        }
    }
}
