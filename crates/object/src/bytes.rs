//! Bytes methods.

use crate::attr::method;
use crate::native::{require_args, CallContext};
use crate::value::Value;
use quill_core::{Error, Result};

pub(crate) fn attr(receiver: &Value, name: &str) -> Option<Value> {
    match name {
        "contains" => Some(method(receiver, "contains", contains)),
        "index" => Some(method(receiver, "index", index)),
        "to_string" => Some(method(receiver, "to_string", to_string)),
        _ => None,
    }
}

fn payload(receiver: &Value) -> &crate::value::BytesRef {
    match receiver {
        Value::Bytes(bytes) => bytes,
        _ => unreachable!("bytes method bound to non-bytes receiver"),
    }
}

fn byte_arg(name: &str, arg: &Value) -> Result<u8> {
    match arg {
        Value::Byte(b) => Ok(*b),
        Value::Int(i) => u8::try_from(*i)
            .map_err(|_| Error::value(format!("{name}: byte value out of range: {i}"))),
        other => Err(Error::type_error(format!(
            "{name}: expected byte or int, got {}",
            other.type_name()
        ))),
    }
}

fn contains(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("contains", args, 1)?;
    let byte = byte_arg("contains", &args[0])?;
    Ok(Value::Bool(payload(receiver).read().contains(&byte)))
}

fn index(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("index", args, 1)?;
    let byte = byte_arg("index", &args[0])?;
    let position = payload(receiver)
        .read()
        .iter()
        .position(|&b| b == byte)
        .map(|i| i as i64)
        .unwrap_or(-1);
    Ok(Value::Int(position))
}

fn to_string(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("to_string", args, 0)?;
    let bytes = payload(receiver).read().clone();
    String::from_utf8(bytes)
        .map(Value::string)
        .map_err(|_| Error::value("invalid UTF-8 in bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::get_attr;
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

    fn invoke(receiver: &Value, name: &str, args: &[Value]) -> Result<Value> {
        let bound = get_attr(receiver, name).expect("method exists");
        match bound {
            Value::Native(native) => native.invoke(&mut NoCalls(Context::background()), args),
            _ => panic!("expected bound method"),
        }
    }

    #[test]
    fn test_contains_and_index() {
        let bytes = Value::bytes(vec![1, 2, 3]);
        assert_eq!(
            invoke(&bytes, "contains", &[Value::Int(2)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            invoke(&bytes, "index", &[Value::Byte(3)]).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            invoke(&bytes, "index", &[Value::Int(9)]).unwrap(),
            Value::Int(-1)
        );
    }

    #[test]
    fn test_to_string() {
        let bytes = Value::bytes(b"hello".to_vec());
        assert_eq!(
            invoke(&bytes, "to_string", &[]).unwrap(),
            Value::string("hello")
        );

        let invalid = Value::bytes(vec![0xff, 0xfe]);
        assert!(invoke(&invalid, "to_string", &[]).is_err());
    }
}
