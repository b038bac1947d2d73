//! The `math` host module.

use quill_core::{Error, Result};
use quill_interop::{wrap_fn1, wrap_fn2, wrap_variadic};
use quill_object::{compare_values, Module, NativeFunction, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) fn module() -> Module {
    let mut attrs = BTreeMap::new();
    let mut add = |native: NativeFunction| {
        attrs.insert(native.name().to_string(), Value::Native(Arc::new(native)));
    };

    add(wrap_fn1("abs", |_cx, x: Value| match x {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| Error::value("integer overflow in abs")),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Byte(b) => Ok(Value::Byte(b)),
        other => Err(Error::type_error(format!(
            "abs: expected number, got {}",
            other.type_name()
        ))),
    }));
    add(wrap_fn1("ceil", |_cx, x: f64| Ok(x.ceil())));
    add(wrap_fn1("floor", |_cx, x: f64| Ok(x.floor())));
    add(wrap_fn1("sqrt", |_cx, x: f64| {
        if x < 0.0 {
            return Err(Error::value("sqrt of a negative number"));
        }
        Ok(x.sqrt())
    }));
    add(wrap_fn2("pow", |_cx, base: f64, exp: f64| Ok(base.powf(exp))));
    add(wrap_variadic("min", |_cx, args| extreme("min", args, Ordering::Less)));
    add(wrap_variadic("max", |_cx, args| extreme("max", args, Ordering::Greater)));

    attrs.insert("pi".to_string(), Value::Float(std::f64::consts::PI));
    attrs.insert("e".to_string(), Value::Float(std::f64::consts::E));
    attrs.insert("inf".to_string(), Value::Float(f64::INFINITY));

    Module::new("math", attrs)
}

fn extreme(name: &str, args: &[Value], keep: Ordering) -> Result<Value> {
    if args.is_empty() {
        return Err(Error::args(format!(
            "{name}: expected at least 1 argument, got 0"
        )));
    }
    let mut best = args[0].clone();
    for candidate in &args[1..] {
        if compare_values(candidate, &best)? == keep {
            best = candidate.clone();
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::Context;
    use quill_object::CallContext;

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
        let module = module();
        match module.get(name) {
            Some(Value::Native(native)) => {
                native.invoke(&mut NoCalls(Context::background()), args)
            }
            _ => panic!("no function {name}"),
        }
    }

    #[test]
    fn test_basics() {
        assert_eq!(invoke("abs", &[Value::Int(-4)]).unwrap(), Value::Int(4));
        assert_eq!(
            invoke("sqrt", &[Value::Float(9.0)]).unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(
            invoke("floor", &[Value::Float(2.7)]).unwrap(),
            Value::Float(2.0)
        );
        assert!(invoke("sqrt", &[Value::Float(-1.0)]).is_err());
    }

    #[test]
    fn test_min_max() {
        assert_eq!(
            invoke("min", &[Value::Int(3), Value::Float(1.5), Value::Int(2)]).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            invoke("max", &[Value::Int(3), Value::Int(7)]).unwrap(),
            Value::Int(7)
        );
        assert!(invoke("min", &[]).is_err());
    }

    #[test]
    fn test_constants() {
        assert_eq!(
            module().get("pi"),
            Some(Value::Float(std::f64::consts::PI))
        );
    }
}
