//! The `rand` host module.

use quill_core::{Error, Result};
use quill_interop::{wrap_fn0, wrap_fn1};
use quill_object::{Module, NativeFunction, Value};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) fn module() -> Module {
    let mut attrs = BTreeMap::new();
    let mut add = |native: NativeFunction| {
        attrs.insert(native.name().to_string(), Value::Native(Arc::new(native)));
    };

    add(wrap_fn0("float", |_cx| {
        Ok(rand::thread_rng().gen::<f64>())
    }));
    add(wrap_fn1("int", |_cx, bound: i64| {
        if bound <= 0 {
            return Err(Error::value(format!("bound must be positive, got {bound}")));
        }
        Ok(rand::thread_rng().gen_range(0..bound))
    }));
    add(wrap_fn1("shuffle", |_cx, value: Value| match value {
        Value::List(ref items) => {
            items.write().shuffle(&mut rand::thread_rng());
            Ok(value.clone())
        }
        other => Err(Error::type_error(format!(
            "shuffle: expected list, got {}",
            other.type_name()
        ))),
    }));

    Module::new("rand", attrs)
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
    fn test_int_bounds() {
        for _ in 0..32 {
            match invoke("int", &[Value::Int(10)]).unwrap() {
                Value::Int(i) => assert!((0..10).contains(&i)),
                other => panic!("expected int, got {other:?}"),
            }
        }
        assert!(invoke("int", &[Value::Int(0)]).is_err());
    }

    #[test]
    fn test_shuffle_preserves_contents() {
        let list = Value::list((0..16).map(Value::Int).collect());
        let shuffled = invoke("shuffle", &[list.clone()]).unwrap();
        assert_eq!(list, shuffled);
        if let Value::List(items) = &list {
            let mut sorted: Vec<i64> = items
                .read()
                .iter()
                .map(|v| v.as_int().unwrap())
                .collect();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..16).collect::<Vec<i64>>());
        }
    }
}
