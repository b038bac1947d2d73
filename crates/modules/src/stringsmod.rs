//! The `strings` host module: function forms of the string methods, so
//! they compose in pipe expressions.

use quill_core::{Error, Result};
use quill_interop::{wrap_fn1, wrap_fn2, wrap_fn3};
use quill_object::{Module, NativeFunction, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) fn module() -> Module {
    let mut attrs = BTreeMap::new();
    let mut add = |native: NativeFunction| {
        attrs.insert(native.name().to_string(), Value::Native(Arc::new(native)));
    };

    add(wrap_fn1("to_upper", |_cx, s: String| Ok(s.to_uppercase())));
    add(wrap_fn1("to_lower", |_cx, s: String| Ok(s.to_lowercase())));
    add(wrap_fn1("trim", |_cx, s: String| Ok(s.trim().to_string())));
    add(wrap_fn1("fields", |_cx, s: String| {
        Ok(s.split_whitespace()
            .map(str::to_string)
            .collect::<Vec<String>>())
    }));
    add(wrap_fn2("contains", |_cx, s: String, sub: String| {
        Ok(s.contains(&sub))
    }));
    add(wrap_fn2("has_prefix", |_cx, s: String, prefix: String| {
        Ok(s.starts_with(&prefix))
    }));
    add(wrap_fn2("has_suffix", |_cx, s: String, suffix: String| {
        Ok(s.ends_with(&suffix))
    }));
    add(wrap_fn2("split", |_cx, s: String, sep: String| {
        let parts: Vec<String> = if sep.is_empty() {
            s.chars().map(|c| c.to_string()).collect()
        } else {
            s.split(&sep).map(str::to_string).collect()
        };
        Ok(parts)
    }));
    add(wrap_fn2("join", |_cx, items: Vec<Value>, sep: String| {
        let parts: Vec<String> = items.iter().map(Value::to_string).collect();
        Ok(parts.join(&sep))
    }));
    add(wrap_fn2("repeat", |_cx, s: String, count: i64| {
        if count < 0 {
            return Err(Error::value("negative repeat count"));
        }
        Ok(s.repeat(count as usize))
    }));
    add(wrap_fn3(
        "replace",
        |_cx, s: String, old: String, new: String| Ok(s.replace(&old, &new)),
    ));

    Module::new("strings", attrs)
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
    fn test_function_forms() {
        assert_eq!(
            invoke("to_upper", &[Value::string("quill")]).unwrap(),
            Value::string("QUILL")
        );
        assert_eq!(
            invoke(
                "join",
                &[
                    Value::list(vec![Value::string("a"), Value::Int(1)]),
                    Value::string("-")
                ]
            )
            .unwrap(),
            Value::string("a-1")
        );
        assert_eq!(
            invoke("repeat", &[Value::string("ab"), Value::Int(2)]).unwrap(),
            Value::string("abab")
        );
        assert!(invoke("repeat", &[Value::string("ab"), Value::Int(-1)]).is_err());
    }
}
