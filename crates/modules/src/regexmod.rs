//! The `regex` host module.
//!
//! Functions take pattern strings; there is no first-class regex value.
//! Patterns compile per call, so an invalid pattern reports a value error
//! at the call site.

use quill_core::{Error, Result};
use quill_interop::{wrap_fn2, wrap_fn3};
use quill_object::{Module, NativeFunction, Value};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| Error::value(format!("invalid regex: {err}")))
}

pub(crate) fn module() -> Module {
    let mut attrs = BTreeMap::new();
    let mut add = |native: NativeFunction| {
        attrs.insert(native.name().to_string(), Value::Native(Arc::new(native)));
    };

    add(wrap_fn2("is_match", |_cx, pattern: String, text: String| {
        Ok(compile(&pattern)?.is_match(&text))
    }));
    add(wrap_fn2("find", |_cx, pattern: String, text: String| {
        Ok(compile(&pattern)?
            .find(&text)
            .map(|m| Value::string(m.as_str().to_string()))
            .unwrap_or(Value::Nil))
    }));
    add(wrap_fn2("find_all", |_cx, pattern: String, text: String| {
        let matches: Vec<String> = compile(&pattern)?
            .find_iter(&text)
            .map(|m| m.as_str().to_string())
            .collect();
        Ok(matches)
    }));
    add(wrap_fn3(
        "replace_all",
        |_cx, pattern: String, text: String, replacement: String| {
            Ok(compile(&pattern)?
                .replace_all(&text, replacement.as_str())
                .into_owned())
        },
    ));
    add(wrap_fn2("split", |_cx, pattern: String, text: String| {
        let parts: Vec<String> = compile(&pattern)?
            .split(&text)
            .map(str::to_string)
            .collect();
        Ok(parts)
    }));

    Module::new("regex", attrs)
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
    fn test_match_and_find() {
        assert_eq!(
            invoke(
                "is_match",
                &[Value::string(r"\d+"), Value::string("abc 123")]
            )
            .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            invoke("find", &[Value::string(r"\d+"), Value::string("abc 123")]).unwrap(),
            Value::string("123")
        );
        assert_eq!(
            invoke("find", &[Value::string(r"\d+"), Value::string("abc")]).unwrap(),
            Value::Nil
        );
    }

    #[test]
    fn test_replace_and_split() {
        assert_eq!(
            invoke(
                "replace_all",
                &[
                    Value::string(r"\s+"),
                    Value::string("a  b\tc"),
                    Value::string("-")
                ]
            )
            .unwrap(),
            Value::string("a-b-c")
        );
        assert_eq!(
            invoke(
                "split",
                &[Value::string(r",\s*"), Value::string("a, b,c")]
            )
            .unwrap(),
            Value::list(vec![
                Value::string("a"),
                Value::string("b"),
                Value::string("c")
            ])
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let err = invoke(
            "is_match",
            &[Value::string("("), Value::string("x")],
        )
        .unwrap_err();
        assert_eq!(err.kind(), quill_core::ErrorKind::Value);
    }
}
