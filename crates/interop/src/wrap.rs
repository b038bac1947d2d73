//! Typed native-function wrappers.
//!
//! These adapt plain Rust functions into [`NativeFunction`] values:
//! arguments convert through [`FromValue`], results through [`ToValue`],
//! arity mismatches surface as `args` errors naming the callable, and a
//! panic guard converts host panics into `runtime` errors.

use crate::convert::{FromValue, ToValue};
use quill_core::{Context, Error, Result};
use quill_object::{require_args, CallContext, NativeFunction, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic".to_string()
    }
}

fn guard<T>(name: &str, body: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => Err(Error::runtime(format!(
            "panic in {name}: {}",
            panic_message(payload)
        ))),
    }
}

fn arg<T: FromValue>(name: &str, args: &[Value], index: usize) -> Result<T> {
    T::from_value(&args[index]).map_err(|err| {
        Error::args(format!(
            "{name}: invalid argument {}: {}",
            index + 1,
            err.message()
        ))
    })
}

/// Wraps a zero-argument function.
pub fn wrap_fn0<R, F>(name: &'static str, f: F) -> NativeFunction
where
    R: ToValue,
    F: Fn(&Context) -> Result<R> + Send + Sync + 'static,
{
    NativeFunction::new(name, move |cx: &mut dyn CallContext, args: &[Value]| {
        require_args(name, args, 0)?;
        guard(name, || f(cx.context())?.to_value())
    })
}

/// Wraps a one-argument function.
pub fn wrap_fn1<A, R, F>(name: &'static str, f: F) -> NativeFunction
where
    A: FromValue,
    R: ToValue,
    F: Fn(&Context, A) -> Result<R> + Send + Sync + 'static,
{
    NativeFunction::new(name, move |cx: &mut dyn CallContext, args: &[Value]| {
        require_args(name, args, 1)?;
        let a = arg::<A>(name, args, 0)?;
        guard(name, || f(cx.context(), a)?.to_value())
    })
}

/// Wraps a two-argument function.
pub fn wrap_fn2<A, B, R, F>(name: &'static str, f: F) -> NativeFunction
where
    A: FromValue,
    B: FromValue,
    R: ToValue,
    F: Fn(&Context, A, B) -> Result<R> + Send + Sync + 'static,
{
    NativeFunction::new(name, move |cx: &mut dyn CallContext, args: &[Value]| {
        require_args(name, args, 2)?;
        let a = arg::<A>(name, args, 0)?;
        let b = arg::<B>(name, args, 1)?;
        guard(name, || f(cx.context(), a, b)?.to_value())
    })
}

/// Wraps a three-argument function.
pub fn wrap_fn3<A, B, C, R, F>(name: &'static str, f: F) -> NativeFunction
where
    A: FromValue,
    B: FromValue,
    C: FromValue,
    R: ToValue,
    F: Fn(&Context, A, B, C) -> Result<R> + Send + Sync + 'static,
{
    NativeFunction::new(name, move |cx: &mut dyn CallContext, args: &[Value]| {
        require_args(name, args, 3)?;
        let a = arg::<A>(name, args, 0)?;
        let b = arg::<B>(name, args, 1)?;
        let c = arg::<C>(name, args, 2)?;
        guard(name, || f(cx.context(), a, b, c)?.to_value())
    })
}

/// Wraps a variadic function that works with raw values and may call back
/// into the runtime.
pub fn wrap_variadic<F>(name: &'static str, f: F) -> NativeFunction
where
    F: Fn(&mut dyn CallContext, &[Value]) -> Result<Value> + Send + Sync + 'static,
{
    NativeFunction::new(name, move |cx: &mut dyn CallContext, args: &[Value]| {
        guard(name, || f(cx, args))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoCalls(Context);

    impl CallContext for NoCalls {
        fn context(&self) -> &Context {
            &self.0
        }

        fn call(&mut self, _callable: &Value, _args: Vec<Value>) -> Result<Value> {
            Err(Error::runtime("no calls"))
        }
    }

    fn invoke(native: &NativeFunction, args: &[Value]) -> Result<Value> {
        native.invoke(&mut NoCalls(Context::background()), args)
    }

    #[test]
    fn test_typed_wrapper() {
        let add = wrap_fn2("add", |_cx, a: i64, b: i64| Ok(a + b));
        assert_eq!(
            invoke(&add, &[Value::Int(40), Value::Int(2)]).unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn test_arity_error_names_callable() {
        let add = wrap_fn2("add", |_cx, a: i64, b: i64| Ok(a + b));
        let err = invoke(&add, &[Value::Int(1)]).unwrap_err();
        assert_eq!(err.to_string(), "args: add: expected 2 arguments, got 1");
    }

    #[test]
    fn test_argument_conversion_error() {
        let shout = wrap_fn1("shout", |_cx, s: String| Ok(s.to_uppercase()));
        let err = invoke(&shout, &[Value::Int(3)]).unwrap_err();
        assert_eq!(err.kind(), quill_core::ErrorKind::Args);
        assert_eq!(
            err.message(),
            "shout: invalid argument 1: expected string, got int"
        );
    }

    #[test]
    fn test_panic_guard() {
        let boom = wrap_fn0("boom", |_cx| -> Result<i64> { panic!("exploded") });
        let err = invoke(&boom, &[]).unwrap_err();
        assert_eq!(err.kind(), quill_core::ErrorKind::Runtime);
        assert_eq!(err.message(), "panic in boom: exploded");
    }

    #[test]
    fn test_variadic_wrapper() {
        let count = wrap_variadic("count", |_cx, args| Ok(Value::Int(args.len() as i64)));
        assert_eq!(
            invoke(&count, &[Value::Nil, Value::Nil, Value::Nil]).unwrap(),
            Value::Int(3)
        );
    }
}
