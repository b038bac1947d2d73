//! Native (host-provided) callables.
//!
//! A [`NativeFunction`] wraps a Rust function as a first-class script
//! value. Implementations receive a [`CallContext`], which carries the
//! cancellation context and lets natives invoke script callables — the
//! re-entrancy that `list.map` and host callbacks rely on.

use crate::value::Value;
use quill_core::{Context, Error, Result};
use std::fmt;

/// The calling surface natives see. Implemented by the VM and by the
/// host-side invoker, so native code can run callables from either side.
pub trait CallContext {
    /// The cancellation context of the current evaluation.
    fn context(&self) -> &Context;

    /// Invokes a callable value with the given arguments.
    fn call(&mut self, callable: &Value, args: Vec<Value>) -> Result<Value>;
}

type NativeImpl = dyn Fn(&mut dyn CallContext, &[Value]) -> Result<Value> + Send + Sync;

/// A host function exposed to scripts, with a display name and an optional
/// owning module.
pub struct NativeFunction {
    name: String,
    module: Option<String>,
    func: Box<NativeImpl>,
}

impl NativeFunction {
    /// Wraps a function under the given display name.
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut dyn CallContext, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            module: None,
            func: Box::new(func),
        }
    }

    /// Wraps a function owned by a module; the module name prefixes the
    /// display name in errors.
    pub fn with_module<F>(module: &str, name: &str, func: F) -> Self
    where
        F: Fn(&mut dyn CallContext, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            module: Some(module.to_string()),
            func: Box::new(func),
        }
    }

    /// Returns the bare function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the module-qualified name used in error messages.
    pub fn display_name(&self) -> String {
        match &self.module {
            Some(module) => format!("{module}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Invokes the wrapped function.
    pub fn invoke(&self, cx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
        (self.func)(cx, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.display_name())
            .finish()
    }
}

/// Fails with an args error unless exactly `count` arguments were passed.
pub fn require_args(name: &str, args: &[Value], count: usize) -> Result<()> {
    if args.len() != count {
        let plural = if count == 1 { "" } else { "s" };
        return Err(Error::args(format!(
            "{name}: expected {count} argument{plural}, got {}",
            args.len()
        )));
    }
    Ok(())
}

/// Fails with an args error unless between `min` and `max` arguments were
/// passed.
pub fn require_args_range(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min {
        return Err(Error::args(format!(
            "{name}: expected at least {min} argument{}, got {}",
            if min == 1 { "" } else { "s" },
            args.len()
        )));
    }
    if args.len() > max {
        return Err(Error::args(format!(
            "{name}: expected at most {max} argument{}, got {}",
            if max == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
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
            Err(Error::runtime("no nested calls in this test"))
        }
    }

    #[test]
    fn test_invoke() {
        let double = NativeFunction::new("double", |_cx, args| {
            require_args("double", args, 1)?;
            Ok(Value::Int(args[0].as_int()? * 2))
        });
        let mut cx = NoCalls(Context::background());
        let result = double.invoke(&mut cx, &[Value::Int(21)]).unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn test_arity_error_names_callable() {
        let f = NativeFunction::new("fn", |_cx, args| {
            require_args("fn", args, 2)?;
            Ok(Value::Nil)
        });
        let mut cx = NoCalls(Context::background());
        let err = f.invoke(&mut cx, &[Value::Int(1)]).unwrap_err();
        assert_eq!(err.to_string(), "args: fn: expected 2 arguments, got 1");
    }

    #[test]
    fn test_display_name_with_module() {
        let f = NativeFunction::with_module("strings", "to_upper", |_cx, _args| Ok(Value::Nil));
        assert_eq!(f.display_name(), "strings.to_upper");
    }

    #[test]
    fn test_require_args_range() {
        let args = [Value::Int(1), Value::Int(2), Value::Int(3)];
        assert!(require_args_range("f", &args, 1, 3).is_ok());
        let err = require_args_range("f", &args, 1, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "args: f: expected at most 2 arguments, got 3"
        );
    }
}
