//! Quill: an embeddable scripting language with a bytecode compiler and a
//! stack-based virtual machine.
//!
//! The host supplies a [`Context`], a set of globals, and source text; the
//! runtime parses, compiles, and evaluates it, returning a [`Value`], a
//! structured [`Error`], or a callable the host may invoke later.
//!
//! ```
//! use quill::{eval, Context, Options, Value};
//!
//! let result = eval(&Context::background(), "1 + 1", &Options::default()).unwrap();
//! assert_eq!(result, Value::Int(2));
//! ```
//!
//! For REPL-style embedding, a [`Runtime`] keeps definitions alive across
//! evaluations. For hot paths, [`compile`] once and [`run`] the compiled
//! code with per-call globals.

mod options;
mod runtime;

pub use options::Options;
pub use runtime::Runtime;

pub use quill_bytecode::Code;
pub use quill_core::{Context, Error, ErrorKind, Limits, Result};
pub use quill_interop::{FromValue, ToValue};
pub use quill_modules::default_globals;
pub use quill_object::{CallContext, NativeFunction, Value};

use log::debug;
use quill_vm::Machine;
use std::sync::Arc;

/// Parses and compiles source text against the option set's globals, or
/// against the shared runtime when one is passed via [`Options::with_vm`].
pub fn compile(source: &str, options: &Options) -> Result<Arc<Code>> {
    if let Some(vm) = options.vm() {
        return vm.lock().compile(source);
    }
    Runtime::new(options)?.compile(source)
}

/// Compiles and runs source text in one step. With [`Options::with_vm`],
/// the evaluation runs on the shared runtime and its definitions persist
/// for later calls.
pub fn eval(context: &Context, source: &str, options: &Options) -> Result<Value> {
    if let Some(vm) = options.vm() {
        return vm.lock().eval(context, source);
    }
    Runtime::new(options)?.eval(context, source)
}

/// Executes already-compiled code. Globals resolve by name through the
/// code's global name table, so the same options used for [`compile`]
/// reproduce the same environment; with [`Options::with_vm`], the code
/// runs against the shared runtime's globals instead.
pub fn run(context: &Context, code: &Arc<Code>, options: &Options) -> Result<Value> {
    if let Some(vm) = options.vm() {
        return vm.lock().run(context, code);
    }
    let globals = options.effective_globals()?;
    let mut machine = Machine::with_limits(context.clone(), options.limits());
    for (index, name) in code.global_names.iter().enumerate() {
        if let Some(value) = globals.get(name) {
            machine.set_global(index, value.clone());
        }
    }
    debug!("run {} with {} globals", code.name, code.global_names.len());
    machine.run(Arc::clone(code))
}

/// Invokes a callable value from the host with the given arguments.
/// Re-entrant: the callable may itself call natives that call back in.
pub fn call(context: &Context, callable: &Value, args: Vec<Value>) -> Result<Value> {
    Machine::new(context.clone()).call_value(callable, args)
}
