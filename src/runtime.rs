//! Long-lived runtime with persistent definitions.

use crate::options::Options;
use log::debug;
use parking_lot::Mutex;
use quill_bytecode::Code;
use quill_compiler::Compiler;
use quill_core::{Context, Result};
use quill_object::{Module, NativeFunction, Value};
use quill_syntax::parse_with_file;
use quill_vm::Machine;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A persistent evaluation environment: a compiler with a durable global
/// symbol table and a machine with a durable globals vector. Repeated
/// [`Runtime::eval`] calls see definitions from earlier ones, which is
/// the REPL contract.
pub struct Runtime {
    compiler: Compiler,
    machine: Machine,
    file: Option<String>,
    /// Number of globals installed by the host; everything past this in
    /// the global table was defined by evaluated scripts.
    host_globals: usize,
}

impl Runtime {
    /// Builds a runtime from an option set.
    pub fn new(options: &Options) -> Result<Self> {
        let globals = options.effective_globals()?;
        let compiler = Compiler::new(options.file().map(str::to_string));
        let mut machine = Machine::with_limits(Context::background(), options.limits());
        let table = compiler.symbol_table();
        debug!("runtime created with {} globals", globals.len());
        let host_globals = globals.len();
        for (name, value) in globals {
            let symbol = table.define(&name, false)?;
            machine.set_global(symbol.index as usize, value);
        }
        Ok(Self {
            compiler,
            machine,
            file: options.file().map(str::to_string),
            host_globals,
        })
    }

    fn decorate(&self, err: quill_core::Error) -> quill_core::Error {
        match &self.file {
            Some(file) => err.with_file(file),
            None => err,
        }
    }

    /// Parses and compiles source against the persistent symbol table.
    pub fn compile(&mut self, source: &str) -> Result<Arc<Code>> {
        let file = self.file.as_deref().map(Arc::from);
        let program = parse_with_file(source, file).map_err(|err| self.decorate(err))?;
        self.compiler.compile_program(&program)
    }

    /// Compiles and runs source, keeping its definitions for later calls.
    pub fn eval(&mut self, context: &Context, source: &str) -> Result<Value> {
        let code = self.compile(source)?;
        self.run(context, &code)
    }

    /// Executes already-compiled code against this runtime's globals.
    pub fn run(&mut self, context: &Context, code: &Arc<Code>) -> Result<Value> {
        self.machine.set_context(context.clone());
        self.machine.run(Arc::clone(code))
    }

    /// Wraps the runtime for sharing through [`crate::Options::with_vm`].
    pub fn into_shared(self) -> Arc<Mutex<Runtime>> {
        Arc::new(Mutex::new(self))
    }

    /// Invokes a callable using this runtime's globals.
    pub fn call(&mut self, context: &Context, callable: &Value, args: Vec<Value>) -> Result<Value> {
        self.machine.set_context(context.clone());
        self.machine.call_value(callable, args)
    }

    /// Reads a global by name, if it is defined.
    pub fn global(&self, name: &str) -> Option<Value> {
        let symbol = self.compiler.symbol_table().resolve(name)?;
        self.machine.global(symbol.index as usize).cloned()
    }

    /// Names and values defined by evaluated scripts, excluding the host
    /// environment the runtime started with.
    pub fn exports(&self) -> BTreeMap<String, Value> {
        self.compiler
            .symbol_table()
            .defined_names()
            .into_iter()
            .skip(self.host_globals)
            .filter_map(|name| {
                let value = self.global(&name)?;
                Some((name, value))
            })
            .collect()
    }

    /// Consumes the runtime, wrapping its script-defined globals as a
    /// module value. This is how hosts build modules from Quill source.
    ///
    /// Exported functions keep executing on the module's own machine, so
    /// they still see the module's globals.
    pub fn into_module(self, name: &str) -> Value {
        let exports = self.exports();
        let machine = Arc::new(Mutex::new(self.machine));
        let attrs: BTreeMap<String, Value> = exports
            .into_iter()
            .map(|(export_name, value)| {
                let wrapped = match &value {
                    Value::Closure(_) => {
                        let machine = Arc::clone(&machine);
                        let callable = value.clone();
                        Value::Native(Arc::new(NativeFunction::with_module(
                            name,
                            &export_name,
                            move |cx, args| {
                                let mut machine = machine.lock();
                                machine.set_context(cx.context().clone());
                                machine.call_value(&callable, args.to_vec())
                            },
                        )))
                    }
                    _ => value,
                };
                (export_name, wrapped)
            })
            .collect();
        Value::Module(Arc::new(Module::new(name, attrs)))
    }
}
