//! Call frames.

use quill_bytecode::Code;
use quill_object::{Closure, Value};
use std::sync::Arc;

/// One activation record on the machine's call stack.
#[derive(Debug)]
pub struct Frame {
    /// The closure being executed; `None` for the root frame.
    closure: Option<Arc<Closure>>,

    /// The code the instruction pointer walks.
    code: Arc<Code>,

    /// Next instruction word to execute.
    pub ip: usize,

    /// First word of the instruction currently executing; errors resolve
    /// their source position through it.
    pub last_pc: usize,

    /// Local slots, Nil-initialized. A slot holding a cell is read and
    /// written through the cell.
    pub locals: Vec<Value>,

    /// Data-stack height when the frame was pushed; teardown truncates
    /// back to it.
    pub stack_base: usize,
}

impl Frame {
    /// Builds the root frame for a compiled program.
    pub fn root(code: Arc<Code>, stack_base: usize) -> Self {
        let local_count = code.local_count;
        Self {
            closure: None,
            code,
            ip: 0,
            last_pc: 0,
            locals: vec![Value::Nil; local_count],
            stack_base,
        }
    }

    /// Builds a frame for a closure call. `locals` must already hold the
    /// bound arguments.
    pub fn call(closure: Arc<Closure>, locals: Vec<Value>, stack_base: usize) -> Self {
        let code = Arc::clone(&closure.function().code);
        Self {
            closure: Some(closure),
            code,
            ip: 0,
            last_pc: 0,
            locals,
            stack_base,
        }
    }

    /// The code this frame executes.
    pub fn code(&self) -> &Arc<Code> {
        &self.code
    }

    /// The closure this frame belongs to, if any.
    pub fn closure(&self) -> Option<&Arc<Closure>> {
        self.closure.as_ref()
    }

    /// Name used in stack traces.
    pub fn function_name(&self) -> &str {
        &self.code.name
    }
}
