//! Closure values.

use crate::cell::Cell;
use quill_bytecode::Function;
use std::fmt;
use std::sync::Arc;

/// A bound callable: an immutable compiled [`Function`] template plus the
/// cells it captured from enclosing scopes.
#[derive(Debug, Clone)]
pub struct Closure {
    function: Arc<Function>,
    captures: Vec<Cell>,
}

impl Closure {
    /// Binds a function template to its captured cells.
    pub fn new(function: Arc<Function>, captures: Vec<Cell>) -> Self {
        Self { function, captures }
    }

    /// Returns the compiled template.
    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    /// Returns the captured cell at `index`.
    pub fn capture(&self, index: usize) -> Option<&Cell> {
        self.captures.get(index)
    }

    /// Returns the name used in error messages and traces.
    pub fn display_name(&self) -> &str {
        self.function.display_name()
    }
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let function = &self.function;
        let mut params: Vec<String> = function.params.clone();
        if let Some(rest) = &function.rest {
            params.push(format!("*{rest}"));
        }
        if function.name.is_empty() {
            write!(f, "func({})", params.join(", "))
        } else {
            write!(f, "func {}({})", function.name, params.join(", "))
        }
    }
}
