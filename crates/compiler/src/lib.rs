//! Bytecode compiler for Quill.
//!
//! Translates the AST into [`quill_bytecode::Code`] objects, resolving
//! every name through the symbol table to a global, local, or free slot,
//! and lowering control flow, operators, closures, and exception handling
//! to the fixed opcode set.

mod compiler;
mod suggest;
mod symbol_table;

pub use compiler::Compiler;
pub use symbol_table::{FreeRecord, Scope, Symbol, SymbolTable};

use quill_core::Result;
use quill_syntax::Program;
use std::sync::Arc;

/// Compiles a parsed program with a fresh global scope.
pub fn compile(program: &Program) -> Result<Arc<quill_bytecode::Code>> {
    Compiler::new(None).compile_program(program)
}
