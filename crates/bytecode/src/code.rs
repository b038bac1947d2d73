//! Compiled code objects.
//!
//! A [`Code`] bundles an instruction word stream with its constant pool,
//! name pool, sub-function pool, symbol metadata, and a source line table.
//! A [`Function`] is the immutable template a closure binds captured cells
//! to. Both are immutable after compilation and may be executed by multiple
//! VMs in parallel.

use crate::opcode::Opcode;
use quill_core::Position;
use std::fmt;
use std::sync::Arc;

/// An immutable literal held in a `Code` object's constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Nil => write!(f, "nil"),
            Constant::Bool(b) => write!(f, "{b}"),
            Constant::Int(i) => write!(f, "{i}"),
            Constant::Float(x) => write!(f, "{x}"),
            Constant::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// One entry of the pc → source position mapping.
///
/// Entries are stored in increasing pc order; the position of a pc is the
/// entry with the greatest `pc` not exceeding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    /// First instruction word covered by this entry.
    pub pc: u32,

    /// Source position of the construct that produced the instructions.
    pub position: Position,
}

/// A compiled function template: parameters, defaults, optional rest
/// parameter, and the body's code. Closures pair a template with captured
/// cells.
#[derive(Debug, Clone)]
pub struct Function {
    /// Function name, empty for anonymous literals.
    pub name: String,

    /// Parameter names in declaration order.
    pub params: Vec<String>,

    /// Default values, aligned with the tail of `params`.
    pub defaults: Vec<Constant>,

    /// Rest-parameter name, when declared.
    pub rest: Option<String>,

    /// The compiled body.
    pub code: Arc<Code>,
}

impl Function {
    /// Returns the name used in error messages and traces.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "<anonymous>"
        } else {
            &self.name
        }
    }

    /// Number of parameters that must be supplied by the caller.
    pub fn required_params(&self) -> usize {
        self.params.len() - self.defaults.len()
    }
}

/// A compiled unit: instruction stream plus the pools it indexes into.
#[derive(Debug, Clone, Default)]
pub struct Code {
    /// Name of the unit (function name, or `<main>` for a program).
    pub name: String,

    /// Source file name, when known.
    pub file: Option<String>,

    /// The instruction word stream.
    pub instructions: Vec<u16>,

    /// Constants referenced by `LoadConst`.
    pub constants: Vec<Constant>,

    /// Names referenced by `LoadAttr`/`StoreAttr` and friends.
    pub names: Vec<String>,

    /// Sub-functions referenced by `LoadClosure`.
    pub functions: Vec<Arc<Function>>,

    /// Number of local slots a frame executing this code needs.
    pub local_count: usize,

    /// Names of the free variables this code captures, in capture order.
    pub free_names: Vec<String>,

    /// Global name table. Populated only on root code objects; globals of
    /// nested functions resolve through the root.
    pub global_names: Vec<String>,

    /// pc → source position mapping, in increasing pc order.
    pub lines: Vec<LineEntry>,
}

impl Code {
    /// Looks up the source position covering `pc`.
    pub fn position_at(&self, pc: usize) -> Option<Position> {
        let pc = pc as u32;
        match self.lines.binary_search_by_key(&pc, |entry| entry.pc) {
            Ok(i) => Some(self.lines[i].position.clone()),
            Err(0) => None,
            Err(i) => Some(self.lines[i - 1].position.clone()),
        }
    }

    /// Decodes the opcode at `pc`, with bounds and validity checks.
    pub fn opcode_at(&self, pc: usize) -> Option<Opcode> {
        self.instructions
            .get(pc)
            .copied()
            .and_then(Opcode::from_word)
    }

    /// Returns true when the stream is empty.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
