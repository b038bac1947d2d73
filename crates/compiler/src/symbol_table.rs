//! Lexically scoped symbol tables.
//!
//! Two kinds of child scope exist: *function* scopes, which isolate local
//! slot allocation and accumulate free-variable records, and *block*
//! scopes, which delegate slot allocation to their enclosing function.
//! Resolution classifies each reference as Global, Local, or Free and
//! hands out the stable index the bytecode uses.

use indexmap::IndexMap;
use quill_core::{Error, Result};
use std::cell::RefCell;
use std::rc::Rc;

/// The write-only sink name. Defining it allocates no slot; reading it is
/// an unresolved-name error.
pub const BLANK: &str = "_";

/// Classification of a resolved name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
    Free,
}

/// A resolved symbol: classification plus its stable index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: Scope,
    pub index: u16,
    pub constant: bool,
}

/// How a function obtains the cell for one of its free variables from its
/// immediate parent: either the parent's local slot or the parent's own
/// free-variable list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeRecord {
    pub name: String,
    pub origin_is_local: bool,
    pub origin_index: u16,
    pub constant: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Function,
    Block,
}

#[derive(Debug)]
struct Inner {
    parent: Option<SymbolTable>,
    kind: TableKind,
    symbols: IndexMap<String, Symbol>,
    free: Vec<FreeRecord>,
    /// Local (or global, at the root) slots claimed so far. Meaningful on
    /// function tables only; blocks delegate upward.
    num_slots: u16,
}

/// One scope in the lexical scope tree. Cheap to clone; clones share the
/// underlying table.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    inner: Rc<RefCell<Inner>>,
}

impl SymbolTable {
    /// Creates the root (global) table.
    pub fn new_root() -> Self {
        Self::new(None, TableKind::Function)
    }

    fn new(parent: Option<SymbolTable>, kind: TableKind) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                parent,
                kind,
                symbols: IndexMap::new(),
                free: Vec::new(),
                num_slots: 0,
            })),
        }
    }

    /// Opens a child function scope.
    pub fn push_function(&self) -> SymbolTable {
        Self::new(Some(self.clone()), TableKind::Function)
    }

    /// Opens a child block scope.
    pub fn push_block(&self) -> SymbolTable {
        Self::new(Some(self.clone()), TableKind::Block)
    }

    /// Returns the parent scope, if any.
    pub fn parent(&self) -> Option<SymbolTable> {
        self.inner.borrow().parent.clone()
    }

    fn is_function(&self) -> bool {
        self.inner.borrow().kind == TableKind::Function
    }

    fn is_root_function(&self) -> bool {
        let inner = self.inner.borrow();
        // The root of the chain is global even when reached through blocks.
        match &inner.parent {
            None => true,
            Some(parent) => inner.kind == TableKind::Block && parent.is_root_function(),
        }
    }

    /// The nearest enclosing function table (this table if it is one).
    fn owner_function(&self) -> SymbolTable {
        if self.is_function() {
            return self.clone();
        }
        self.parent()
            .expect("block scope always has a parent")
            .owner_function()
    }

    /// Number of slots claimed in the owning function. For the root this
    /// is the number of globals.
    pub fn slot_count(&self) -> usize {
        self.owner_function().inner.borrow().num_slots as usize
    }

    /// The free-variable records of the owning function, in capture order.
    pub fn free_records(&self) -> Vec<FreeRecord> {
        self.owner_function().inner.borrow().free.clone()
    }

    /// Names defined directly in this table, in slot-index order. On the
    /// root table this is the global name table.
    pub fn defined_names(&self) -> Vec<String> {
        self.inner.borrow().symbols.keys().cloned().collect()
    }

    /// Names visible from this scope, nearest first. Used for
    /// "did you mean?" suggestions.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut table = Some(self.clone());
        while let Some(current) = table {
            let inner = current.inner.borrow();
            for name in inner.symbols.keys() {
                if name != BLANK && !names.contains(name) {
                    names.push(name.clone());
                }
            }
            table = inner.parent.clone();
        }
        names
    }

    /// Defines `name` in this scope, claiming the next slot of the owning
    /// function. Redefinition in the same scope reuses the slot. The blank
    /// identifier allocates nothing.
    pub fn define(&self, name: &str, constant: bool) -> Result<Symbol> {
        if name == BLANK {
            return Ok(Symbol {
                name: BLANK.to_string(),
                scope: Scope::Local,
                index: u16::MAX,
                constant: false,
            });
        }

        let scope = if self.is_root_function() {
            Scope::Global
        } else {
            Scope::Local
        };

        let existing = self.inner.borrow().symbols.get(name).cloned();
        if let Some(existing) = existing {
            let recycled = Symbol { constant, ..existing };
            self.inner
                .borrow_mut()
                .symbols
                .insert(name.to_string(), recycled.clone());
            return Ok(recycled);
        }

        let owner = self.owner_function();
        let index = {
            let mut owner_inner = owner.inner.borrow_mut();
            let index = owner_inner.num_slots;
            owner_inner.num_slots = owner_inner.num_slots.checked_add(1).ok_or_else(|| {
                Error::syntax(format!("too many variables in scope (at {name:?})"))
            })?;
            index
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index,
            constant,
        };
        self.inner
            .borrow_mut()
            .symbols
            .insert(name.to_string(), symbol.clone());
        Ok(symbol)
    }

    /// Resolves a reference to `name` from this scope.
    ///
    /// Walks block ancestors of the same function first (Local/Global),
    /// then enclosing functions; crossing a function boundary records a
    /// free-variable capture in each intervening function.
    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        if name == BLANK {
            return None;
        }

        // Same-function lookup: this scope and its block ancestors.
        let mut table = self.clone();
        loop {
            if let Some(symbol) = table.inner.borrow().symbols.get(name) {
                return Some(symbol.clone());
            }
            if table.is_function() {
                break;
            }
            let parent = table.parent().expect("block scope always has a parent");
            table = parent;
        }

        // `table` is now the owning function. Resolve upward and classify.
        let parent = table.parent()?;
        let outer = parent.resolve(name)?;
        match outer.scope {
            Scope::Global => Some(outer),
            Scope::Local => Some(table.define_free(name, true, outer.index, outer.constant)),
            Scope::Free => Some(table.define_free(name, false, outer.index, outer.constant)),
        }
    }

    fn define_free(
        &self,
        name: &str,
        origin_is_local: bool,
        origin_index: u16,
        constant: bool,
    ) -> Symbol {
        let mut inner = self.inner.borrow_mut();
        let index = match inner.free.iter().position(|record| record.name == name) {
            Some(existing) => existing as u16,
            None => {
                inner.free.push(FreeRecord {
                    name: name.to_string(),
                    origin_is_local,
                    origin_index,
                    constant,
                });
                (inner.free.len() - 1) as u16
            }
        };
        Symbol {
            name: name.to_string(),
            scope: Scope::Free,
            index,
            constant,
        }
    }
}
