//! Closure capture cells.
//!
//! A cell is a heap-allocated single-slot box shared by every closure that
//! captured the same binding, and by the enclosing frame while it is still
//! live. Sharing is by reference: a write through any holder is observed
//! by all of them. Cells are a VM implementation detail and are never
//! observable as first-class script values.

use crate::value::Value;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A shared mutable slot holding one value.
#[derive(Clone, Default)]
pub struct Cell {
    slot: Arc<RwLock<Value>>,
}

impl Cell {
    /// Creates a cell holding `value`.
    pub fn new(value: Value) -> Self {
        Self {
            slot: Arc::new(RwLock::new(value)),
        }
    }

    /// Reads the current value.
    pub fn get(&self) -> Value {
        self.slot.read().clone()
    }

    /// Replaces the value; all sharers observe the write.
    pub fn set(&self, value: Value) {
        *self.slot.write() = value;
    }

    /// Returns true when both cells are the same allocation.
    pub fn ptr_eq(&self, other: &Cell) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell({:?})", self.slot.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_writes() {
        let a = Cell::new(Value::Int(0));
        let b = a.clone();
        b.set(Value::Int(42));
        assert_eq!(a.get(), Value::Int(42));
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_distinct_cells() {
        let a = Cell::new(Value::Int(1));
        let b = Cell::new(Value::Int(1));
        assert!(!a.ptr_eq(&b));
        a.set(Value::Int(2));
        assert_eq!(b.get(), Value::Int(1));
    }
}
