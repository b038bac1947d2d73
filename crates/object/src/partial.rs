//! Partial application values.

use crate::value::Value;
use std::fmt;

/// A callable together with a pre-bound argument prefix. Calling a partial
/// concatenates the bound prefix with the supplied arguments and invokes
/// the underlying callable.
#[derive(Debug, Clone)]
pub struct Partial {
    callable: Value,
    bound: Vec<Value>,
}

impl Partial {
    /// Binds `bound` as the argument prefix of `callable`.
    pub fn new(callable: Value, bound: Vec<Value>) -> Self {
        Self { callable, bound }
    }

    /// Returns the underlying callable.
    pub fn callable(&self) -> &Value {
        &self.callable
    }

    /// Returns the pre-bound argument prefix.
    pub fn bound(&self) -> &[Value] {
        &self.bound
    }

    /// Concatenates the bound prefix with `args`.
    pub fn merged_args(&self, args: Vec<Value>) -> Vec<Value> {
        let mut merged = Vec::with_capacity(self.bound.len() + args.len());
        merged.extend(self.bound.iter().cloned());
        merged.extend(args);
        merged
    }
}

impl fmt::Display for Partial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "partial({}, {} bound)",
            self.callable.inspect(),
            self.bound.len()
        )
    }
}
