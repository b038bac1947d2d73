//! The tagged value type and its universal operations.
//!
//! Every runtime value is a [`Value`]. Scalars are stored inline; mutable
//! containers share their payload behind `Arc<RwLock<..>>`, so binding or
//! passing a container shares it by reference. Two variants — [`Cell`] and
//! iterators — exist only for the VM and are never surfaced to scripts.

use crate::cell::Cell;
use crate::closure::Closure;
use crate::iterator::ValueIterator;
use crate::module::Module;
use crate::native::NativeFunction;
use crate::partial::Partial;
use crate::range::RangeValue;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use quill_core::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Shared storage behind a List value.
pub type ListRef = Arc<RwLock<Vec<Value>>>;

/// Shared storage behind a Map value.
pub type MapRef = Arc<RwLock<BTreeMap<String, Value>>>;

/// Shared storage behind a Bytes value.
pub type BytesRef = Arc<RwLock<Vec<u8>>>;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    /// The absent value; falsy and equal only to itself.
    Nil,

    /// A boolean.
    Bool(bool),

    /// A 64-bit signed integer.
    Int(i64),

    /// A 64-bit IEEE 754 float.
    Float(f64),

    /// An 8-bit unsigned integer.
    Byte(u8),

    /// Immutable UTF-8 text.
    String(Arc<str>),

    /// A mutable byte sequence.
    Bytes(BytesRef),

    /// A mutable ordered sequence of values.
    List(ListRef),

    /// A mutable mapping from string keys to values, iterated in
    /// sorted-key order.
    Map(MapRef),

    /// A lazy integer sequence.
    Range(Arc<RangeValue>),

    /// An instant with nanosecond precision.
    Time(DateTime<Utc>),

    /// A structured error. Becomes an active exception only when thrown.
    Error(Arc<Error>),

    /// A compiled function bound to its captured cells.
    Closure(Arc<Closure>),

    /// A host-provided function.
    Native(Arc<NativeFunction>),

    /// A named bundle of exported values.
    Module(Arc<Module>),

    /// A callable with a pre-bound argument prefix.
    Partial(Arc<Partial>),

    /// VM-internal: a shared mutable slot captured by closures. Never
    /// observable from scripts.
    Cell(Cell),

    /// VM-internal: an in-progress iteration. Never observable from
    /// scripts.
    Iterator(Arc<RwLock<ValueIterator>>),
}

impl Value {
    /// Creates a String value.
    pub fn string<S: Into<Arc<str>>>(s: S) -> Self {
        Value::String(s.into())
    }

    /// Creates a List value.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }

    /// Creates a Map value.
    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Arc::new(RwLock::new(entries)))
    }

    /// Creates a Bytes value.
    pub fn bytes(bytes: Vec<u8>) -> Self {
        Value::Bytes(Arc::new(RwLock::new(bytes)))
    }

    /// Creates an Error value.
    pub fn error(err: Error) -> Self {
        Value::Error(Arc::new(err))
    }

    /// Returns the value's type tag name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Byte(_) => "byte",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Range(_) => "range",
            Value::Time(_) => "time",
            Value::Error(_) => "error",
            Value::Closure(_) => "function",
            Value::Native(_) => "builtin",
            Value::Module(_) => "module",
            Value::Partial(_) => "partial",
            Value::Cell(_) => "cell",
            Value::Iterator(_) => "iterator",
        }
    }

    /// Returns true when the value is Nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Returns the value's boolean interpretation.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Byte(b) => *b != 0,
            Value::String(s) => !s.is_empty(),
            Value::Bytes(b) => !b.read().is_empty(),
            Value::List(items) => !items.read().is_empty(),
            Value::Map(entries) => !entries.read().is_empty(),
            Value::Range(r) => !r.is_empty(),
            Value::Time(t) => *t != DateTime::<Utc>::UNIX_EPOCH,
            Value::Error(_)
            | Value::Closure(_)
            | Value::Native(_)
            | Value::Module(_)
            | Value::Partial(_)
            | Value::Cell(_)
            | Value::Iterator(_) => true,
        }
    }

    /// Extracts an integer, accepting Int and Byte.
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Byte(b) => Ok(*b as i64),
            other => Err(Error::type_error(format!(
                "expected int, got {}",
                other.type_name()
            ))),
        }
    }

    /// Extracts a float, accepting Int, Float, and Byte.
    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(x) => Ok(*x),
            Value::Byte(b) => Ok(*b as f64),
            other => Err(Error::type_error(format!(
                "expected float, got {}",
                other.type_name()
            ))),
        }
    }

    /// Extracts string text.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(Error::type_error(format!(
                "expected string, got {}",
                other.type_name()
            ))),
        }
    }

    /// Returns true for variants that can be invoked with `Call`.
    pub fn is_callable(&self) -> bool {
        match self {
            Value::Closure(_) | Value::Native(_) | Value::Partial(_) => true,
            Value::Module(m) => m.is_callable(),
            _ => false,
        }
    }

    /// Produces the deterministic map/hash key for hashable values.
    ///
    /// Byte keys normalize to Int so that numerically equal hashable
    /// values produce identical keys.
    pub fn hash_key(&self) -> Result<HashKey> {
        match self {
            Value::Nil => Ok(HashKey::Nil),
            Value::Bool(b) => Ok(HashKey::Bool(*b)),
            Value::Int(i) => Ok(HashKey::Int(*i)),
            Value::Byte(b) => Ok(HashKey::Int(*b as i64)),
            Value::String(s) => Ok(HashKey::String(Arc::clone(s))),
            Value::Bytes(b) => Ok(HashKey::Bytes(b.read().clone())),
            other => Err(Error::type_error(format!(
                "{} is not hashable",
                other.type_name()
            ))),
        }
    }

    /// Renders the value in inspect form: strings quoted, containers
    /// recursed with a cycle guard.
    pub fn inspect(&self) -> String {
        let mut seen = Vec::new();
        self.inspect_guarded(&mut seen)
    }

    fn inspect_guarded(&self, seen: &mut Vec<usize>) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Byte(b) => b.to_string(),
            Value::String(s) => format!("{s:?}"),
            Value::Bytes(b) => render_bytes(&b.read()),
            Value::List(items) => {
                let id = Arc::as_ptr(items) as usize;
                if seen.contains(&id) {
                    return "[...]".to_string();
                }
                seen.push(id);
                let parts: Vec<String> = items
                    .read()
                    .iter()
                    .map(|item| item.inspect_guarded(seen))
                    .collect();
                seen.pop();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(entries) => {
                let id = Arc::as_ptr(entries) as usize;
                if seen.contains(&id) {
                    return "{...}".to_string();
                }
                seen.push(id);
                let parts: Vec<String> = entries
                    .read()
                    .iter()
                    .map(|(k, v)| format!("{k:?}: {}", v.inspect_guarded(seen)))
                    .collect();
                seen.pop();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Range(r) => r.to_string(),
            Value::Time(t) => t.to_rfc3339(),
            Value::Error(err) => format!("error({err})"),
            Value::Closure(closure) => closure.to_string(),
            Value::Native(native) => format!("builtin({})", native.display_name()),
            Value::Module(module) => format!("module({})", module.name()),
            Value::Partial(partial) => partial.to_string(),
            Value::Cell(_) => "cell".to_string(),
            Value::Iterator(_) => "iterator".to_string(),
        }
    }
}

fn render_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push_str("b\"");
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push('"');
    out
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

impl fmt::Display for Value {
    /// Display form: top-level strings print raw; everything else prints
    /// in inspect form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            other => write!(f, "{}", other.inspect()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inspect())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Int(a), Value::Byte(b)) | (Value::Byte(b), Value::Int(a)) => *a == *b as i64,
            (Value::Float(a), Value::Byte(b)) | (Value::Byte(b), Value::Float(a)) => {
                *a == *b as f64
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            (Value::Partial(a), Value::Partial(b)) => Arc::ptr_eq(a, b),
            (Value::Cell(a), Value::Cell(b)) => a.ptr_eq(b),
            (Value::Iterator(a), Value::Iterator(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Deterministic key for hashable values: the tag plus the scalar or
/// string payload. Float and container values are not keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashKey {
    Nil,
    Bool(bool),
    Int(i64),
    String(Arc<str>),
    Bytes(Vec<u8>),
}
