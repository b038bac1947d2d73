//! Runtime iterators.
//!
//! `GetIter` materializes one of these from an iterable value; `ForIter`
//! advances it. Container iterators snapshot their elements at creation,
//! which keeps iteration deterministic even if the loop body mutates the
//! container: Lists iterate in insertion order, Maps in sorted-key order.

use crate::range::RangeValue;
use crate::value::Value;
use quill_core::{Error, Result};

/// An in-progress iteration over an iterable value.
#[derive(Debug)]
pub enum ValueIterator {
    List {
        items: Vec<Value>,
        pos: usize,
    },
    Map {
        entries: Vec<(String, Value)>,
        pos: usize,
    },
    String {
        chars: Vec<char>,
        pos: usize,
    },
    Bytes {
        bytes: Vec<u8>,
        pos: usize,
    },
    Range {
        range: RangeValue,
        pos: usize,
    },
}

impl ValueIterator {
    /// Builds an iterator over `value`, failing with a type error for
    /// non-iterable values.
    pub fn new(value: &Value) -> Result<Self> {
        match value {
            Value::List(items) => Ok(ValueIterator::List {
                items: items.read().clone(),
                pos: 0,
            }),
            Value::Map(entries) => Ok(ValueIterator::Map {
                entries: entries
                    .read()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                pos: 0,
            }),
            Value::String(s) => Ok(ValueIterator::String {
                chars: s.chars().collect(),
                pos: 0,
            }),
            Value::Bytes(bytes) => Ok(ValueIterator::Bytes {
                bytes: bytes.read().clone(),
                pos: 0,
            }),
            Value::Range(range) => Ok(ValueIterator::Range {
                range: **range,
                pos: 0,
            }),
            other => Err(Error::type_error(format!(
                "{} is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Advances the iteration, producing the next (key, value) entry.
    ///
    /// Keys are indices for sequences and string keys for maps. One-variable
    /// loops bind the value for sequences and the key for maps; see
    /// [`ValueIterator::primary`].
    pub fn next_entry(&mut self) -> Option<(Value, Value)> {
        match self {
            ValueIterator::List { items, pos } => {
                let item = items.get(*pos)?.clone();
                let key = Value::Int(*pos as i64);
                *pos += 1;
                Some((key, item))
            }
            ValueIterator::Map { entries, pos } => {
                let (k, v) = entries.get(*pos)?.clone();
                *pos += 1;
                Some((Value::string(k), v))
            }
            ValueIterator::String { chars, pos } => {
                let c = *chars.get(*pos)?;
                let key = Value::Int(*pos as i64);
                *pos += 1;
                Some((key, Value::string(c.to_string())))
            }
            ValueIterator::Bytes { bytes, pos } => {
                let b = *bytes.get(*pos)?;
                let key = Value::Int(*pos as i64);
                *pos += 1;
                Some((key, Value::Byte(b)))
            }
            ValueIterator::Range { range, pos } => {
                let item = range.get(*pos)?;
                let key = Value::Int(*pos as i64);
                *pos += 1;
                Some((key, Value::Int(item)))
            }
        }
    }

    /// Selects what a one-variable `for` loop binds from an entry: the key
    /// for maps, the value for everything else.
    pub fn primary(&self, key: Value, value: Value) -> Value {
        match self {
            ValueIterator::Map { .. } => key,
            _ => value,
        }
    }
}
