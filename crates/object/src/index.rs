//! Item access: indexing, index assignment, and slicing.
//!
//! Indices and keys are resolved before any mutation, so a failed access
//! never changes the container. Negative indices count from the end;
//! out-of-range indexing reports the offending index precisely. Slices
//! clamp to the container bounds.

use crate::value::Value;
use quill_core::{Error, Result};

fn resolve_index(len: usize, index: i64, what: &str) -> Result<usize> {
    let resolved = if index < 0 {
        index + len as i64
    } else {
        index
    };
    if resolved < 0 || resolved >= len as i64 {
        return Err(Error::index(format!("{what} index out of range: {index}")));
    }
    Ok(resolved as usize)
}

fn index_key(container: &Value, key: &Value) -> Result<i64> {
    match key {
        Value::Int(i) => Ok(*i),
        Value::Byte(b) => Ok(*b as i64),
        other => Err(Error::type_error(format!(
            "{} indices must be int, got {}",
            container.type_name(),
            other.type_name()
        ))),
    }
}

/// `container[key]`.
pub fn get_index(container: &Value, key: &Value) -> Result<Value> {
    match container {
        Value::List(items) => {
            let items = items.read();
            let i = resolve_index(items.len(), index_key(container, key)?, "list")?;
            Ok(items[i].clone())
        }
        Value::Map(entries) => match key {
            Value::String(k) => entries
                .read()
                .get(k.as_ref())
                .cloned()
                .ok_or_else(|| Error::index(format!("key not found: {k:?}"))),
            other => Err(Error::type_error(format!(
                "map keys must be string, got {}",
                other.type_name()
            ))),
        },
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = resolve_index(chars.len(), index_key(container, key)?, "string")?;
            Ok(Value::string(chars[i].to_string()))
        }
        Value::Bytes(bytes) => {
            let bytes = bytes.read();
            let i = resolve_index(bytes.len(), index_key(container, key)?, "bytes")?;
            Ok(Value::Byte(bytes[i]))
        }
        Value::Range(range) => {
            let i = resolve_index(range.len(), index_key(container, key)?, "range")?;
            Ok(Value::Int(range.get(i).expect("index was resolved")))
        }
        other => Err(Error::type_error(format!(
            "{} is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `container[key] = value`.
pub fn set_index(container: &Value, key: &Value, value: Value) -> Result<()> {
    match container {
        Value::List(items) => {
            let mut items = items.write();
            let i = resolve_index(items.len(), index_key(container, key)?, "list")?;
            items[i] = value;
            Ok(())
        }
        Value::Map(entries) => match key {
            Value::String(k) => {
                entries.write().insert(k.to_string(), value);
                Ok(())
            }
            other => Err(Error::type_error(format!(
                "map keys must be string, got {}",
                other.type_name()
            ))),
        },
        Value::Bytes(bytes) => {
            let byte = match &value {
                Value::Byte(b) => *b,
                Value::Int(i) => u8::try_from(*i)
                    .map_err(|_| Error::value(format!("byte value out of range: {i}")))?,
                other => {
                    return Err(Error::type_error(format!(
                        "bytes elements must be byte or int, got {}",
                        other.type_name()
                    )))
                }
            };
            let mut bytes = bytes.write();
            let i = resolve_index(bytes.len(), index_key(container, key)?, "bytes")?;
            bytes[i] = byte;
            Ok(())
        }
        other => Err(Error::type_error(format!(
            "{} does not support item assignment",
            other.type_name()
        ))),
    }
}

fn slice_bound(bound: &Value) -> Result<Option<i64>> {
    match bound {
        Value::Nil => Ok(None),
        Value::Int(i) => Ok(Some(*i)),
        Value::Byte(b) => Ok(Some(*b as i64)),
        other => Err(Error::type_error(format!(
            "slice indices must be int, got {}",
            other.type_name()
        ))),
    }
}

fn clamp_slice(len: usize, start: Option<i64>, stop: Option<i64>) -> (usize, usize) {
    let len = len as i64;
    let resolve = |bound: i64| -> i64 {
        let b = if bound < 0 { bound + len } else { bound };
        b.clamp(0, len)
    };
    let lo = resolve(start.unwrap_or(0));
    let hi = resolve(stop.unwrap_or(len));
    if lo >= hi {
        (0, 0)
    } else {
        (lo as usize, hi as usize)
    }
}

/// `container[start:stop]`, where either bound may be Nil for "open".
pub fn get_slice(container: &Value, start: &Value, stop: &Value) -> Result<Value> {
    let start = slice_bound(start)?;
    let stop = slice_bound(stop)?;
    match container {
        Value::List(items) => {
            let items = items.read();
            let (lo, hi) = clamp_slice(items.len(), start, stop);
            Ok(Value::list(items[lo..hi].to_vec()))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (lo, hi) = clamp_slice(chars.len(), start, stop);
            Ok(Value::string(chars[lo..hi].iter().collect::<String>()))
        }
        Value::Bytes(bytes) => {
            let bytes = bytes.read();
            let (lo, hi) = clamp_slice(bytes.len(), start, stop);
            Ok(Value::bytes(bytes[lo..hi].to_vec()))
        }
        other => Err(Error::type_error(format!(
            "{} cannot be sliced",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_list() -> Value {
        Value::list(vec![Value::Int(10), Value::Int(20), Value::Int(30)])
    }

    #[test]
    fn test_list_indexing() {
        let list = sample_list();
        assert_eq!(get_index(&list, &Value::Int(0)).unwrap(), Value::Int(10));
        assert_eq!(get_index(&list, &Value::Int(-1)).unwrap(), Value::Int(30));

        let err = get_index(&list, &Value::Int(3)).unwrap_err();
        assert_eq!(err.to_string(), "index: list index out of range: 3");

        let err = get_index(&list, &Value::string("x")).unwrap_err();
        assert_eq!(err.kind(), quill_core::ErrorKind::Type);
    }

    #[test]
    fn test_failed_set_does_not_mutate() {
        let list = sample_list();
        assert!(set_index(&list, &Value::Int(9), Value::Nil).is_err());
        assert_eq!(list, sample_list());

        set_index(&list, &Value::Int(1), Value::Int(99)).unwrap();
        assert_eq!(get_index(&list, &Value::Int(1)).unwrap(), Value::Int(99));
    }

    #[test]
    fn test_map_indexing() {
        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), Value::Int(1));
        let map = Value::map(entries);

        assert_eq!(
            get_index(&map, &Value::string("a")).unwrap(),
            Value::Int(1)
        );
        let err = get_index(&map, &Value::string("b")).unwrap_err();
        assert_eq!(err.to_string(), "index: key not found: \"b\"");

        set_index(&map, &Value::string("b"), Value::Int(2)).unwrap();
        assert_eq!(get_index(&map, &Value::string("b")).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_string_rune_indexing() {
        let s = Value::string("héllo");
        assert_eq!(get_index(&s, &Value::Int(1)).unwrap(), Value::string("é"));
        assert_eq!(get_index(&s, &Value::Int(-1)).unwrap(), Value::string("o"));
    }

    #[test]
    fn test_bytes_set() {
        let bytes = Value::bytes(vec![1, 2, 3]);
        set_index(&bytes, &Value::Int(0), Value::Int(255)).unwrap();
        assert_eq!(get_index(&bytes, &Value::Int(0)).unwrap(), Value::Byte(255));

        let err = set_index(&bytes, &Value::Int(0), Value::Int(256)).unwrap_err();
        assert_eq!(err.kind(), quill_core::ErrorKind::Value);
    }

    #[test]
    fn test_slices_clamp() {
        let list = sample_list();
        assert_eq!(
            get_slice(&list, &Value::Int(1), &Value::Nil).unwrap(),
            Value::list(vec![Value::Int(20), Value::Int(30)])
        );
        assert_eq!(
            get_slice(&list, &Value::Int(-2), &Value::Int(100)).unwrap(),
            Value::list(vec![Value::Int(20), Value::Int(30)])
        );
        assert_eq!(
            get_slice(&list, &Value::Int(2), &Value::Int(1)).unwrap(),
            Value::list(vec![])
        );
        assert_eq!(
            get_slice(&Value::string("hello"), &Value::Int(1), &Value::Int(3)).unwrap(),
            Value::string("el")
        );
    }
}
