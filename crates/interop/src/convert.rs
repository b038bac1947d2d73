//! Host ↔ runtime value conversion traits.

use chrono::{DateTime, Utc};
use quill_core::{Error, Result};
use quill_object::Value;
use std::collections::{BTreeMap, HashMap};

/// Conversion from a host value into a runtime value.
pub trait ToValue {
    fn to_value(self) -> Result<Value>;
}

/// Conversion from a runtime value into a host value.
///
/// `Nil` converts to the target's zero value; floats truncate when an
/// integer is requested; fixed-width integers are range-checked.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &str, got: &Value) -> Error {
    Error::type_error(format!("expected {expected}, got {}", got.type_name()))
}

impl ToValue for Value {
    fn to_value(self) -> Result<Value> {
        Ok(self)
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl ToValue for () {
    fn to_value(self) -> Result<Value> {
        Ok(Value::Nil)
    }
}

impl ToValue for bool {
    fn to_value(self) -> Result<Value> {
        Ok(Value::Bool(self))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(false),
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl ToValue for u8 {
    fn to_value(self) -> Result<Value> {
        Ok(Value::Byte(self))
    }
}

impl FromValue for u8 {
    fn from_value(value: &Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        u8::try_from(wide).map_err(|_| Error::value(format!("byte value out of range: {wide}")))
    }
}

macro_rules! int_to_value {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(self) -> Result<Value> {
                    Ok(Value::Int(self as i64))
                }
            }
        )*
    };
}

int_to_value!(i8, i16, i32, i64, u16, u32);

impl ToValue for u64 {
    fn to_value(self) -> Result<Value> {
        i64::try_from(self)
            .map(Value::Int)
            .map_err(|_| Error::value(format!("integer out of range: {self}")))
    }
}

impl ToValue for usize {
    fn to_value(self) -> Result<Value> {
        i64::try_from(self)
            .map(Value::Int)
            .map_err(|_| Error::value(format!("integer out of range: {self}")))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(0),
            Value::Int(i) => Ok(*i),
            Value::Byte(b) => Ok(*b as i64),
            Value::Float(x) => Ok(*x as i64),
            other => Err(mismatch("int", other)),
        }
    }
}

macro_rules! narrow_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    let wide = i64::from_value(value)?;
                    <$ty>::try_from(wide)
                        .map_err(|_| Error::value(format!("integer out of range: {wide}")))
                }
            }
        )*
    };
}

narrow_from_value!(i8, i16, i32, u16, u32, u64, usize);

impl ToValue for f64 {
    fn to_value(self) -> Result<Value> {
        Ok(Value::Float(self))
    }
}

impl ToValue for f32 {
    fn to_value(self) -> Result<Value> {
        Ok(Value::Float(self as f64))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(0.0),
            other => other.as_float(),
        }
    }
}

impl ToValue for String {
    fn to_value(self) -> Result<Value> {
        Ok(Value::string(self))
    }
}

impl<'a> ToValue for &'a str {
    fn to_value(self) -> Result<Value> {
        Ok(Value::string(self.to_string()))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(String::new()),
            Value::String(s) => Ok(s.to_string()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(self) -> Result<Value> {
        Ok(Value::Time(self))
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Time(t) => Ok(*t),
            other => Err(mismatch("time", other)),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(self) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Nil),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(None),
            other => Ok(Some(T::from_value(other)?)),
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(self) -> Result<Value> {
        let items: Result<Vec<Value>> = self.into_iter().map(ToValue::to_value).collect();
        Ok(Value::list(items?))
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(Vec::new()),
            Value::List(items) => items.read().iter().map(T::from_value).collect(),
            other => Err(mismatch("list", other)),
        }
    }
}

impl<T: ToValue> ToValue for BTreeMap<String, T> {
    fn to_value(self) -> Result<Value> {
        let mut entries = BTreeMap::new();
        for (key, item) in self {
            entries.insert(key, item.to_value()?);
        }
        Ok(Value::map(entries))
    }
}

impl<T: ToValue> ToValue for HashMap<String, T> {
    fn to_value(self) -> Result<Value> {
        let mut entries = BTreeMap::new();
        for (key, item) in self {
            entries.insert(key, item.to_value()?);
        }
        Ok(Value::map(entries))
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(BTreeMap::new()),
            Value::Map(entries) => entries
                .read()
                .iter()
                .map(|(key, item)| Ok((key.clone(), T::from_value(item)?)))
                .collect(),
            other => Err(mismatch("map", other)),
        }
    }
}

/// Extracts raw bytes from a Bytes value (or a String's UTF-8). This is a
/// standalone helper because `Vec<u8>` as a generic list converts
/// element-wise instead.
pub fn bytes_from_value(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Nil => Ok(Vec::new()),
        Value::Bytes(bytes) => Ok(bytes.read().clone()),
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        other => Err(mismatch("bytes", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trips() {
        assert_eq!(true.to_value().unwrap(), Value::Bool(true));
        assert_eq!(42i64.to_value().unwrap(), Value::Int(42));
        assert_eq!(7u8.to_value().unwrap(), Value::Byte(7));
        assert_eq!(2.5f64.to_value().unwrap(), Value::Float(2.5));
        assert_eq!("hi".to_value().unwrap(), Value::string("hi"));

        assert_eq!(i64::from_value(&Value::Int(42)).unwrap(), 42);
        assert_eq!(String::from_value(&Value::string("hi")).unwrap(), "hi");
    }

    #[test]
    fn test_float_truncates_to_int() {
        assert_eq!(i64::from_value(&Value::Float(3.9)).unwrap(), 3);
        assert_eq!(i64::from_value(&Value::Float(-3.9)).unwrap(), -3);
    }

    #[test]
    fn test_nil_is_zero_value() {
        assert_eq!(i64::from_value(&Value::Nil).unwrap(), 0);
        assert_eq!(f64::from_value(&Value::Nil).unwrap(), 0.0);
        assert_eq!(String::from_value(&Value::Nil).unwrap(), "");
        assert!(!bool::from_value(&Value::Nil).unwrap());
        assert_eq!(Vec::<i64>::from_value(&Value::Nil).unwrap(), Vec::<i64>::new());
    }

    #[test]
    fn test_narrowing_is_checked() {
        assert!(u8::from_value(&Value::Int(300)).is_err());
        assert!(i32::from_value(&Value::Int(i64::MAX)).is_err());
        assert!(u64::to_value(u64::MAX).is_err());
    }

    #[test]
    fn test_collections_recurse() {
        let value = vec![vec![1i64, 2], vec![3]].to_value().unwrap();
        assert_eq!(
            value,
            Value::list(vec![
                Value::list(vec![Value::Int(1), Value::Int(2)]),
                Value::list(vec![Value::Int(3)])
            ])
        );
        let back: Vec<Vec<i64>> = FromValue::from_value(&value).unwrap();
        assert_eq!(back, vec![vec![1, 2], vec![3]]);

        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1i64);
        let value = map.clone().to_value().unwrap();
        let back: BTreeMap<String, i64> = FromValue::from_value(&value).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_option_and_nil() {
        assert_eq!(None::<i64>.to_value().unwrap(), Value::Nil);
        assert_eq!(Some(1i64).to_value().unwrap(), Value::Int(1));
        assert_eq!(Option::<i64>::from_value(&Value::Nil).unwrap(), None);
        assert_eq!(Option::<i64>::from_value(&Value::Int(1)).unwrap(), Some(1));
    }

    #[test]
    fn test_mismatch_errors() {
        let err = String::from_value(&Value::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "type: expected string, got int");
        assert!(Vec::<i64>::from_value(&Value::string("x")).is_err());
    }

    #[test]
    fn test_bytes_helper() {
        assert_eq!(
            bytes_from_value(&Value::bytes(vec![1, 2])).unwrap(),
            vec![1, 2]
        );
        assert_eq!(bytes_from_value(&Value::string("ab")).unwrap(), b"ab");
    }
}
