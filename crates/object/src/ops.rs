//! Operator and comparison dispatch.
//!
//! This module is the single authority on which operations are legal
//! between which variants. Every function returns a precise `type` or
//! `value` error when an operation is not defined, before any mutation
//! happens.

use crate::value::Value;
use quill_core::{Error, Result};
use std::cmp::Ordering;

/// Binary operator selector carried as a `BinaryOp` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BinaryOpKind {
    Add = 0,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOpKind {
    const ALL: [BinaryOpKind; 11] = [
        BinaryOpKind::Add,
        BinaryOpKind::Sub,
        BinaryOpKind::Mul,
        BinaryOpKind::Div,
        BinaryOpKind::Mod,
        BinaryOpKind::Pow,
        BinaryOpKind::BitAnd,
        BinaryOpKind::BitOr,
        BinaryOpKind::BitXor,
        BinaryOpKind::Shl,
        BinaryOpKind::Shr,
    ];

    /// Decodes an operand word.
    pub fn from_word(word: u16) -> Option<Self> {
        Self::ALL.get(word as usize).copied()
    }

    /// Encodes as an operand word.
    pub fn word(self) -> u16 {
        self as u16
    }

    /// The operator's source symbol, used in error messages.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOpKind::Add => "+",
            BinaryOpKind::Sub => "-",
            BinaryOpKind::Mul => "*",
            BinaryOpKind::Div => "/",
            BinaryOpKind::Mod => "%",
            BinaryOpKind::Pow => "**",
            BinaryOpKind::BitAnd => "&",
            BinaryOpKind::BitOr => "|",
            BinaryOpKind::BitXor => "^",
            BinaryOpKind::Shl => "<<",
            BinaryOpKind::Shr => ">>",
        }
    }
}

/// Comparison selector carried as a `CompareOp` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompareOpKind {
    Eq = 0,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOpKind {
    const ALL: [CompareOpKind; 6] = [
        CompareOpKind::Eq,
        CompareOpKind::NotEq,
        CompareOpKind::Lt,
        CompareOpKind::LtEq,
        CompareOpKind::Gt,
        CompareOpKind::GtEq,
    ];

    /// Decodes an operand word.
    pub fn from_word(word: u16) -> Option<Self> {
        Self::ALL.get(word as usize).copied()
    }

    /// Encodes as an operand word.
    pub fn word(self) -> u16 {
        self as u16
    }

    /// The operator's source symbol, used in error messages.
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOpKind::Eq => "==",
            CompareOpKind::NotEq => "!=",
            CompareOpKind::Lt => "<",
            CompareOpKind::LtEq => "<=",
            CompareOpKind::Gt => ">",
            CompareOpKind::GtEq => ">=",
        }
    }
}

fn unsupported(op: BinaryOpKind, lhs: &Value, rhs: &Value) -> Error {
    Error::type_error(format!(
        "unsupported operand types for {}: {} and {}",
        op.symbol(),
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn overflow(op: BinaryOpKind) -> Error {
    Error::value(format!("integer overflow in {}", op.symbol()))
}

/// Applies a binary arithmetic or bitwise operator.
pub fn binary(op: BinaryOpKind, lhs: &Value, rhs: &Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_binary(op, *a, *b),
        (Value::Byte(a), Value::Byte(b)) => byte_binary(op, *a, *b),
        (Value::Int(a), Value::Byte(b)) => int_binary(op, *a, *b as i64),
        (Value::Byte(a), Value::Int(b)) => int_binary(op, *a as i64, *b),
        (Value::Float(a), Value::Float(b)) => float_binary(op, *a, *b),
        (Value::Float(a), Value::Int(b)) => float_binary(op, *a, *b as f64),
        (Value::Int(a), Value::Float(b)) => float_binary(op, *a as f64, *b),
        (Value::Float(a), Value::Byte(b)) => float_binary(op, *a, *b as f64),
        (Value::Byte(a), Value::Float(b)) => float_binary(op, *a as f64, *b),
        (Value::String(a), Value::String(b)) if op == BinaryOpKind::Add => {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Ok(Value::string(out))
        }
        (Value::String(s), Value::Int(n)) if op == BinaryOpKind::Mul => {
            if *n < 0 {
                return Err(Error::value("negative repeat count"));
            }
            Ok(Value::string(s.repeat(*n as usize)))
        }
        (Value::List(a), Value::List(b)) if op == BinaryOpKind::Add => {
            let mut out = a.read().clone();
            out.extend(b.read().iter().cloned());
            Ok(Value::list(out))
        }
        (Value::Bytes(a), Value::Bytes(b)) if op == BinaryOpKind::Add => {
            let mut out = a.read().clone();
            out.extend_from_slice(&b.read());
            Ok(Value::bytes(out))
        }
        _ => Err(unsupported(op, lhs, rhs)),
    }
}

fn int_binary(op: BinaryOpKind, a: i64, b: i64) -> Result<Value> {
    let result = match op {
        BinaryOpKind::Add => a.checked_add(b).ok_or_else(|| overflow(op))?,
        BinaryOpKind::Sub => a.checked_sub(b).ok_or_else(|| overflow(op))?,
        BinaryOpKind::Mul => a.checked_mul(b).ok_or_else(|| overflow(op))?,
        BinaryOpKind::Div => {
            if b == 0 {
                return Err(Error::value("division by zero"));
            }
            a.checked_div(b).ok_or_else(|| overflow(op))?
        }
        BinaryOpKind::Mod => {
            if b == 0 {
                return Err(Error::value("division by zero"));
            }
            a.checked_rem(b).ok_or_else(|| overflow(op))?
        }
        BinaryOpKind::Pow => {
            if b < 0 {
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exp = u32::try_from(b).map_err(|_| overflow(op))?;
            a.checked_pow(exp).ok_or_else(|| overflow(op))?
        }
        BinaryOpKind::BitAnd => a & b,
        BinaryOpKind::BitOr => a | b,
        BinaryOpKind::BitXor => a ^ b,
        BinaryOpKind::Shl => {
            let shift = shift_amount(b)?;
            a.checked_shl(shift).ok_or_else(|| overflow(op))?
        }
        BinaryOpKind::Shr => {
            let shift = shift_amount(b)?;
            a.checked_shr(shift).ok_or_else(|| overflow(op))?
        }
    };
    Ok(Value::Int(result))
}

fn shift_amount(b: i64) -> Result<u32> {
    if !(0..64).contains(&b) {
        return Err(Error::value(format!("shift amount out of range: {b}")));
    }
    Ok(b as u32)
}

fn float_binary(op: BinaryOpKind, a: f64, b: f64) -> Result<Value> {
    let result = match op {
        BinaryOpKind::Add => a + b,
        BinaryOpKind::Sub => a - b,
        BinaryOpKind::Mul => a * b,
        BinaryOpKind::Div => {
            if b == 0.0 {
                return Err(Error::value("division by zero"));
            }
            a / b
        }
        BinaryOpKind::Mod => {
            if b == 0.0 {
                return Err(Error::value("division by zero"));
            }
            a % b
        }
        BinaryOpKind::Pow => a.powf(b),
        _ => {
            return Err(Error::type_error(format!(
                "unsupported operand types for {}: float and float",
                op.symbol()
            )))
        }
    };
    Ok(Value::Float(result))
}

fn byte_binary(op: BinaryOpKind, a: u8, b: u8) -> Result<Value> {
    // Bitwise ops between two bytes stay bytes; everything else promotes
    // through the int path.
    match op {
        BinaryOpKind::BitAnd => Ok(Value::Byte(a & b)),
        BinaryOpKind::BitOr => Ok(Value::Byte(a | b)),
        BinaryOpKind::BitXor => Ok(Value::Byte(a ^ b)),
        _ => int_binary(op, a as i64, b as i64),
    }
}

/// Orders two values, failing with a type error for unordered pairs.
pub fn compare_values(lhs: &Value, rhs: &Value) -> Result<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Byte(a), Value::Byte(b)) => Ok(a.cmp(b)),
        (Value::Int(a), Value::Byte(b)) => Ok(a.cmp(&(*b as i64))),
        (Value::Byte(a), Value::Int(b)) => Ok((*a as i64).cmp(b)),
        (Value::Float(_), Value::Int(_) | Value::Float(_) | Value::Byte(_))
        | (Value::Int(_) | Value::Byte(_), Value::Float(_)) => {
            let a = lhs.as_float()?;
            let b = rhs.as_float()?;
            a.partial_cmp(&b)
                .ok_or_else(|| Error::value("cannot compare NaN"))
        }
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Ok(a.read().cmp(&b.read())),
        (Value::Time(a), Value::Time(b)) => Ok(a.cmp(b)),
        _ => Err(Error::type_error(format!(
            "unsupported comparison between {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

/// Applies a comparison operator. Equality is defined for every pair;
/// ordering only within ordered classes and across the numeric tower.
pub fn compare(op: CompareOpKind, lhs: &Value, rhs: &Value) -> Result<Value> {
    let result = match op {
        CompareOpKind::Eq => lhs == rhs,
        CompareOpKind::NotEq => lhs != rhs,
        CompareOpKind::Lt => compare_values(lhs, rhs)? == Ordering::Less,
        CompareOpKind::LtEq => compare_values(lhs, rhs)? != Ordering::Greater,
        CompareOpKind::Gt => compare_values(lhs, rhs)? == Ordering::Greater,
        CompareOpKind::GtEq => compare_values(lhs, rhs)? != Ordering::Less,
    };
    Ok(Value::Bool(result))
}

/// Arithmetic negation.
pub fn unary_negative(value: &Value) -> Result<Value> {
    match value {
        Value::Int(i) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| Error::value("integer overflow in -")),
        Value::Float(x) => Ok(Value::Float(-x)),
        Value::Byte(b) => Ok(Value::Int(-(*b as i64))),
        other => Err(Error::type_error(format!(
            "unsupported operand type for -: {}",
            other.type_name()
        ))),
    }
}

/// Logical negation via truthiness; defined for every value.
pub fn unary_not(value: &Value) -> Value {
    Value::Bool(!value.truthy())
}

/// Membership test, delegating to the container's predicate.
pub fn contains(container: &Value, item: &Value) -> Result<Value> {
    let found = match container {
        Value::List(items) => items.read().iter().any(|v| v == item),
        Value::Map(entries) => match item {
            Value::String(key) => entries.read().contains_key(key.as_ref()),
            _ => false,
        },
        Value::String(s) => match item {
            Value::String(needle) => s.contains(needle.as_ref()),
            _ => {
                return Err(Error::type_error(format!(
                    "'in' on string requires a string, got {}",
                    item.type_name()
                )))
            }
        },
        Value::Bytes(bytes) => match item {
            Value::Byte(b) => bytes.read().contains(b),
            Value::Int(i) => {
                let byte = u8::try_from(*i)
                    .map_err(|_| Error::value(format!("byte value out of range: {i}")))?;
                bytes.read().contains(&byte)
            }
            Value::Bytes(needle) => {
                let haystack = bytes.read();
                let needle = needle.read();
                needle.is_empty()
                    || haystack
                        .windows(needle.len())
                        .any(|window| window == &needle[..])
            }
            _ => {
                return Err(Error::type_error(format!(
                    "'in' on bytes requires a byte or bytes, got {}",
                    item.type_name()
                )))
            }
        },
        Value::Range(range) => match item {
            Value::Int(i) => range.contains(*i),
            Value::Byte(b) => range.contains(*b as i64),
            _ => false,
        },
        other => {
            return Err(Error::type_error(format!(
                "'in' not supported on {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::Bool(found))
}

/// Returns the container's length as an Int. Strings count runes.
pub fn length(value: &Value) -> Result<Value> {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Bytes(b) => b.read().len(),
        Value::List(items) => items.read().len(),
        Value::Map(entries) => entries.read().len(),
        Value::Range(r) => r.len(),
        other => {
            return Err(Error::type_error(format!(
                "{} has no length",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(len as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn add(lhs: Value, rhs: Value) -> Result<Value> {
        binary(BinaryOpKind::Add, &lhs, &rhs)
    }

    #[test]
    fn test_int_arithmetic() {
        assert_eq!(add(Value::Int(1), Value::Int(1)).unwrap(), Value::Int(2));
        assert_eq!(
            binary(BinaryOpKind::Mul, &Value::Int(6), &Value::Int(7)).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            binary(BinaryOpKind::Div, &Value::Int(7), &Value::Int(2)).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            binary(BinaryOpKind::Mod, &Value::Int(-7), &Value::Int(2)).unwrap(),
            Value::Int(-1)
        );
        assert_eq!(
            binary(BinaryOpKind::Pow, &Value::Int(2), &Value::Int(10)).unwrap(),
            Value::Int(1024)
        );
    }

    #[test]
    fn test_float_promotion() {
        assert_eq!(
            add(Value::Int(1), Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            add(Value::Byte(2), Value::Float(0.5)).unwrap(),
            Value::Float(2.5)
        );
    }

    #[test]
    fn test_byte_semantics() {
        // Bitwise between bytes stays byte; arithmetic promotes to int.
        assert_eq!(
            binary(BinaryOpKind::BitAnd, &Value::Byte(0xf0), &Value::Byte(0x3c)).unwrap(),
            Value::Byte(0x30)
        );
        assert_eq!(add(Value::Byte(200), Value::Byte(100)).unwrap(), Value::Int(300));
        assert_eq!(add(Value::Byte(1), Value::Int(2)).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_division_by_zero() {
        for op in [BinaryOpKind::Div, BinaryOpKind::Mod] {
            let err = binary(op, &Value::Int(1), &Value::Int(0)).unwrap_err();
            assert_eq!(err.to_string(), "value: division by zero");
        }
        let err = binary(BinaryOpKind::Div, &Value::Float(1.0), &Value::Float(0.0)).unwrap_err();
        assert_eq!(err.to_string(), "value: division by zero");
    }

    #[test]
    fn test_int_overflow_is_value_error() {
        let err = add(Value::Int(i64::MAX), Value::Int(1)).unwrap_err();
        assert_eq!(err.kind(), quill_core::ErrorKind::Value);

        let err = binary(BinaryOpKind::Div, &Value::Int(i64::MIN), &Value::Int(-1)).unwrap_err();
        assert_eq!(err.kind(), quill_core::ErrorKind::Value);
    }

    #[test]
    fn test_string_ops() {
        assert_eq!(
            add(Value::string("foo"), Value::string("bar")).unwrap(),
            Value::string("foobar")
        );
        assert_eq!(
            binary(BinaryOpKind::Mul, &Value::string("ab"), &Value::Int(3)).unwrap(),
            Value::string("ababab")
        );
        let err = binary(BinaryOpKind::Mul, &Value::string("ab"), &Value::Int(-1)).unwrap_err();
        assert_eq!(err.to_string(), "value: negative repeat count");
    }

    #[test]
    fn test_list_and_bytes_concat() {
        let result = add(
            Value::list(vec![Value::Int(1)]),
            Value::list(vec![Value::Int(2)]),
        )
        .unwrap();
        assert_eq!(result, Value::list(vec![Value::Int(1), Value::Int(2)]));

        let result = add(Value::bytes(vec![1]), Value::bytes(vec![2])).unwrap();
        assert_eq!(result, Value::bytes(vec![1, 2]));
    }

    #[test]
    fn test_unsupported_operands() {
        let err = add(Value::Int(1), Value::string("x")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type: unsupported operand types for +: int and string"
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            compare(CompareOpKind::Lt, &Value::Int(1), &Value::Float(1.5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            compare(CompareOpKind::Eq, &Value::Int(1), &Value::string("1")).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            compare(CompareOpKind::Lt, &Value::Bool(false), &Value::Bool(true)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            compare(CompareOpKind::GtEq, &Value::string("b"), &Value::string("a")).unwrap(),
            Value::Bool(true)
        );
        assert!(compare(CompareOpKind::Lt, &Value::Int(1), &Value::string("x")).is_err());
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary_negative(&Value::Int(5)).unwrap(), Value::Int(-5));
        assert_eq!(unary_negative(&Value::Byte(5)).unwrap(), Value::Int(-5));
        assert!(unary_negative(&Value::string("x")).is_err());
        assert_eq!(unary_not(&Value::Int(0)), Value::Bool(true));
        assert_eq!(unary_not(&Value::string("x")), Value::Bool(false));
    }

    #[test]
    fn test_contains() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(contains(&list, &Value::Int(2)).unwrap(), Value::Bool(true));
        assert_eq!(contains(&list, &Value::Int(3)).unwrap(), Value::Bool(false));

        let s = Value::string("hello");
        assert_eq!(
            contains(&s, &Value::string("ell")).unwrap(),
            Value::Bool(true)
        );
        assert!(contains(&s, &Value::Int(1)).is_err());
        assert!(contains(&Value::Int(1), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_length() {
        assert_eq!(length(&Value::string("héllo")).unwrap(), Value::Int(5));
        assert_eq!(
            length(&Value::list(vec![Value::Nil, Value::Nil])).unwrap(),
            Value::Int(2)
        );
        assert!(length(&Value::Int(1)).is_err());
    }

    proptest! {
        #[test]
        fn prop_div_mod_identity(a in -1_000_000i64..1_000_000, b in 1i64..1_000) {
            let q = binary(BinaryOpKind::Div, &Value::Int(a), &Value::Int(b)).unwrap();
            let r = binary(BinaryOpKind::Mod, &Value::Int(a), &Value::Int(b)).unwrap();
            if let (Value::Int(q), Value::Int(r)) = (q, r) {
                prop_assert_eq!(q * b + r, a);
            } else {
                prop_assert!(false, "int division produced a non-int");
            }
        }

        #[test]
        fn prop_equal_hashables_share_keys(v in 0u8..=255) {
            let byte = Value::Byte(v);
            let int = Value::Int(v as i64);
            prop_assert_eq!(&byte, &int);
            prop_assert_eq!(byte.hash_key().unwrap(), int.hash_key().unwrap());
        }
    }
}
