//! String methods.
//!
//! Strings are immutable; every method returns a new value. Index-valued
//! results count runes, not bytes, to match string indexing and `len`.

use crate::attr::method;
use crate::native::{require_args, require_args_range, CallContext};
use crate::value::Value;
use quill_core::Result;

pub(crate) fn attr(receiver: &Value, name: &str) -> Option<Value> {
    match name {
        "contains" => Some(method(receiver, "contains", contains)),
        "count" => Some(method(receiver, "count", count)),
        "fields" => Some(method(receiver, "fields", fields)),
        "has_prefix" => Some(method(receiver, "has_prefix", has_prefix)),
        "has_suffix" => Some(method(receiver, "has_suffix", has_suffix)),
        "index" => Some(method(receiver, "index", index)),
        "replace" => Some(method(receiver, "replace", replace)),
        "split" => Some(method(receiver, "split", split)),
        "to_lower" => Some(method(receiver, "to_lower", to_lower)),
        "to_upper" => Some(method(receiver, "to_upper", to_upper)),
        "trim" => Some(method(receiver, "trim", trim)),
        "trim_prefix" => Some(method(receiver, "trim_prefix", trim_prefix)),
        "trim_suffix" => Some(method(receiver, "trim_suffix", trim_suffix)),
        _ => None,
    }
}

fn text(receiver: &Value) -> &str {
    match receiver {
        Value::String(s) => s,
        _ => unreachable!("string method bound to non-string receiver"),
    }
}

fn contains(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("contains", args, 1)?;
    Ok(Value::Bool(text(receiver).contains(args[0].as_str()?)))
}

fn count(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("count", args, 1)?;
    let needle = args[0].as_str()?;
    if needle.is_empty() {
        return Ok(Value::Int(text(receiver).chars().count() as i64 + 1));
    }
    Ok(Value::Int(text(receiver).matches(needle).count() as i64))
}

fn fields(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("fields", args, 0)?;
    Ok(Value::list(
        text(receiver)
            .split_whitespace()
            .map(Value::string)
            .collect(),
    ))
}

fn has_prefix(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("has_prefix", args, 1)?;
    Ok(Value::Bool(text(receiver).starts_with(args[0].as_str()?)))
}

fn has_suffix(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("has_suffix", args, 1)?;
    Ok(Value::Bool(text(receiver).ends_with(args[0].as_str()?)))
}

fn index(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("index", args, 1)?;
    let haystack = text(receiver);
    match haystack.find(args[0].as_str()?) {
        Some(byte_index) => Ok(Value::Int(haystack[..byte_index].chars().count() as i64)),
        None => Ok(Value::Int(-1)),
    }
}

fn replace(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("replace", args, 2)?;
    Ok(Value::string(
        text(receiver).replace(args[0].as_str()?, args[1].as_str()?),
    ))
}

fn split(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("split", args, 1)?;
    let sep = args[0].as_str()?;
    let haystack = text(receiver);
    let parts: Vec<Value> = if sep.is_empty() {
        haystack
            .chars()
            .map(|c| Value::string(c.to_string()))
            .collect()
    } else {
        haystack.split(sep).map(Value::string).collect()
    };
    Ok(Value::list(parts))
}

fn to_lower(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("to_lower", args, 0)?;
    Ok(Value::string(text(receiver).to_lowercase()))
}

fn to_upper(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("to_upper", args, 0)?;
    Ok(Value::string(text(receiver).to_uppercase()))
}

fn trim(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args_range("trim", args, 0, 1)?;
    let trimmed = match args.first() {
        None => text(receiver).trim().to_string(),
        Some(cutset) => {
            let cutset: Vec<char> = cutset.as_str()?.chars().collect();
            text(receiver).trim_matches(|c| cutset.contains(&c)).to_string()
        }
    };
    Ok(Value::string(trimmed))
}

fn trim_prefix(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("trim_prefix", args, 1)?;
    let haystack = text(receiver);
    let prefix = args[0].as_str()?;
    Ok(Value::string(
        haystack.strip_prefix(prefix).unwrap_or(haystack),
    ))
}

fn trim_suffix(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("trim_suffix", args, 1)?;
    let haystack = text(receiver);
    let suffix = args[0].as_str()?;
    Ok(Value::string(
        haystack.strip_suffix(suffix).unwrap_or(haystack),
    ))
}
