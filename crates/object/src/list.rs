//! List methods.

use crate::attr::method;
use crate::native::{require_args, require_args_range, CallContext};
use crate::ops::compare_values;
use crate::value::Value;
use quill_core::{Error, Result};
use std::cmp::Ordering;

pub(crate) fn attr(receiver: &Value, name: &str) -> Option<Value> {
    match name {
        "append" => Some(method(receiver, "append", append)),
        "extend" => Some(method(receiver, "extend", extend)),
        "pop" => Some(method(receiver, "pop", pop)),
        "sort" => Some(method(receiver, "sort", sort)),
        "reverse" => Some(method(receiver, "reverse", reverse)),
        "copy" => Some(method(receiver, "copy", copy)),
        "map" => Some(method(receiver, "map", map_items)),
        "filter" => Some(method(receiver, "filter", filter_items)),
        "each" => Some(method(receiver, "each", each)),
        "reduce" => Some(method(receiver, "reduce", reduce)),
        _ => None,
    }
}

fn items(receiver: &Value) -> &crate::value::ListRef {
    match receiver {
        Value::List(items) => items,
        _ => unreachable!("list method bound to non-list receiver"),
    }
}

fn append(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("append", args, 1)?;
    items(receiver).write().push(args[0].clone());
    Ok(Value::Nil)
}

fn extend(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("extend", args, 1)?;
    let other = match &args[0] {
        Value::List(other) => other.read().clone(),
        other => {
            return Err(Error::type_error(format!(
                "extend: expected list, got {}",
                other.type_name()
            )))
        }
    };
    items(receiver).write().extend(other);
    Ok(Value::Nil)
}

fn pop(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args_range("pop", args, 0, 1)?;
    let mut items = items(receiver).write();
    if args.is_empty() {
        return items
            .pop()
            .ok_or_else(|| Error::index("pop from empty list"));
    }
    let index = args[0].as_int()?;
    let len = items.len() as i64;
    let resolved = if index < 0 { index + len } else { index };
    if resolved < 0 || resolved >= len {
        return Err(Error::index(format!("list index out of range: {index}")));
    }
    Ok(items.remove(resolved as usize))
}

fn sort(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("sort", args, 0)?;
    // Sort a snapshot first so an unorderable pair leaves the list intact.
    let mut sorted = items(receiver).read().clone();
    let mut error: Option<Error> = None;
    sorted.sort_by(|a, b| {
        if error.is_some() {
            return Ordering::Equal;
        }
        match compare_values(a, b) {
            Ok(ordering) => ordering,
            Err(e) => {
                error = Some(e);
                Ordering::Equal
            }
        }
    });
    if let Some(e) = error {
        return Err(e);
    }
    *items(receiver).write() = sorted;
    Ok(receiver.clone())
}

fn reverse(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("reverse", args, 0)?;
    items(receiver).write().reverse();
    Ok(receiver.clone())
}

fn copy(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("copy", args, 0)?;
    Ok(Value::list(items(receiver).read().clone()))
}

fn map_items(cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("map", args, 1)?;
    let snapshot = items(receiver).read().clone();
    let mut out = Vec::with_capacity(snapshot.len());
    for item in snapshot {
        out.push(cx.call(&args[0], vec![item])?);
    }
    Ok(Value::list(out))
}

fn filter_items(cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("filter", args, 1)?;
    let snapshot = items(receiver).read().clone();
    let mut out = Vec::new();
    for item in snapshot {
        if cx.call(&args[0], vec![item.clone()])?.truthy() {
            out.push(item);
        }
    }
    Ok(Value::list(out))
}

fn each(cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("each", args, 1)?;
    let snapshot = items(receiver).read().clone();
    for item in snapshot {
        cx.call(&args[0], vec![item])?;
    }
    Ok(Value::Nil)
}

fn reduce(cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args_range("reduce", args, 1, 2)?;
    let snapshot = items(receiver).read().clone();
    let mut iter = snapshot.into_iter();
    let mut acc = match args.get(1) {
        Some(initial) => initial.clone(),
        None => iter
            .next()
            .ok_or_else(|| Error::value("reduce of empty list with no initial value"))?,
    };
    for item in iter {
        acc = cx.call(&args[0], vec![acc, item])?;
    }
    Ok(acc)
}
