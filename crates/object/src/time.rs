//! Time methods.
//!
//! Times are UTC instants with nanosecond precision. Arithmetic takes and
//! returns seconds; `format` uses strftime-style layouts.

use crate::attr::method;
use crate::native::{require_args, CallContext};
use crate::value::Value;
use chrono::{DateTime, Duration, Utc};
use quill_core::{Error, Result};

pub(crate) fn attr(receiver: &Value, name: &str) -> Option<Value> {
    match name {
        "format" => Some(method(receiver, "format", format_time)),
        "unix" => Some(method(receiver, "unix", unix)),
        "utc" => Some(method(receiver, "utc", utc)),
        "add" => Some(method(receiver, "add", add)),
        "sub" => Some(method(receiver, "sub", sub)),
        "before" => Some(method(receiver, "before", before)),
        "after" => Some(method(receiver, "after", after)),
        _ => None,
    }
}

fn instant(receiver: &Value) -> DateTime<Utc> {
    match receiver {
        Value::Time(t) => *t,
        _ => unreachable!("time method bound to non-time receiver"),
    }
}

fn time_arg(name: &str, arg: &Value) -> Result<DateTime<Utc>> {
    match arg {
        Value::Time(t) => Ok(*t),
        other => Err(Error::type_error(format!(
            "{name}: expected time, got {}",
            other.type_name()
        ))),
    }
}

fn seconds_duration(name: &str, arg: &Value) -> Result<Duration> {
    let seconds = arg.as_float().map_err(|_| {
        Error::type_error(format!(
            "{name}: expected int or float seconds, got {}",
            arg.type_name()
        ))
    })?;
    Duration::try_milliseconds((seconds * 1000.0) as i64)
        .ok_or_else(|| Error::value(format!("{name}: duration out of range")))
}

fn format_time(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("format", args, 1)?;
    let layout = args[0].as_str()?;
    Ok(Value::string(instant(receiver).format(layout).to_string()))
}

fn unix(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("unix", args, 0)?;
    Ok(Value::Int(instant(receiver).timestamp()))
}

fn utc(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("utc", args, 0)?;
    Ok(receiver.clone())
}

fn add(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("add", args, 1)?;
    let duration = seconds_duration("add", &args[0])?;
    instant(receiver)
        .checked_add_signed(duration)
        .map(Value::Time)
        .ok_or_else(|| Error::value("add: time out of range"))
}

fn sub(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("sub", args, 1)?;
    match &args[0] {
        Value::Time(other) => {
            let delta = instant(receiver).signed_duration_since(*other);
            Ok(Value::Float(delta.num_milliseconds() as f64 / 1000.0))
        }
        other => {
            let duration = seconds_duration("sub", other)?;
            instant(receiver)
                .checked_sub_signed(duration)
                .map(Value::Time)
                .ok_or_else(|| Error::value("sub: time out of range"))
        }
    }
}

fn before(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("before", args, 1)?;
    let other = time_arg("before", &args[0])?;
    Ok(Value::Bool(instant(receiver) < other))
}

fn after(_cx: &mut dyn CallContext, receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args("after", args, 1)?;
    let other = time_arg("after", &args[0])?;
    Ok(Value::Bool(instant(receiver) > other))
}
