//! The `time` host module.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use quill_core::{Error, Result};
use quill_interop::{wrap_fn0, wrap_fn1, wrap_fn2};
use quill_object::{Module, NativeFunction, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) fn module() -> Module {
    let mut attrs = BTreeMap::new();
    let mut add = |native: NativeFunction| {
        attrs.insert(native.name().to_string(), Value::Native(Arc::new(native)));
    };

    add(wrap_fn0("now", |_cx| Ok(Utc::now())));
    add(wrap_fn1("unix", |_cx, seconds: i64| {
        Utc.timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| Error::value(format!("timestamp out of range: {seconds}")))
    }));
    add(wrap_fn2("parse", |_cx, layout: String, text: String| {
        parse_time(&layout, &text)
    }));
    add(wrap_fn1("since", |_cx, earlier: DateTime<Utc>| {
        let delta = Utc::now().signed_duration_since(earlier);
        Ok(delta.num_milliseconds() as f64 / 1000.0)
    }));

    Module::new("time", attrs)
}

/// Parses with the given strftime layout. Layouts carrying a zone
/// directive parse as absolute instants; zoneless layouts are read as UTC.
fn parse_time(layout: &str, text: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_str(text, layout) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, layout)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|err| Error::value(format!("cannot parse time {text:?}: {err}")))
}
