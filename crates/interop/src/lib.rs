//! Host bridge: two-way conversion between Rust values and runtime
//! values, plus typed wrappers that expose Rust functions as script
//! callables with a panic guard.
//!
//! Conversion is trait-driven rather than registry-driven: `ToValue` and
//! `FromValue` are the declared, compile-time fixed mapping between host
//! types and runtime variants. Collection conversions recurse; numeric
//! narrowing truncates floats and range-checks fixed-width integers;
//! `Nil` converts to a target's zero value.

mod convert;
mod json;
mod wrap;

pub use convert::{bytes_from_value, FromValue, ToValue};
pub use json::{json_to_value, value_to_json};
pub use wrap::{wrap_fn0, wrap_fn1, wrap_fn2, wrap_fn3, wrap_variadic};
