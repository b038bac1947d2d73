//! Value model for the Quill runtime.
//!
//! This crate is the only place that knows which operations are legal
//! between which value variants. It defines the [`Value`] sum type, the
//! operator and comparison dispatch, attribute and item access, the
//! closure-capture [`Cell`] machinery, and the [`CallContext`] trait
//! through which native methods re-enter the VM.

mod attr;
mod bytes;
mod cell;
mod closure;
mod index;
mod iterator;
mod list;
mod map;
mod module;
mod native;
mod ops;
mod partial;
mod range;
mod string;
mod time;
mod value;

pub use attr::{get_attr, set_attr};
pub use cell::Cell;
pub use closure::Closure;
pub use index::{get_index, get_slice, set_index};
pub use iterator::ValueIterator;
pub use module::Module;
pub use native::{require_args, require_args_range, CallContext, NativeFunction};
pub use ops::{
    binary, compare, compare_values, contains, length, unary_negative, unary_not, BinaryOpKind,
    CompareOpKind,
};
pub use partial::Partial;
pub use range::RangeValue;
pub use value::{BytesRef, HashKey, ListRef, MapRef, Value};
