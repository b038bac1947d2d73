//! Core types shared by every crate in the Quill runtime.
//!
//! This crate defines the error shape surfaced to hosts and scripts, source
//! positions used by the front end and the VM's stack traces, the
//! cancellation [`Context`] threaded through every evaluation, and the
//! resource limits the VM enforces.

mod context;
mod error;
mod limits;
mod position;

pub use context::Context;
pub use error::{Error, ErrorKind, TraceFrame};
pub use limits::Limits;
pub use position::{Location, Position};

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
