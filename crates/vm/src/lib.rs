//! Stack-based virtual machine for Quill bytecode.
//!
//! A [`Machine`] owns the data stack, the call-frame stack, the
//! exception-handler stack, and the globals vector for one execution
//! context. Compiled [`quill_bytecode::Code`] is immutable and may be run
//! by many machines in parallel; a single machine must not be driven from
//! multiple threads at once.

mod frame;
mod handler;
mod machine;

pub use frame::Frame;
pub use handler::{Handler, HandlerState, Pending};
pub use machine::Machine;
