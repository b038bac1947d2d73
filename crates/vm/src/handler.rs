//! Exception-handler records.
//!
//! Handlers live on one machine-wide stack, each tagged with the frame it
//! belongs to. The unwinder walks that stack from the top, popping call
//! frames alongside, until a handler accepts the exception or none is
//! left and the error escapes the evaluation.

use quill_core::Error;
use quill_object::Value;

/// Which region of the protected statement is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// The try body is running.
    Try,

    /// The catch block is running; only possible while a finally block
    /// remains to guard it.
    Catch,

    /// The finally block is running.
    Finally,
}

/// What `EndFinally` must resume once the finally block completes.
#[derive(Debug, Clone)]
pub enum Pending {
    /// Fall through to the code after the finally block.
    None,

    /// Re-raise an exception that was in flight when finally started.
    Exception(Error),

    /// Complete a return that was diverted through finally.
    Return(Value),
}

/// One entry on the handler stack.
#[derive(Debug)]
pub struct Handler {
    /// Index of the owning call frame.
    pub frame_index: usize,

    /// Data-stack depth to restore when the handler activates.
    pub stack_depth: usize,

    /// Catch block entry point, absolute pc.
    pub catch_pc: Option<usize>,

    /// Finally block entry point, absolute pc.
    pub finally_pc: Option<usize>,

    pub state: HandlerState,
    pub pending: Pending,
}

impl Handler {
    /// Creates a handler in the initial Try state.
    pub fn new(
        frame_index: usize,
        stack_depth: usize,
        catch_pc: Option<usize>,
        finally_pc: Option<usize>,
    ) -> Self {
        Self {
            frame_index,
            stack_depth,
            catch_pc,
            finally_pc,
            state: HandlerState::Try,
            pending: Pending::None,
        }
    }
}
