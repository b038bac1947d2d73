//! The execution engine.
//!
//! The machine fetches one instruction word at a time, dispatches on the
//! opcode, and drives operator and attribute dispatch through the value
//! model. Errors raised by opcodes are injected into the exception state
//! machine; whatever escapes the entry frame is returned to the host.

use crate::frame::Frame;
use crate::handler::{Handler, HandlerState, Pending};
use log::{debug, trace};
use parking_lot::RwLock;
use quill_bytecode::{Code, Constant, Opcode, NO_TARGET};
use quill_core::{Context, Error, Limits, Location, Result, TraceFrame};
use quill_object::{
    binary, compare, contains, get_attr, get_index, get_slice, length, set_attr, set_index,
    unary_negative, unary_not, BinaryOpKind, Cell, Closure, CompareOpKind, Partial, RangeValue,
    Value, ValueIterator,
};
use std::collections::BTreeMap;
use std::sync::Arc;

enum StepOutcome {
    Continue,
    Done(Value),
}

/// A stack-based bytecode interpreter. One machine runs one evaluation at
/// a time; its globals vector persists across runs, which is what gives a
/// host REPL semantics.
pub struct Machine {
    stack: Vec<Value>,
    frames: Vec<Frame>,
    handlers: Vec<Handler>,
    globals: Vec<Value>,
    context: Context,
    limits: Limits,
    interrupted: bool,
}

impl Machine {
    /// Creates a machine bound to a cancellation context.
    pub fn new(context: Context) -> Self {
        Self::with_limits(context, Limits::default())
    }

    /// Creates a machine with explicit resource limits.
    pub fn with_limits(context: Context, limits: Limits) -> Self {
        Self {
            stack: Vec::new(),
            frames: Vec::new(),
            handlers: Vec::new(),
            globals: Vec::new(),
            context,
            limits,
            interrupted: false,
        }
    }

    /// Replaces the cancellation context for subsequent runs.
    pub fn set_context(&mut self, context: Context) {
        self.context = context;
        self.interrupted = false;
    }

    /// Writes a global slot, growing the vector as needed.
    pub fn set_global(&mut self, index: usize, value: Value) {
        if index >= self.globals.len() {
            self.globals.resize(index + 1, Value::Nil);
        }
        self.globals[index] = value;
    }

    /// Reads a global slot.
    pub fn global(&self, index: usize) -> Option<&Value> {
        self.globals.get(index)
    }

    /// Executes a compiled program and returns its result value.
    pub fn run(&mut self, code: Arc<Code>) -> Result<Value> {
        self.interrupted = false;
        if self.globals.len() < code.global_names.len() {
            self.globals.resize(code.global_names.len(), Value::Nil);
        }
        debug!("running {} ({} globals)", code.name, self.globals.len());
        let barrier = self.frames.len();
        self.frames.push(Frame::root(code, self.stack.len()));
        self.execute(barrier)
    }

    /// Invokes a callable value. Re-entrant: native functions may call
    /// back into the machine through this while it is already running.
    pub fn call_value(&mut self, callable: &Value, args: Vec<Value>) -> Result<Value> {
        match callable {
            Value::Closure(closure) => {
                let barrier = self.frames.len();
                self.push_call_frame(Arc::clone(closure), args)?;
                self.execute(barrier)
            }
            Value::Native(native) => {
                let native = Arc::clone(native);
                native.invoke(self, &args)
            }
            Value::Partial(partial) => {
                let partial = Arc::clone(partial);
                self.call_value(partial.callable(), partial.merged_args(args))
            }
            Value::Module(module) => {
                let handler = module
                    .call_handler()
                    .map(Arc::clone)
                    .ok_or_else(|| {
                        Error::type_error(format!("module {} is not callable", module.name()))
                    })?;
                handler.invoke(self, &args)
            }
            other => Err(Error::type_error(format!(
                "{} is not callable",
                other.type_name()
            ))),
        }
    }

    // === Stack helpers ===

    fn push(&mut self, value: Value) -> Result<()> {
        if self.stack.len() >= self.limits.max_stack_depth {
            return Err(Error::runtime(format!(
                "stack limit exceeded ({})",
                self.limits.max_stack_depth
            )));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| Error::runtime("stack underflow"))
    }

    fn pop_many(&mut self, count: usize) -> Result<Vec<Value>> {
        let len = self.stack.len();
        if count > len {
            return Err(Error::runtime("stack underflow"));
        }
        Ok(self.stack.split_off(len - count))
    }

    fn frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty here")
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.frames
            .last_mut()
            .expect("frame stack is never empty here")
    }

    fn name_at(&self, index: u16) -> Result<String> {
        self.frame()
            .code()
            .names
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::runtime("name index out of range"))
    }

    fn poll_cancellation(&mut self) -> Result<()> {
        // Once the interrupt has been raised, polling stays quiet so
        // finally blocks can run to completion.
        if self.interrupted {
            return Ok(());
        }
        if self.context.is_cancelled() {
            self.interrupted = true;
            return Err(Error::interrupted());
        }
        Ok(())
    }

    // === Execution ===

    fn execute(&mut self, barrier: usize) -> Result<Value> {
        let entry_handlers = self.handlers.len();
        loop {
            match self.step(barrier) {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Done(value)) => return Ok(value),
                Err(err) => {
                    if let Err(escaped) = self.raise(err, entry_handlers) {
                        while self.frames.len() > barrier {
                            let frame = self.frames.pop().expect("frame");
                            self.stack.truncate(frame.stack_base);
                        }
                        self.handlers.truncate(entry_handlers);
                        return Err(escaped);
                    }
                }
            }
        }
    }

    fn step(&mut self, barrier: usize) -> Result<StepOutcome> {
        let (op, a, b) = {
            let frame = self.frame_mut();
            let pc = frame.ip;
            frame.last_pc = pc;
            let word = *frame
                .code()
                .instructions
                .get(pc)
                .ok_or_else(|| Error::runtime("instruction pointer out of bounds"))?;
            let op = Opcode::from_word(word)
                .ok_or_else(|| Error::runtime(format!("invalid opcode word {word:#06x}")))?;
            let count = op.operand_count();
            let instructions = &frame.code().instructions;
            if count > 0 && pc + count >= instructions.len() {
                return Err(Error::runtime("truncated instruction"));
            }
            let a = if count >= 1 { instructions[pc + 1] } else { 0 };
            let b = if count >= 2 { instructions[pc + 2] } else { 0 };
            let frame = self.frame_mut();
            frame.ip = pc + 1 + count;
            (op, a, b)
        };
        trace!("pc={} op={}", self.frame().last_pc, op.name());

        match op {
            Opcode::Nop => {}
            Opcode::Halt => {
                let base = self.frame().stack_base;
                let value = if self.stack.len() > base {
                    self.pop()?
                } else {
                    Value::Nil
                };
                while self.frames.len() > barrier {
                    let frame = self.frames.pop().expect("frame");
                    self.stack.truncate(frame.stack_base);
                }
                return Ok(StepOutcome::Done(value));
            }
            Opcode::PopTop => {
                self.pop()?;
            }
            Opcode::Copy => {
                let offset = a as usize;
                let index = self
                    .stack
                    .len()
                    .checked_sub(1 + offset)
                    .ok_or_else(|| Error::runtime("stack underflow"))?;
                let value = self.stack[index].clone();
                self.push(value)?;
            }
            Opcode::Swap => {
                let offset = a as usize;
                let len = self.stack.len();
                if offset > 0 {
                    let index = len
                        .checked_sub(1 + offset)
                        .ok_or_else(|| Error::runtime("stack underflow"))?;
                    self.stack.swap(len - 1, index);
                }
            }
            Opcode::LoadConst => {
                let constant = self
                    .frame()
                    .code()
                    .constants
                    .get(a as usize)
                    .cloned()
                    .ok_or_else(|| Error::runtime("constant index out of range"))?;
                self.push(constant_value(&constant))?;
            }
            Opcode::Nil => self.push(Value::Nil)?,
            Opcode::True => self.push(Value::Bool(true))?,
            Opcode::False => self.push(Value::Bool(false))?,
            Opcode::LoadGlobal => {
                let value = self
                    .globals
                    .get(a as usize)
                    .cloned()
                    .ok_or_else(|| Error::runtime("global index out of range"))?;
                self.push(value)?;
            }
            Opcode::StoreGlobal => {
                let value = self.pop()?;
                self.set_global(a as usize, value);
            }
            Opcode::LoadFast => {
                let value = {
                    let frame = self.frame();
                    let slot = frame
                        .locals
                        .get(a as usize)
                        .ok_or_else(|| Error::runtime("local index out of range"))?;
                    match slot {
                        Value::Cell(cell) => cell.get(),
                        other => other.clone(),
                    }
                };
                self.push(value)?;
            }
            Opcode::StoreFast => {
                let value = self.pop()?;
                let frame = self.frame_mut();
                let slot = frame
                    .locals
                    .get_mut(a as usize)
                    .ok_or_else(|| Error::runtime("local index out of range"))?;
                match slot {
                    Value::Cell(cell) => cell.set(value),
                    other => *other = value,
                }
            }
            Opcode::LoadFree => {
                let cell = self.free_cell(a)?;
                self.push(cell.get())?;
            }
            Opcode::StoreFree => {
                let value = self.pop()?;
                let cell = self.free_cell(a)?;
                cell.set(value);
            }
            Opcode::LoadAttr => {
                let name = self.name_at(a)?;
                let object = self.pop()?;
                match get_attr(&object, &name) {
                    Some(value) => self.push(value)?,
                    None => {
                        return Err(Error::type_error(format!(
                            "{} has no attribute {name:?}",
                            object.type_name()
                        )))
                    }
                }
            }
            Opcode::LoadAttrOrNil => {
                let name = self.name_at(a)?;
                let object = self.pop()?;
                let value = get_attr(&object, &name).unwrap_or(Value::Nil);
                self.push(value)?;
            }
            Opcode::StoreAttr => {
                let name = self.name_at(a)?;
                let value = self.pop()?;
                let object = self.pop()?;
                set_attr(&object, &name, value)?;
            }
            Opcode::BinarySubscr => {
                let index = self.pop()?;
                let object = self.pop()?;
                let value = get_index(&object, &index)?;
                self.push(value)?;
            }
            Opcode::StoreSubscr => {
                let value = self.pop()?;
                let index = self.pop()?;
                let object = self.pop()?;
                set_index(&object, &index, value)?;
            }
            Opcode::Slice => {
                let stop = self.pop()?;
                let start = self.pop()?;
                let object = self.pop()?;
                let value = get_slice(&object, &start, &stop)?;
                self.push(value)?;
            }
            Opcode::BinaryOp => {
                let kind = BinaryOpKind::from_word(a)
                    .ok_or_else(|| Error::runtime("invalid binary operator"))?;
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                let value = binary(kind, &lhs, &rhs)?;
                self.push(value)?;
            }
            Opcode::CompareOp => {
                let kind = CompareOpKind::from_word(a)
                    .ok_or_else(|| Error::runtime("invalid comparison operator"))?;
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                let value = compare(kind, &lhs, &rhs)?;
                self.push(value)?;
            }
            Opcode::UnaryNegative => {
                let operand = self.pop()?;
                let value = unary_negative(&operand)?;
                self.push(value)?;
            }
            Opcode::UnaryNot => {
                let operand = self.pop()?;
                let value = unary_not(&operand);
                self.push(value)?;
            }
            Opcode::ContainsOp => {
                let container = self.pop()?;
                let item = self.pop()?;
                let value = contains(&container, &item)?;
                self.push(value)?;
            }
            Opcode::Length => {
                let operand = self.pop()?;
                let value = length(&operand)?;
                self.push(value)?;
            }
            Opcode::JumpForward => {
                self.frame_mut().ip += a as usize;
            }
            Opcode::JumpBackward => {
                self.poll_cancellation()?;
                let frame = self.frame_mut();
                frame.ip = frame
                    .ip
                    .checked_sub(a as usize)
                    .ok_or_else(|| Error::runtime("backward jump out of bounds"))?;
            }
            Opcode::PopJumpForwardIfTrue
            | Opcode::PopJumpForwardIfFalse
            | Opcode::PopJumpForwardIfNil
            | Opcode::PopJumpForwardIfNotNil => {
                let value = self.pop()?;
                let jump = match op {
                    Opcode::PopJumpForwardIfTrue => value.truthy(),
                    Opcode::PopJumpForwardIfFalse => !value.truthy(),
                    Opcode::PopJumpForwardIfNil => value.is_nil(),
                    _ => !value.is_nil(),
                };
                if jump {
                    self.frame_mut().ip += a as usize;
                }
            }
            Opcode::BuildList => {
                let items = self.pop_many(a as usize)?;
                self.push(Value::list(items))?;
            }
            Opcode::BuildMap => {
                let flat = self.pop_many(2 * a as usize)?;
                let mut entries = BTreeMap::new();
                for pair in flat.chunks(2) {
                    let key = pair[0].as_str().map_err(|_| {
                        Error::type_error(format!(
                            "map keys must be string, got {}",
                            pair[0].type_name()
                        ))
                    })?;
                    entries.insert(key.to_string(), pair[1].clone());
                }
                self.push(Value::map(entries))?;
            }
            Opcode::BuildString => {
                let parts = self.pop_many(a as usize)?;
                let mut text = String::new();
                for part in parts {
                    text.push_str(&part.to_string());
                }
                self.push(Value::string(text))?;
            }
            Opcode::ListAppend => {
                let value = self.pop()?;
                match self.stack.last() {
                    Some(Value::List(items)) => items.write().push(value),
                    _ => return Err(Error::runtime("list append expects a list")),
                }
            }
            Opcode::ListExtend => {
                let value = self.pop()?;
                let mut iter = ValueIterator::new(&value)?;
                let mut extension = Vec::new();
                while let Some((key, item)) = iter.next_entry() {
                    extension.push(iter.primary(key, item));
                }
                match self.stack.last() {
                    Some(Value::List(items)) => items.write().extend(extension),
                    _ => return Err(Error::runtime("list extend expects a list")),
                }
            }
            Opcode::MapMerge => {
                let other = match self.pop()? {
                    Value::Map(other) => other.read().clone(),
                    other => {
                        return Err(Error::type_error(format!(
                            "cannot merge {} into a map",
                            other.type_name()
                        )))
                    }
                };
                match self.stack.last() {
                    Some(Value::Map(entries)) => entries.write().extend(other),
                    _ => return Err(Error::runtime("map merge expects a map")),
                }
            }
            Opcode::MapSet => {
                let value = self.pop()?;
                let key = self.pop()?;
                let key = key.as_str().map_err(|_| {
                    Error::type_error(format!("map keys must be string, got {}", key.type_name()))
                })?;
                match self.stack.last() {
                    Some(Value::Map(entries)) => {
                        entries.write().insert(key.to_string(), value);
                    }
                    _ => return Err(Error::runtime("map set expects a map")),
                }
            }
            Opcode::Unpack => {
                let value = self.pop()?;
                let targets = a as usize;
                let items = match &value {
                    Value::List(items) => items.read().clone(),
                    other => {
                        return Err(Error::type_error(format!(
                            "cannot unpack {}",
                            other.type_name()
                        )))
                    }
                };
                if items.len() != targets {
                    return Err(Error::value(format!(
                        "cannot unpack {} values into {targets} targets",
                        items.len()
                    )));
                }
                for item in items.into_iter().rev() {
                    self.push(item)?;
                }
            }
            Opcode::GetIter => {
                let value = self.pop()?;
                let iterator = match value {
                    Value::Iterator(_) => value,
                    other => Value::Iterator(Arc::new(RwLock::new(ValueIterator::new(&other)?))),
                };
                self.push(iterator)?;
            }
            Opcode::ForIter => {
                let iterator = match self.stack.last() {
                    Some(Value::Iterator(arc)) => Arc::clone(arc),
                    _ => return Err(Error::runtime("for-iter expects an iterator")),
                };
                let entry = iterator.write().next_entry();
                match entry {
                    Some((key, value)) => {
                        if b == 1 {
                            let primary = iterator.read().primary(key, value);
                            self.push(primary)?;
                        } else {
                            self.push(value)?;
                            self.push(key)?;
                        }
                    }
                    None => {
                        self.pop()?;
                        self.frame_mut().ip += a as usize;
                    }
                }
            }
            Opcode::Range => {
                let stop = self.pop()?.as_int()?;
                let start = self.pop()?.as_int()?;
                let range = RangeValue::new(start, stop, 1)?;
                self.push(Value::Range(Arc::new(range)))?;
            }
            Opcode::Call => {
                self.poll_cancellation()?;
                let args = self.pop_many(a as usize)?;
                let callee = self.pop()?;
                self.invoke_on_stack(callee, args)?;
            }
            Opcode::CallSpread => {
                self.poll_cancellation()?;
                let spread = self.pop()?;
                let callee = self.pop()?;
                let args = match spread {
                    Value::List(items) => items.read().clone(),
                    other => {
                        return Err(Error::type_error(format!(
                            "spread call expects a list, got {}",
                            other.type_name()
                        )))
                    }
                };
                self.invoke_on_stack(callee, args)?;
            }
            Opcode::ReturnValue => {
                let value = self.pop()?;
                if let Some(done) = self.perform_return(value, barrier)? {
                    return Ok(StepOutcome::Done(done));
                }
            }
            Opcode::Partial => {
                let bound = self.pop_many(a as usize)?;
                let callee = self.pop()?;
                self.push(Value::Partial(Arc::new(Partial::new(callee, bound))))?;
            }
            Opcode::MakeCell => {
                let cell = if b == 0 {
                    let frame = self.frame_mut();
                    let slot = frame
                        .locals
                        .get_mut(a as usize)
                        .ok_or_else(|| Error::runtime("local index out of range"))?;
                    match slot {
                        Value::Cell(cell) => cell.clone(),
                        other => {
                            let cell = Cell::new(std::mem::take(other));
                            *other = Value::Cell(cell.clone());
                            cell
                        }
                    }
                } else {
                    self.free_cell(a)?
                };
                self.push(Value::Cell(cell))?;
            }
            Opcode::LoadClosure => {
                let function = self
                    .frame()
                    .code()
                    .functions
                    .get(a as usize)
                    .cloned()
                    .ok_or_else(|| Error::runtime("function index out of range"))?;
                let raw = self.pop_many(b as usize)?;
                let mut captures = Vec::with_capacity(raw.len());
                for value in raw {
                    match value {
                        Value::Cell(cell) => captures.push(cell),
                        _ => return Err(Error::runtime("closure capture expects a cell")),
                    }
                }
                self.push(Value::Closure(Arc::new(Closure::new(function, captures))))?;
            }
            Opcode::PushExcept => {
                let base = self.frame().ip;
                let catch_pc = (a != NO_TARGET).then(|| base + a as usize);
                let finally_pc = (b != NO_TARGET).then(|| base + b as usize);
                self.handlers.push(Handler::new(
                    self.frames.len() - 1,
                    self.stack.len(),
                    catch_pc,
                    finally_pc,
                ));
            }
            Opcode::PopExcept => {
                let mut handler = self
                    .handlers
                    .pop()
                    .ok_or_else(|| Error::runtime("handler stack underflow"))?;
                // A protected body that completes normally still owes its
                // finally block a visit.
                if let Some(finally_pc) = handler.finally_pc {
                    self.stack.truncate(handler.stack_depth);
                    handler.state = HandlerState::Finally;
                    handler.pending = Pending::None;
                    self.handlers.push(handler);
                    self.frame_mut().ip = finally_pc;
                }
            }
            Opcode::Throw => {
                let value = self.pop()?;
                return Err(value_to_error(value));
            }
            Opcode::EndFinally => {
                let handler = self
                    .handlers
                    .pop()
                    .ok_or_else(|| Error::runtime("handler stack underflow"))?;
                match handler.pending {
                    Pending::None => {}
                    Pending::Exception(err) => return Err(err),
                    Pending::Return(value) => {
                        if let Some(done) = self.perform_return(value, barrier)? {
                            return Ok(StepOutcome::Done(done));
                        }
                    }
                }
            }
        }
        Ok(StepOutcome::Continue)
    }

    fn free_cell(&self, index: u16) -> Result<Cell> {
        let frame = self.frame();
        let closure = frame
            .closure()
            .ok_or_else(|| Error::runtime("no enclosing closure"))?;
        closure
            .capture(index as usize)
            .cloned()
            .ok_or_else(|| Error::runtime("free variable index out of range"))
    }

    /// Completes a return from the current frame, first diverting through
    /// any finally blocks the frame still owes.
    fn perform_return(&mut self, value: Value, barrier: usize) -> Result<Option<Value>> {
        let current = self.frames.len() - 1;
        loop {
            let matches = matches!(
                self.handlers.last(),
                Some(handler) if handler.frame_index == current
            );
            if !matches {
                break;
            }
            let (state, finally_pc, depth) = {
                let handler = self.handlers.last().expect("handler");
                (handler.state, handler.finally_pc, handler.stack_depth)
            };
            match (state, finally_pc) {
                (HandlerState::Try | HandlerState::Catch, Some(finally_pc)) => {
                    let handler = self.handlers.last_mut().expect("handler");
                    handler.state = HandlerState::Finally;
                    handler.pending = Pending::Return(value);
                    self.stack.truncate(depth);
                    self.frame_mut().ip = finally_pc;
                    return Ok(None);
                }
                _ => {
                    // Catch-only handlers are simply discarded; a return
                    // inside a running finally overrides its pending
                    // completion.
                    self.handlers.pop();
                }
            }
        }

        let frame = self.frames.pop().expect("frame");
        self.stack.truncate(frame.stack_base);
        if self.frames.len() == barrier {
            return Ok(Some(value));
        }
        self.push(value)?;
        Ok(None)
    }

    /// Injects an error into the exception state machine. `Ok` means a
    /// handler took control; `Err` means the error escapes this
    /// execution.
    fn raise(&mut self, err: Error, entry_handlers: usize) -> Result<()> {
        let err = self.annotate(err);
        debug!("raising {err}");
        let mut err = err;
        loop {
            if self.handlers.len() <= entry_handlers {
                return Err(err);
            }
            let (frame_index, state, catch_pc, finally_pc, depth) = {
                let handler = self.handlers.last().expect("handler");
                (
                    handler.frame_index,
                    handler.state,
                    handler.catch_pc,
                    handler.finally_pc,
                    handler.stack_depth,
                )
            };
            match state {
                HandlerState::Finally => {
                    // The finally block itself threw: its exception
                    // replaces whatever was pending, and unwinding
                    // continues outward.
                    self.handlers.pop();
                }
                HandlerState::Try | HandlerState::Catch => {
                    while self.frames.len() - 1 > frame_index {
                        let frame = self.frames.pop().expect("frame");
                        self.stack.truncate(frame.stack_base);
                    }
                    self.stack.truncate(depth);

                    if state == HandlerState::Try {
                        if let Some(catch_pc) = catch_pc {
                            if finally_pc.is_some() {
                                let handler = self.handlers.last_mut().expect("handler");
                                handler.state = HandlerState::Catch;
                            } else {
                                self.handlers.pop();
                            }
                            self.push(Value::error(err))?;
                            self.frame_mut().ip = catch_pc;
                            return Ok(());
                        }
                    }

                    // Either there is no catch block, or the catch block
                    // is the code that threw; route through finally with
                    // the exception pending.
                    let finally_pc =
                        finally_pc.expect("handler carries a catch or a finally block");
                    let handler = self.handlers.last_mut().expect("handler");
                    handler.state = HandlerState::Finally;
                    handler.pending = Pending::Exception(err);
                    self.frame_mut().ip = finally_pc;
                    return Ok(());
                }
            }
        }
    }

    /// Attaches the raise-site location and a stack trace, unless the
    /// error already carries them (a re-raise keeps the original trace).
    fn annotate(&self, err: Error) -> Error {
        let mut err = err;
        if err.location().is_none() {
            if let Some(frame) = self.frames.last() {
                if let Some(position) = frame.code().position_at(frame.last_pc) {
                    err = err
                        .with_location(Location::new(frame.code().file.clone(), position));
                }
            }
        }
        if !err.has_stack() {
            let stack: Vec<TraceFrame> = self
                .frames
                .iter()
                .rev()
                .map(|frame| TraceFrame {
                    function: frame.function_name().to_string(),
                    location: frame
                        .code()
                        .position_at(frame.last_pc)
                        .map(|position| Location::new(frame.code().file.clone(), position)),
                })
                .collect();
            err = err.with_stack(stack);
        }
        err
    }

    /// Dispatches a call whose result lands on the data stack. Closures
    /// push a frame; everything else completes immediately.
    fn invoke_on_stack(&mut self, callee: Value, args: Vec<Value>) -> Result<()> {
        match callee {
            Value::Closure(closure) => self.push_call_frame(closure, args),
            Value::Native(native) => {
                let result = native.invoke(self, &args)?;
                self.push(result)
            }
            Value::Partial(partial) => {
                let merged = partial.merged_args(args);
                self.invoke_on_stack(partial.callable().clone(), merged)
            }
            Value::Module(module) => {
                let handler = module
                    .call_handler()
                    .map(Arc::clone)
                    .ok_or_else(|| {
                        Error::type_error(format!("module {} is not callable", module.name()))
                    })?;
                let result = handler.invoke(self, &args)?;
                self.push(result)
            }
            other => Err(Error::type_error(format!(
                "{} is not callable",
                other.type_name()
            ))),
        }
    }

    /// Checks arity, applies defaults, collects the rest parameter, and
    /// pushes the callee frame.
    fn push_call_frame(&mut self, closure: Arc<Closure>, mut args: Vec<Value>) -> Result<()> {
        let function = Arc::clone(closure.function());
        let params = function.params.len();
        let required = function.required_params();
        let name = function.display_name();

        if args.len() < required {
            let missing: Vec<String> = function.params[args.len()..required]
                .iter()
                .map(|p| format!("{p:?}"))
                .collect();
            let plural = if missing.len() == 1 { "" } else { "s" };
            return Err(Error::args(format!(
                "{name}: missing required argument{plural}: {}",
                missing.join(", ")
            )));
        }
        if args.len() > params && function.rest.is_none() {
            if function.defaults.is_empty() {
                let plural = if params == 1 { "" } else { "s" };
                return Err(Error::args(format!(
                    "{name}: expected {params} argument{plural}, got {}",
                    args.len()
                )));
            }
            return Err(Error::args(format!(
                "{name}: expected at most {params} arguments, got {}",
                args.len()
            )));
        }

        while args.len() < params {
            let default = &function.defaults[args.len() - required];
            args.push(constant_value(default));
        }
        let rest = function
            .rest
            .as_ref()
            .map(|_| Value::list(args.split_off(params)));

        if self.frames.len() >= self.limits.max_call_depth {
            return Err(Error::runtime(format!(
                "max call depth exceeded ({})",
                self.limits.max_call_depth
            )));
        }

        let needed = params + usize::from(function.rest.is_some());
        let mut locals = vec![Value::Nil; function.code.local_count.max(needed)];
        for (slot, arg) in locals.iter_mut().zip(args) {
            *slot = arg;
        }
        if let Some(rest_value) = rest {
            locals[params] = rest_value;
        }

        self.frames
            .push(Frame::call(closure, locals, self.stack.len()));
        Ok(())
    }
}

impl quill_object::CallContext for Machine {
    fn context(&self) -> &Context {
        &self.context
    }

    fn call(&mut self, callable: &Value, args: Vec<Value>) -> Result<Value> {
        self.call_value(callable, args)
    }
}

fn constant_value(constant: &Constant) -> Value {
    match constant {
        Constant::Nil => Value::Nil,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int(i) => Value::Int(*i),
        Constant::Float(x) => Value::Float(*x),
        Constant::String(s) => Value::String(Arc::clone(s)),
    }
}

/// Turns a thrown value into the active exception. Non-error values are
/// wrapped as runtime errors carrying their display form.
fn value_to_error(value: Value) -> Error {
    match value {
        Value::Error(err) => (*err).clone(),
        other => Error::runtime(other.to_string()),
    }
}
