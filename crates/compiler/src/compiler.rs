//! AST-to-bytecode lowering.
//!
//! One [`Unit`] per function being compiled; the unit stack mirrors the
//! lexical nesting of function literals. Jumps are emitted with
//! placeholder operands and patched once their targets are known; loops
//! keep patch lists for `break`/`continue`.

use crate::suggest::best_match;
use crate::symbol_table::{Scope, Symbol, SymbolTable, BLANK};
use indexmap::IndexSet;
use log::debug;
use quill_bytecode::{Code, Constant, Function, LineEntry, Opcode, NO_TARGET};
use quill_core::{Error, Location, Position, Result};
use quill_object::{BinaryOpKind, CompareOpKind};
use quill_syntax::{
    AssignOp, AssignTarget, Block, CallArg, Expr, FunctionLit, InfixOp, ListItem, LogicalOp,
    MapEntry, PrefixOp, Program, Stmt, TemplatePart,
};
use std::sync::Arc;

struct LoopCtx {
    break_patches: Vec<usize>,
    continue_patches: Vec<usize>,
    /// Set when `continue` can jump straight back to the loop head.
    continue_backward_target: Option<usize>,
    /// Try-nesting depth when the loop was entered. A break or continue
    /// must not jump across an exception handler, so the depths have to
    /// match at the jump site.
    try_depth: usize,
}

struct Unit {
    name: String,
    table: SymbolTable,
    function_table: SymbolTable,
    instructions: Vec<u16>,
    constants: Vec<Constant>,
    names: IndexSet<String>,
    functions: Vec<Arc<Function>>,
    lines: Vec<LineEntry>,
    loops: Vec<LoopCtx>,
    try_depth: usize,
}

impl Unit {
    fn new(name: String, table: SymbolTable) -> Self {
        Self {
            name,
            function_table: table.clone(),
            table,
            instructions: Vec::new(),
            constants: Vec::new(),
            names: IndexSet::new(),
            functions: Vec::new(),
            lines: Vec::new(),
            loops: Vec::new(),
            try_depth: 0,
        }
    }
}

/// Compiles parsed programs against a (possibly persistent) global scope.
pub struct Compiler {
    file: Option<String>,
    root: SymbolTable,
    units: Vec<Unit>,
}

impl Compiler {
    /// Creates a compiler with a fresh global scope.
    pub fn new(file: Option<String>) -> Self {
        Self::with_table(file, SymbolTable::new_root())
    }

    /// Creates a compiler over an existing global scope. Used by hosts
    /// that keep definitions alive across evaluations.
    pub fn with_table(file: Option<String>, root: SymbolTable) -> Self {
        Self {
            file,
            root,
            units: Vec::new(),
        }
    }

    /// The global symbol table this compiler resolves against.
    pub fn symbol_table(&self) -> SymbolTable {
        self.root.clone()
    }

    /// Compiles a program into a root `Code` object.
    pub fn compile_program(&mut self, program: &Program) -> Result<Arc<Code>> {
        self.units
            .push(Unit::new("<main>".to_string(), self.root.clone()));

        self.compile_statements_with_tail(&program.statements)?;
        self.emit(Opcode::Halt);

        let unit = self.units.pop().expect("root unit");
        let code = Arc::new(Code {
            name: unit.name,
            file: self.file.clone(),
            instructions: unit.instructions,
            constants: unit.constants,
            names: unit.names.into_iter().collect(),
            functions: unit.functions,
            local_count: 0,
            free_names: Vec::new(),
            global_names: self.root.defined_names(),
            lines: unit.lines,
        });
        debug!("compiled {}:\n{}", code.name, code.disassemble());
        Ok(code)
    }

    // === Emission helpers ===

    fn unit(&mut self) -> &mut Unit {
        self.units.last_mut().expect("unit stack is never empty")
    }

    fn pc(&mut self) -> usize {
        self.unit().instructions.len()
    }

    fn emit(&mut self, op: Opcode) -> usize {
        let pc = self.pc();
        self.unit().instructions.push(op.word());
        pc
    }

    fn emit1(&mut self, op: Opcode, operand: u16) -> usize {
        let pc = self.emit(op);
        self.unit().instructions.push(operand);
        pc
    }

    fn emit2(&mut self, op: Opcode, a: u16, b: u16) -> usize {
        let pc = self.emit(op);
        let unit = self.unit();
        unit.instructions.push(a);
        unit.instructions.push(b);
        pc
    }

    fn mark_position(&mut self, position: Position) {
        let pc = self.pc() as u32;
        let unit = self.unit();
        if let Some(last) = unit.lines.last_mut() {
            if last.pc == pc {
                last.position = position;
                return;
            }
            if last.position == position {
                return;
            }
        }
        unit.lines.push(LineEntry { pc, position });
    }

    fn location(&self, position: &Position) -> Location {
        Location::new(self.file.clone(), position.clone())
    }

    fn operand_u16(&self, value: usize, what: &str, position: &Position) -> Result<u16> {
        u16::try_from(value)
            .map_err(|_| Error::syntax(format!("{what} overflow")).with_location(self.location(position)))
    }

    fn add_constant(&mut self, constant: Constant, position: &Position) -> Result<u16> {
        let unit = self.unit();
        if let Some(existing) = unit.constants.iter().position(|c| c == &constant) {
            return Ok(existing as u16);
        }
        unit.constants.push(constant);
        self.operand_u16(self.units.last().expect("unit").constants.len() - 1, "constant pool", position)
    }

    fn add_name(&mut self, name: &str, position: &Position) -> Result<u16> {
        let (index, _) = self.unit().names.insert_full(name.to_string());
        self.operand_u16(index, "name pool", position)
    }

    /// Rewrites the placeholder at `operand_index` so the jump lands on
    /// the current pc. `end` is the pc just past the whole instruction.
    fn patch_forward(&mut self, operand_index: usize, end: usize, position: &Position) -> Result<()> {
        let target = self.pc();
        let offset = target
            .checked_sub(end)
            .expect("forward jump target precedes instruction end");
        let offset = u16::try_from(offset)
            .map_err(|_| Error::syntax("jump too large").with_location(self.location(position)))?;
        self.unit().instructions[operand_index] = offset;
        Ok(())
    }

    fn emit_jump_backward(&mut self, target: usize, position: &Position) -> Result<()> {
        let end = self.pc() + 2;
        let offset = end
            .checked_sub(target)
            .expect("backward jump target follows instruction end");
        let offset = u16::try_from(offset)
            .map_err(|_| Error::syntax("jump too large").with_location(self.location(position)))?;
        self.emit1(Opcode::JumpBackward, offset);
        Ok(())
    }

    fn emit_load(&mut self, symbol: &Symbol) {
        match symbol.scope {
            Scope::Global => self.emit1(Opcode::LoadGlobal, symbol.index),
            Scope::Local => self.emit1(Opcode::LoadFast, symbol.index),
            Scope::Free => self.emit1(Opcode::LoadFree, symbol.index),
        };
    }

    fn emit_store(&mut self, symbol: &Symbol) {
        if symbol.index == u16::MAX {
            // The blank identifier: discard the value.
            self.emit(Opcode::PopTop);
            return;
        }
        match symbol.scope {
            Scope::Global => self.emit1(Opcode::StoreGlobal, symbol.index),
            Scope::Local => self.emit1(Opcode::StoreFast, symbol.index),
            Scope::Free => self.emit1(Opcode::StoreFree, symbol.index),
        };
    }

    // === Statements ===

    /// Compiles statements; the last one, when it is an expression
    /// statement, leaves its value on the stack. Returns whether a tail
    /// value is present.
    fn compile_statements_with_tail(&mut self, statements: &[Stmt]) -> Result<bool> {
        let Some((last, init)) = statements.split_last() else {
            return Ok(false);
        };
        for stmt in init {
            self.compile_statement(stmt)?;
        }
        if let Stmt::Expr { expr } = last {
            self.mark_position(expr.position());
            self.compile_expression(expr)?;
            Ok(true)
        } else {
            self.compile_statement(last)?;
            Ok(false)
        }
    }

    fn compile_block(&mut self, block: &Block) -> Result<()> {
        let outer = self.unit().table.clone();
        self.unit().table = outer.push_block();
        let result = block
            .statements
            .iter()
            .try_for_each(|stmt| self.compile_statement(stmt));
        self.unit().table = outer;
        result
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> Result<()> {
        self.mark_position(stmt.position());
        match stmt {
            Stmt::Expr { expr } => {
                self.compile_expression(expr)?;
                self.emit(Opcode::PopTop);
                Ok(())
            }
            Stmt::Let {
                names,
                value,
                constant,
                position,
            } => self.compile_let(names, value, *constant, position),
            Stmt::Assign {
                target,
                op,
                value,
                position,
            } => self.compile_assign(target, *op, value, position),
            Stmt::If {
                cond,
                then_block,
                else_block,
                ..
            } => self.compile_if(cond, then_block, else_block.as_ref()),
            Stmt::ForIn {
                vars,
                iterable,
                body,
                position,
            } => self.compile_for_in(vars, iterable, body, position),
            Stmt::ForCond {
                init,
                cond,
                post,
                body,
                position,
            } => self.compile_for_cond(
                init.as_deref(),
                cond.as_ref(),
                post.as_deref(),
                body,
                position,
            ),
            Stmt::Break { position } => self.compile_break(position),
            Stmt::Continue { position } => self.compile_continue(position),
            Stmt::Return { value, position } => {
                if self.units.len() == 1 {
                    return Err(Error::syntax("return outside of function")
                        .with_location(self.location(position)));
                }
                match value {
                    Some(expr) => self.compile_expression(expr)?,
                    None => {
                        self.emit(Opcode::Nil);
                    }
                }
                self.emit(Opcode::ReturnValue);
                Ok(())
            }
            Stmt::Try {
                body,
                catch,
                finally,
                position,
            } => self.compile_try(body, catch.as_ref(), finally.as_ref(), position),
            Stmt::Throw { value, .. } => {
                self.compile_expression(value)?;
                self.emit(Opcode::Throw);
                Ok(())
            }
            Stmt::Func {
                name,
                function,
                position,
            } => {
                // Defined before the body compiles so the function can
                // call itself.
                let symbol = self.unit().table.define(name, false)?;
                self.compile_function(function, position)?;
                self.emit_store(&symbol);
                Ok(())
            }
        }
    }

    fn compile_let(
        &mut self,
        names: &[String],
        value: &Expr,
        constant: bool,
        position: &Position,
    ) -> Result<()> {
        self.compile_expression(value)?;
        if names.len() == 1 {
            let symbol = self.unit().table.define(&names[0], constant)?;
            self.emit_store(&symbol);
            return Ok(());
        }
        let count = self.operand_u16(names.len(), "unpack count", position)?;
        self.emit1(Opcode::Unpack, count);
        for name in names {
            let symbol = self.unit().table.define(name, constant)?;
            self.emit_store(&symbol);
        }
        Ok(())
    }

    fn binary_kind(op: InfixOp) -> Option<BinaryOpKind> {
        match op {
            InfixOp::Add => Some(BinaryOpKind::Add),
            InfixOp::Sub => Some(BinaryOpKind::Sub),
            InfixOp::Mul => Some(BinaryOpKind::Mul),
            InfixOp::Div => Some(BinaryOpKind::Div),
            InfixOp::Mod => Some(BinaryOpKind::Mod),
            InfixOp::Pow => Some(BinaryOpKind::Pow),
            InfixOp::BitAnd => Some(BinaryOpKind::BitAnd),
            InfixOp::BitOr => Some(BinaryOpKind::BitOr),
            InfixOp::BitXor => Some(BinaryOpKind::BitXor),
            InfixOp::Shl => Some(BinaryOpKind::Shl),
            InfixOp::Shr => Some(BinaryOpKind::Shr),
            _ => None,
        }
    }

    fn compare_kind(op: InfixOp) -> Option<CompareOpKind> {
        match op {
            InfixOp::Eq => Some(CompareOpKind::Eq),
            InfixOp::NotEq => Some(CompareOpKind::NotEq),
            InfixOp::Lt => Some(CompareOpKind::Lt),
            InfixOp::LtEq => Some(CompareOpKind::LtEq),
            InfixOp::Gt => Some(CompareOpKind::Gt),
            InfixOp::GtEq => Some(CompareOpKind::GtEq),
            _ => None,
        }
    }

    fn assign_binary_kind(op: AssignOp) -> BinaryOpKind {
        match op {
            AssignOp::Add => BinaryOpKind::Add,
            AssignOp::Sub => BinaryOpKind::Sub,
            AssignOp::Mul => BinaryOpKind::Mul,
            AssignOp::Div => BinaryOpKind::Div,
            AssignOp::Set => unreachable!("plain assignment has no operator"),
        }
    }

    fn compile_assign(
        &mut self,
        target: &AssignTarget,
        op: AssignOp,
        value: &Expr,
        position: &Position,
    ) -> Result<()> {
        match target {
            AssignTarget::Ident { name, .. } => {
                if name == BLANK {
                    // Write-only sink.
                    self.compile_expression(value)?;
                    self.emit(Opcode::PopTop);
                    return Ok(());
                }
                let symbol = self
                    .unit()
                    .table
                    .resolve(name)
                    .ok_or_else(|| self.undefined(name, position))?;
                if symbol.constant {
                    return Err(Error::syntax(format!("cannot assign to constant {name:?}"))
                        .with_location(self.location(position)));
                }
                if op == AssignOp::Set {
                    self.compile_expression(value)?;
                } else {
                    self.emit_load(&symbol);
                    self.compile_expression(value)?;
                    self.emit1(Opcode::BinaryOp, Self::assign_binary_kind(op).word());
                }
                self.emit_store(&symbol);
                Ok(())
            }
            AssignTarget::Index { object, index, .. } => {
                self.compile_expression(object)?;
                self.compile_expression(index)?;
                if op == AssignOp::Set {
                    self.compile_expression(value)?;
                } else {
                    self.emit1(Opcode::Copy, 1);
                    self.emit1(Opcode::Copy, 1);
                    self.emit(Opcode::BinarySubscr);
                    self.compile_expression(value)?;
                    self.emit1(Opcode::BinaryOp, Self::assign_binary_kind(op).word());
                }
                self.emit(Opcode::StoreSubscr);
                Ok(())
            }
            AssignTarget::Attr {
                object,
                name,
                position: attr_position,
            } => {
                let name_index = self.add_name(name, attr_position)?;
                self.compile_expression(object)?;
                if op == AssignOp::Set {
                    self.compile_expression(value)?;
                } else {
                    self.emit1(Opcode::Copy, 0);
                    self.emit1(Opcode::LoadAttr, name_index);
                    self.compile_expression(value)?;
                    self.emit1(Opcode::BinaryOp, Self::assign_binary_kind(op).word());
                }
                self.emit1(Opcode::StoreAttr, name_index);
                Ok(())
            }
        }
    }

    fn compile_if(
        &mut self,
        cond: &Expr,
        then_block: &Block,
        else_block: Option<&Block>,
    ) -> Result<()> {
        let position = cond.position();
        self.compile_expression(cond)?;
        let else_jump = self.emit1(Opcode::PopJumpForwardIfFalse, 0);
        self.compile_block(then_block)?;
        match else_block {
            Some(else_block) => {
                let end_jump = self.emit1(Opcode::JumpForward, 0);
                self.patch_forward(else_jump + 1, else_jump + 2, &position)?;
                self.compile_block(else_block)?;
                self.patch_forward(end_jump + 1, end_jump + 2, &position)?;
            }
            None => {
                self.patch_forward(else_jump + 1, else_jump + 2, &position)?;
            }
        }
        Ok(())
    }

    fn compile_for_in(
        &mut self,
        vars: &[String],
        iterable: &Expr,
        body: &Block,
        position: &Position,
    ) -> Result<()> {
        if vars.len() > 2 {
            return Err(Error::syntax("for-in accepts at most two loop variables")
                .with_location(self.location(position)));
        }
        self.compile_expression(iterable)?;
        self.emit(Opcode::GetIter);

        let head = self.pc();
        let for_pc = self.emit2(Opcode::ForIter, 0, vars.len() as u16);

        let outer = self.unit().table.clone();
        self.unit().table = outer.push_block();
        for var in vars {
            let symbol = self.unit().table.define(var, false)?;
            self.emit_store(&symbol);
        }

        let try_depth = self.unit().try_depth;
        self.unit().loops.push(LoopCtx {
            break_patches: Vec::new(),
            continue_patches: Vec::new(),
            continue_backward_target: Some(head),
            try_depth,
        });
        let body_result = body
            .statements
            .iter()
            .try_for_each(|stmt| self.compile_statement(stmt));
        self.unit().table = outer;
        body_result?;

        self.emit_jump_backward(head, position)?;
        // Exhaustion path: the VM pops the iterator before jumping here.
        self.patch_forward(for_pc + 1, for_pc + 3, position)?;

        let ctx = self.unit().loops.pop().expect("loop context");
        debug_assert!(ctx.continue_patches.is_empty());
        if !ctx.break_patches.is_empty() {
            // Breaks arrive with the iterator still on the stack.
            let done_jump = self.emit1(Opcode::JumpForward, 0);
            for operand in ctx.break_patches {
                self.patch_forward(operand, operand + 1, position)?;
            }
            self.emit(Opcode::PopTop);
            self.patch_forward(done_jump + 1, done_jump + 2, position)?;
        }
        Ok(())
    }

    fn compile_for_cond(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &Block,
        position: &Position,
    ) -> Result<()> {
        let outer = self.unit().table.clone();
        self.unit().table = outer.push_block();

        let result = (|| -> Result<()> {
            if let Some(init) = init {
                self.compile_statement(init)?;
            }
            let head = self.pc();
            let exit_jump = match cond {
                Some(cond) => {
                    self.compile_expression(cond)?;
                    Some(self.emit1(Opcode::PopJumpForwardIfFalse, 0))
                }
                None => None,
            };

            let try_depth = self.unit().try_depth;
            self.unit().loops.push(LoopCtx {
                break_patches: Vec::new(),
                continue_patches: Vec::new(),
                continue_backward_target: if post.is_none() { Some(head) } else { None },
                try_depth,
            });
            self.compile_block(body)?;
            let ctx = self.unit().loops.pop().expect("loop context");

            // `continue` targets the post statement when one exists.
            for operand in ctx.continue_patches {
                self.patch_forward(operand, operand + 1, position)?;
            }
            if let Some(post) = post {
                self.compile_statement(post)?;
            }
            self.emit_jump_backward(head, position)?;

            if let Some(exit_jump) = exit_jump {
                self.patch_forward(exit_jump + 1, exit_jump + 2, position)?;
            }
            for operand in ctx.break_patches {
                self.patch_forward(operand, operand + 1, position)?;
            }
            Ok(())
        })();

        self.unit().table = outer;
        result
    }

    fn check_loop_jump(&mut self, what: &str, position: &Position) -> Result<()> {
        let unit_try_depth = self.unit().try_depth;
        let Some(ctx) = self.unit().loops.last() else {
            return Err(Error::syntax(format!("{what} outside of loop"))
                .with_location(self.location(position)));
        };
        if ctx.try_depth != unit_try_depth {
            return Err(
                Error::syntax(format!("{what} across a try block is not supported"))
                    .with_location(self.location(position)),
            );
        }
        Ok(())
    }

    fn compile_break(&mut self, position: &Position) -> Result<()> {
        self.check_loop_jump("break", position)?;
        let jump = self.emit1(Opcode::JumpForward, 0);
        self.unit()
            .loops
            .last_mut()
            .expect("loop context")
            .break_patches
            .push(jump + 1);
        Ok(())
    }

    fn compile_continue(&mut self, position: &Position) -> Result<()> {
        self.check_loop_jump("continue", position)?;
        let ctx = self.unit().loops.last().expect("loop context");
        match ctx.continue_backward_target {
            Some(target) => self.emit_jump_backward(target, position),
            None => {
                let jump = self.emit1(Opcode::JumpForward, 0);
                self.unit()
                    .loops
                    .last_mut()
                    .expect("loop context")
                    .continue_patches
                    .push(jump + 1);
                Ok(())
            }
        }
    }

    fn compile_try(
        &mut self,
        body: &Block,
        catch: Option<&quill_syntax::CatchClause>,
        finally: Option<&Block>,
        position: &Position,
    ) -> Result<()> {
        let push_pc = self.emit2(Opcode::PushExcept, NO_TARGET, NO_TARGET);
        self.unit().try_depth += 1;
        let guarded = self.compile_try_regions(body, catch, finally, position, push_pc);
        self.unit().try_depth -= 1;
        guarded
    }

    fn compile_try_regions(
        &mut self,
        body: &Block,
        catch: Option<&quill_syntax::CatchClause>,
        finally: Option<&Block>,
        position: &Position,
        push_pc: usize,
    ) -> Result<()> {
        self.compile_block(body)?;
        self.emit(Opcode::PopExcept);
        let post_jump = self.emit1(Opcode::JumpForward, 0);

        if let Some(catch) = catch {
            let catch_offset = self.pc() - (push_pc + 3);
            self.unit().instructions[push_pc + 1] =
                u16::try_from(catch_offset).map_err(|_| {
                    Error::syntax("jump too large").with_location(self.location(position))
                })?;

            // The unwinder pushes the thrown error before jumping here.
            let outer = self.unit().table.clone();
            self.unit().table = outer.push_block();
            match &catch.name {
                Some(name) => {
                    let symbol = self.unit().table.define(name, false)?;
                    self.emit_store(&symbol);
                }
                None => {
                    self.emit(Opcode::PopTop);
                }
            }
            let body_result = catch
                .body
                .statements
                .iter()
                .try_for_each(|stmt| self.compile_statement(stmt));
            self.unit().table = outer;
            body_result?;
            if finally.is_some() {
                // Hands the handler over to its Finally state before the
                // catch body falls through into the finally region.
                self.emit(Opcode::PopExcept);
            }
        }

        if let Some(finally) = finally {
            let finally_offset = self.pc() - (push_pc + 3);
            self.unit().instructions[push_pc + 2] =
                u16::try_from(finally_offset).map_err(|_| {
                    Error::syntax("jump too large").with_location(self.location(position))
                })?;
            self.compile_block(finally)?;
            self.emit(Opcode::EndFinally);
        }

        self.patch_forward(post_jump + 1, post_jump + 2, position)?;
        Ok(())
    }

    // === Expressions ===

    fn undefined(&self, name: &str, position: &Position) -> Error {
        let visible = self
            .units
            .last()
            .map(|unit| unit.table.visible_names())
            .unwrap_or_default();
        let mut message = format!("undefined variable {name:?}");
        if let Some(suggestion) = best_match(name, &visible) {
            message.push_str(&format!(" (did you mean {suggestion:?}?)"));
        }
        Error::name(message).with_location(self.location(position))
    }

    fn compile_expression(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Nil { .. } => {
                self.emit(Opcode::Nil);
                Ok(())
            }
            Expr::Bool { value, .. } => {
                self.emit(if *value { Opcode::True } else { Opcode::False });
                Ok(())
            }
            Expr::Int { value, position } => {
                let index = self.add_constant(Constant::Int(*value), position)?;
                self.emit1(Opcode::LoadConst, index);
                Ok(())
            }
            Expr::Float { value, position } => {
                let index = self.add_constant(Constant::Float(*value), position)?;
                self.emit1(Opcode::LoadConst, index);
                Ok(())
            }
            Expr::Str { value, position } => {
                let index =
                    self.add_constant(Constant::String(Arc::from(value.as_str())), position)?;
                self.emit1(Opcode::LoadConst, index);
                Ok(())
            }
            Expr::Template { parts, position } => {
                for part in parts {
                    match part {
                        TemplatePart::Literal(text) => {
                            let index = self
                                .add_constant(Constant::String(Arc::from(text.as_str())), position)?;
                            self.emit1(Opcode::LoadConst, index);
                        }
                        TemplatePart::Expr(expr) => self.compile_expression(expr)?,
                    }
                }
                let count = self.operand_u16(parts.len(), "template part count", position)?;
                self.emit1(Opcode::BuildString, count);
                Ok(())
            }
            Expr::Ident { name, position } => {
                let symbol = self
                    .unit()
                    .table
                    .resolve(name)
                    .ok_or_else(|| self.undefined(name, position))?;
                self.emit_load(&symbol);
                Ok(())
            }
            Expr::List { items, position } => self.compile_list(items, position),
            Expr::MapLit { entries, position } => self.compile_map(entries, position),
            Expr::Func { function, position } => self.compile_function(function, position),
            Expr::Prefix { op, operand, .. } => {
                self.compile_expression(operand)?;
                self.emit(match op {
                    PrefixOp::Neg => Opcode::UnaryNegative,
                    PrefixOp::Not => Opcode::UnaryNot,
                });
                Ok(())
            }
            Expr::Infix {
                op,
                lhs,
                rhs,
                position,
            } => {
                self.compile_expression(lhs)?;
                self.compile_expression(rhs)?;
                self.mark_position(position.clone());
                if let Some(kind) = Self::binary_kind(*op) {
                    self.emit1(Opcode::BinaryOp, kind.word());
                } else if let Some(kind) = Self::compare_kind(*op) {
                    self.emit1(Opcode::CompareOp, kind.word());
                } else {
                    debug_assert_eq!(*op, InfixOp::In);
                    self.emit(Opcode::ContainsOp);
                }
                Ok(())
            }
            Expr::Logical {
                op, lhs, rhs, position,
            } => {
                self.compile_expression(lhs)?;
                self.emit1(Opcode::Copy, 0);
                let short = self.emit1(
                    match op {
                        LogicalOp::And => Opcode::PopJumpForwardIfFalse,
                        LogicalOp::Or => Opcode::PopJumpForwardIfTrue,
                    },
                    0,
                );
                self.emit(Opcode::PopTop);
                self.compile_expression(rhs)?;
                self.patch_forward(short + 1, short + 2, position)?;
                Ok(())
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
                position,
            } => {
                self.compile_expression(cond)?;
                let else_jump = self.emit1(Opcode::PopJumpForwardIfFalse, 0);
                self.compile_expression(then_expr)?;
                let end_jump = self.emit1(Opcode::JumpForward, 0);
                self.patch_forward(else_jump + 1, else_jump + 2, position)?;
                self.compile_expression(else_expr)?;
                self.patch_forward(end_jump + 1, end_jump + 2, position)?;
                Ok(())
            }
            Expr::Range { start, stop, position } => {
                self.compile_expression(start)?;
                self.compile_expression(stop)?;
                self.mark_position(position.clone());
                self.emit(Opcode::Range);
                Ok(())
            }
            Expr::Pipe { lhs, rhs, position } => self.compile_pipe(lhs, rhs, position),
            Expr::Call {
                callee,
                args,
                position,
            } => self.compile_call(callee, args, position),
            Expr::Index { object, index, position } => {
                self.compile_expression(object)?;
                self.compile_expression(index)?;
                self.mark_position(position.clone());
                self.emit(Opcode::BinarySubscr);
                Ok(())
            }
            Expr::Slice {
                object,
                start,
                stop,
                position,
            } => {
                self.compile_expression(object)?;
                match start {
                    Some(start) => self.compile_expression(start)?,
                    None => {
                        self.emit(Opcode::Nil);
                    }
                }
                match stop {
                    Some(stop) => self.compile_expression(stop)?,
                    None => {
                        self.emit(Opcode::Nil);
                    }
                }
                self.mark_position(position.clone());
                self.emit(Opcode::Slice);
                Ok(())
            }
            Expr::Attr {
                object,
                name,
                position,
            } => {
                self.compile_expression(object)?;
                let index = self.add_name(name, position)?;
                self.mark_position(position.clone());
                self.emit1(Opcode::LoadAttr, index);
                Ok(())
            }
            Expr::OptAttr {
                object,
                name,
                position,
            } => {
                // nil?.attr yields nil without evaluating the lookup.
                self.compile_expression(object)?;
                self.emit1(Opcode::Copy, 0);
                let skip = self.emit1(Opcode::PopJumpForwardIfNil, 0);
                let index = self.add_name(name, position)?;
                self.emit1(Opcode::LoadAttrOrNil, index);
                self.patch_forward(skip + 1, skip + 2, position)?;
                Ok(())
            }
        }
    }

    fn compile_list(&mut self, items: &[ListItem], position: &Position) -> Result<()> {
        let has_spread = items.iter().any(|item| matches!(item, ListItem::Spread(_)));
        if !has_spread {
            for item in items {
                if let ListItem::Item(expr) = item {
                    self.compile_expression(expr)?;
                }
            }
            let count = self.operand_u16(items.len(), "list length", position)?;
            self.emit1(Opcode::BuildList, count);
            return Ok(());
        }
        self.emit1(Opcode::BuildList, 0);
        for item in items {
            match item {
                ListItem::Item(expr) => {
                    self.compile_expression(expr)?;
                    self.emit(Opcode::ListAppend);
                }
                ListItem::Spread(expr) => {
                    self.compile_expression(expr)?;
                    self.emit(Opcode::ListExtend);
                }
            }
        }
        Ok(())
    }

    fn compile_map(&mut self, entries: &[MapEntry], position: &Position) -> Result<()> {
        let has_spread = entries
            .iter()
            .any(|entry| matches!(entry, MapEntry::Spread(_)));
        if !has_spread {
            for entry in entries {
                if let MapEntry::Pair { key, value } = entry {
                    let index = self
                        .add_constant(Constant::String(Arc::from(key.name.as_str())), &key.position)?;
                    self.emit1(Opcode::LoadConst, index);
                    self.compile_expression(value)?;
                }
            }
            let count = self.operand_u16(entries.len(), "map length", position)?;
            self.emit1(Opcode::BuildMap, count);
            return Ok(());
        }
        self.emit1(Opcode::BuildMap, 0);
        for entry in entries {
            match entry {
                MapEntry::Pair { key, value } => {
                    let index = self
                        .add_constant(Constant::String(Arc::from(key.name.as_str())), &key.position)?;
                    self.emit1(Opcode::LoadConst, index);
                    self.compile_expression(value)?;
                    self.emit(Opcode::MapSet);
                }
                MapEntry::Spread(expr) => {
                    self.compile_expression(expr)?;
                    self.emit(Opcode::MapMerge);
                }
            }
        }
        Ok(())
    }

    fn compile_call(&mut self, callee: &Expr, args: &[CallArg], position: &Position) -> Result<()> {
        self.compile_expression(callee)?;
        let has_spread = args.iter().any(|arg| matches!(arg, CallArg::Spread(_)));
        if !has_spread {
            for arg in args {
                if let CallArg::Positional(expr) = arg {
                    self.compile_expression(expr)?;
                }
            }
            let argc = self.operand_u16(args.len(), "argument count", position)?;
            self.mark_position(position.clone());
            self.emit1(Opcode::Call, argc);
            return Ok(());
        }
        self.emit1(Opcode::BuildList, 0);
        for arg in args {
            match arg {
                CallArg::Positional(expr) => {
                    self.compile_expression(expr)?;
                    self.emit(Opcode::ListAppend);
                }
                CallArg::Spread(expr) => {
                    self.compile_expression(expr)?;
                    self.emit(Opcode::ListExtend);
                }
            }
        }
        self.mark_position(position.clone());
        self.emit(Opcode::CallSpread);
        Ok(())
    }

    /// `lhs |> stage` invokes the stage with `lhs` as the final argument;
    /// a call stage pre-binds its own arguments through a partial.
    fn compile_pipe(&mut self, lhs: &Expr, rhs: &Expr, position: &Position) -> Result<()> {
        match rhs {
            Expr::Call { callee, args, .. } if !args.is_empty() => {
                self.compile_expression(callee)?;
                for arg in args {
                    match arg {
                        CallArg::Positional(expr) => self.compile_expression(expr)?,
                        CallArg::Spread(expr) => {
                            return Err(Error::syntax(
                                "spread arguments are not supported in pipe expressions",
                            )
                            .with_location(self.location(&expr.position())))
                        }
                    }
                }
                let bound = self.operand_u16(args.len(), "argument count", position)?;
                self.emit1(Opcode::Partial, bound);
            }
            Expr::Call { callee, .. } => self.compile_expression(callee)?,
            other => self.compile_expression(other)?,
        }
        self.compile_expression(lhs)?;
        self.mark_position(position.clone());
        self.emit1(Opcode::Call, 1);
        Ok(())
    }

    fn literal_constant(&self, expr: &Expr) -> Result<Constant> {
        match expr {
            Expr::Nil { .. } => Ok(Constant::Nil),
            Expr::Bool { value, .. } => Ok(Constant::Bool(*value)),
            Expr::Int { value, .. } => Ok(Constant::Int(*value)),
            Expr::Float { value, .. } => Ok(Constant::Float(*value)),
            Expr::Str { value, .. } => Ok(Constant::String(Arc::from(value.as_str()))),
            Expr::Prefix {
                op: PrefixOp::Neg,
                operand,
                ..
            } => match &**operand {
                Expr::Int { value, .. } => Ok(Constant::Int(-*value)),
                Expr::Float { value, .. } => Ok(Constant::Float(-*value)),
                other => Err(Error::syntax("default parameter value must be a literal")
                    .with_location(self.location(&other.position()))),
            },
            other => Err(Error::syntax("default parameter value must be a literal")
                .with_location(self.location(&other.position()))),
        }
    }

    fn compile_function(&mut self, function: &FunctionLit, position: &Position) -> Result<()> {
        let defaults: Vec<Constant> = function
            .params
            .iter()
            .filter_map(|param| param.default.as_ref())
            .map(|expr| self.literal_constant(expr))
            .collect::<Result<_>>()?;

        let child_table = self.unit().table.push_function();
        self.units
            .push(Unit::new(function.name.clone(), child_table.clone()));

        for param in &function.params {
            self.unit().table.define(&param.name, false)?;
        }
        if let Some(rest) = &function.rest {
            self.unit().table.define(rest, false)?;
        }

        let compile_result = (|| -> Result<()> {
            let has_tail = self.compile_statements_with_tail(&function.body.statements)?;
            if has_tail {
                self.emit(Opcode::ReturnValue);
            } else if !matches!(function.body.statements.last(), Some(Stmt::Return { .. })) {
                self.emit(Opcode::Nil);
                self.emit(Opcode::ReturnValue);
            }
            Ok(())
        })();
        let unit = self.units.pop().expect("function unit");
        compile_result?;

        let free = child_table.free_records();
        let code = Arc::new(Code {
            name: if function.name.is_empty() {
                "<anonymous>".to_string()
            } else {
                function.name.clone()
            },
            file: self.file.clone(),
            instructions: unit.instructions,
            constants: unit.constants,
            names: unit.names.into_iter().collect(),
            functions: unit.functions,
            local_count: child_table.slot_count(),
            free_names: free.iter().map(|record| record.name.clone()).collect(),
            global_names: Vec::new(),
            lines: unit.lines,
        });

        let compiled = Arc::new(Function {
            name: function.name.clone(),
            params: function.params.iter().map(|p| p.name.clone()).collect(),
            defaults,
            rest: function.rest.clone(),
            code,
        });

        let parent = self.unit();
        parent.functions.push(compiled);
        let fn_index = self.operand_u16(
            self.units.last().expect("unit").functions.len() - 1,
            "function pool",
            position,
        )?;

        for record in &free {
            self.emit2(
                Opcode::MakeCell,
                record.origin_index,
                if record.origin_is_local { 0 } else { 1 },
            );
        }
        let capture_count = self.operand_u16(free.len(), "capture count", position)?;
        self.emit2(Opcode::LoadClosure, fn_index, capture_count);
        Ok(())
    }
}
