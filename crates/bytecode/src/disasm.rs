//! Bytecode disassembler.
//!
//! Renders a [`Code`] object as a readable listing, one instruction per
//! line, with constant and name operands resolved inline. Used by compiler
//! debug logging and tests.

use crate::code::Code;
use crate::opcode::Opcode;
use std::fmt::Write;

impl Code {
    /// Renders the instruction stream as a listing.
    ///
    /// Undecodable words are rendered as `??` rather than aborting, so a
    /// partially corrupt stream can still be inspected.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; {} ({} locals)", self.name, self.local_count);
        let mut pc = 0;
        while pc < self.instructions.len() {
            let word = self.instructions[pc];
            let Some(op) = Opcode::from_word(word) else {
                let _ = writeln!(out, "{pc:6}  ?? {word:#06x}");
                pc += 1;
                continue;
            };
            let _ = write!(out, "{pc:6}  {:<20}", op.name());
            let operands = op.operand_count();
            for i in 0..operands {
                match self.instructions.get(pc + 1 + i) {
                    Some(operand) => {
                        let _ = write!(out, " {operand}");
                    }
                    None => {
                        let _ = write!(out, " <truncated>");
                    }
                }
            }
            if let Some(note) = self.annotate(op, pc) {
                let _ = write!(out, "  ; {note}");
            }
            let _ = writeln!(out);
            pc += 1 + operands;
        }
        for function in &self.functions {
            let _ = writeln!(out);
            out.push_str(&function.code.disassemble());
        }
        out
    }

    fn annotate(&self, op: Opcode, pc: usize) -> Option<String> {
        let operand = |i: usize| self.instructions.get(pc + 1 + i).copied();
        match op {
            Opcode::LoadConst => {
                let constant = self.constants.get(operand(0)? as usize)?;
                Some(constant.to_string())
            }
            Opcode::LoadAttr | Opcode::LoadAttrOrNil | Opcode::StoreAttr => {
                self.names.get(operand(0)? as usize).cloned()
            }
            Opcode::LoadGlobal | Opcode::StoreGlobal => {
                self.global_names.get(operand(0)? as usize).cloned()
            }
            Opcode::LoadFree | Opcode::StoreFree => {
                self.free_names.get(operand(0)? as usize).cloned()
            }
            Opcode::LoadClosure => {
                let function = self.functions.get(operand(0)? as usize)?;
                Some(function.display_name().to_string())
            }
            _ => None,
        }
    }
}
