//! Bytecode assembly: instruction buffers with symbolic jump targets,
//! resolved to absolute byte offsets in one relocation pass, plus running
//! operand-stack depth accounting.
//!
//! Emission order is deterministic and constant/name indices are interned
//! by equality, so assembling the same AST twice yields byte-identical
//! streams.

use crate::error::CompileError;

use super::code::build_lnotab;
use super::opcode::Op;

/// A symbolic jump target. Bound to a position once; referenced by any
/// number of jump instructions before or after binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Clone, Copy)]
enum Operand {
    Imm(u32),
    Target(Label),
}

#[derive(Debug, Clone, Copy)]
struct Inst {
    op: Op,
    operand: Operand,
    line: usize,
}

/// The result of assembling one function body.
pub struct Assembled {
    pub code: Vec<u8>,
    pub lnotab: Vec<u8>,
    pub stack_size: usize,
}

/// An append-only instruction buffer. Tracks the running operand-stack
/// depth as instructions are emitted; the recorded maximum becomes the code
/// object's required stack size.
pub struct CodeBuffer {
    insts: Vec<Inst>,
    labels: Vec<Option<usize>>,
    depth: i32,
    max_depth: i32,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self {
            insts: Vec::new(),
            labels: Vec::new(),
            depth: 0,
            max_depth: 0,
        }
    }

    /// Emit an instruction with a statically known stack effect.
    pub fn emit(&mut self, op: Op, arg: u32, line: usize) {
        let effect = op
            .stack_effect()
            .expect("dynamic-effect opcode requires emit_dyn");
        self.push_inst(op, Operand::Imm(arg), line, effect);
    }

    /// Emit a count-dependent instruction; the effect must be supplied by
    /// the emitter.
    pub fn emit_dyn(&mut self, op: Op, arg: u32, effect: i32, line: usize) {
        debug_assert!(op.stack_effect().is_none());
        self.push_inst(op, Operand::Imm(arg), line, effect);
    }

    /// Emit a jump (or region-setup) instruction targeting `label`.
    pub fn emit_jump(&mut self, op: Op, label: Label, line: usize) {
        debug_assert!(op.is_jump());
        let effect = op.stack_effect().expect("jumps have static effects");
        self.push_inst(op, Operand::Target(label), line, effect);
    }

    fn push_inst(&mut self, op: Op, operand: Operand, line: usize, effect: i32) {
        self.insts.push(Inst { op, operand, line });
        self.apply_effect(effect);
    }

    /// Account for values the VM pushes out-of-band (the error value at a
    /// catch-handler entry, the unwind signal at a finally entry).
    pub fn touch(&mut self, delta: i32) {
        self.apply_effect(delta);
    }

    fn apply_effect(&mut self, effect: i32) {
        self.depth += effect;
        debug_assert!(self.depth >= 0, "operand stack depth went negative");
        if self.depth > self.max_depth {
            self.max_depth = self.depth;
        }
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current end of the buffer.
    pub fn bind(&mut self, label: Label) {
        debug_assert!(self.labels[label.0].is_none(), "label bound twice");
        self.labels[label.0] = Some(self.insts.len());
    }

    /// Byte width of one instruction: jumps always reserve one speculative
    /// extended-operand prefix (16-bit targets); other operands take as
    /// many prefixes as their magnitude needs.
    fn width_of(inst: &Inst) -> usize {
        if inst.op.is_jump() {
            return 4;
        }
        match inst.operand {
            Operand::Imm(arg) => {
                if arg <= 0xff {
                    2
                } else if arg <= 0xffff {
                    4
                } else if arg <= 0xff_ffff {
                    6
                } else {
                    8
                }
            }
            Operand::Target(_) => 4,
        }
    }

    /// Resolve labels and encode the final byte stream.
    pub fn finalize(self, name: &str, first_line: usize) -> Result<Assembled, CompileError> {
        // Byte offset of each instruction.
        let mut offsets = Vec::with_capacity(self.insts.len() + 1);
        let mut at = 0usize;
        for inst in &self.insts {
            offsets.push(at);
            at += Self::width_of(inst);
        }
        offsets.push(at);

        let resolve = |label: Label| -> Result<u32, CompileError> {
            let index = self.labels[label.0].expect("unbound label");
            let target = offsets[index];
            if target > 0xffff {
                return Err(CompileError::JumpTooFar(name.to_string()));
            }
            Ok(target as u32)
        };

        let mut code = Vec::with_capacity(at);
        let mut line_records = Vec::with_capacity(self.insts.len());
        for (i, inst) in self.insts.iter().enumerate() {
            line_records.push((offsets[i], inst.line));
            let arg = match inst.operand {
                Operand::Imm(arg) => arg,
                Operand::Target(label) => resolve(label)?,
            };
            if inst.op.is_jump() {
                code.push(Op::ExtArg as u8);
                code.push((arg >> 8) as u8);
                code.push(inst.op as u8);
                code.push(arg as u8);
            } else {
                let mut prefixes = [0u8; 3];
                let mut count = 0;
                let mut rest = arg >> 8;
                while rest > 0 {
                    prefixes[count] = (rest & 0xff) as u8;
                    count += 1;
                    rest >>= 8;
                }
                for p in prefixes[..count].iter().rev() {
                    code.push(Op::ExtArg as u8);
                    code.push(*p);
                }
                code.push(inst.op as u8);
                code.push(arg as u8);
            }
            debug_assert_eq!(code.len(), offsets[i + 1]);
        }

        Ok(Assembled {
            code,
            lnotab: build_lnotab(first_line, &line_records),
            stack_size: self.max_depth as usize,
        })
    }
}

impl Default for CodeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_depth_tracking() {
        let mut buf = CodeBuffer::new();
        buf.emit(Op::LoadConst, 0, 1);
        buf.emit(Op::LoadConst, 1, 1);
        buf.emit(Op::BinaryAdd, 0, 1);
        buf.emit(Op::ReturnValue, 0, 1);
        let out = buf.finalize("<test>", 1).unwrap();
        assert_eq!(out.stack_size, 2);
    }

    #[test]
    fn dynamic_effects_are_explicit() {
        let mut buf = CodeBuffer::new();
        buf.emit(Op::LoadName, 0, 1);
        buf.emit(Op::LoadConst, 0, 1);
        buf.emit(Op::LoadConst, 1, 1);
        buf.emit_dyn(Op::CallFunc, 2, -2, 1);
        buf.emit(Op::PopTop, 0, 1);
        let out = buf.finalize("<test>", 1).unwrap();
        assert_eq!(out.stack_size, 3);
    }

    #[test]
    fn jumps_are_always_four_bytes() {
        let mut buf = CodeBuffer::new();
        let end = buf.new_label();
        buf.emit(Op::LoadConst, 0, 1);
        buf.emit_jump(Op::PopJumpIfFalse, end, 1);
        buf.emit(Op::LoadConst, 1, 1);
        buf.emit(Op::PopTop, 0, 1);
        buf.bind(end);
        let out = buf.finalize("<test>", 1).unwrap();
        // LOAD_CONST(2) + [EXT_ARG, hi, POP_JUMP_IF_FALSE, lo](4) +
        // LOAD_CONST(2) + POP_TOP(2)
        assert_eq!(out.code.len(), 10);
        assert_eq!(out.code[2], Op::ExtArg as u8);
        assert_eq!(out.code[4], Op::PopJumpIfFalse as u8);
        // Target is the end of the stream.
        assert_eq!(out.code[3], 0);
        assert_eq!(out.code[5], 10);
    }

    #[test]
    fn wide_operands_get_prefixes() {
        let mut buf = CodeBuffer::new();
        buf.emit(Op::LoadConst, 0x1234, 1);
        buf.emit(Op::PopTop, 0, 1);
        let out = buf.finalize("<test>", 1).unwrap();
        assert_eq!(
            out.code,
            vec![
                Op::ExtArg as u8,
                0x12,
                Op::LoadConst as u8,
                0x34,
                Op::PopTop as u8,
                0,
            ]
        );
    }

    #[test]
    fn forward_and_backward_labels_resolve() {
        let mut buf = CodeBuffer::new();
        let top = buf.new_label();
        buf.bind(top);
        buf.emit(Op::LoadConst, 0, 1);
        let exit = buf.new_label();
        buf.emit_jump(Op::PopJumpIfFalse, exit, 1);
        buf.emit_jump(Op::Jump, top, 1);
        buf.bind(exit);
        let out = buf.finalize("<test>", 1).unwrap();
        // Backward jump lands at offset 0.
        assert_eq!(out.code[7], 0);
        assert_eq!(out.code[9], 0);
        // Forward jump lands past the backward jump.
        assert_eq!(out.code[5], 10);
    }
}
