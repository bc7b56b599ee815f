//! Expression lowering: operands before operators, post-order.

use crate::ast::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};

use super::compiler::{CompileResult, Compiler};
use super::code::Constant;
use super::opcode::{Op, CMP_EQ, CMP_GE, CMP_GT, CMP_LE, CMP_LT, CMP_NE};

impl Compiler {
    pub(crate) fn compile_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        let line = expr.span.line;
        match &expr.kind {
            ExprKind::IntLiteral(v) => {
                let index = self.const_index(Constant::Int(*v));
                self.buf.emit(Op::LoadConst, index, line);
            }
            ExprKind::FloatLiteral(v) => {
                let index = self.const_index(Constant::Float(*v));
                self.buf.emit(Op::LoadConst, index, line);
            }
            ExprKind::StringLiteral(s) => {
                let index = self.const_index(Constant::Str(s.clone()));
                self.buf.emit(Op::LoadConst, index, line);
            }
            ExprKind::BoolLiteral(b) => {
                let index = self.const_index(Constant::Bool(*b));
                self.buf.emit(Op::LoadConst, index, line);
            }
            ExprKind::Null => {
                let index = self.const_index(Constant::Null);
                self.buf.emit(Op::LoadConst, index, line);
            }

            ExprKind::Variable(name) => {
                let index = self.name_index(name);
                self.buf.emit(Op::LoadName, index, line);
            }

            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                match operator {
                    BinaryOp::Add => self.buf.emit(Op::BinaryAdd, 0, line),
                    BinaryOp::Subtract => self.buf.emit(Op::BinarySub, 0, line),
                    BinaryOp::Multiply => self.buf.emit(Op::BinaryMul, 0, line),
                    BinaryOp::Divide => self.buf.emit(Op::BinaryDiv, 0, line),
                    BinaryOp::Modulo => self.buf.emit(Op::BinaryRem, 0, line),
                    BinaryOp::Power => self.buf.emit(Op::BinaryPow, 0, line),
                    BinaryOp::Equal => self.buf.emit(Op::CompareOp, CMP_EQ, line),
                    BinaryOp::NotEqual => self.buf.emit(Op::CompareOp, CMP_NE, line),
                    BinaryOp::Less => self.buf.emit(Op::CompareOp, CMP_LT, line),
                    BinaryOp::LessEqual => self.buf.emit(Op::CompareOp, CMP_LE, line),
                    BinaryOp::Greater => self.buf.emit(Op::CompareOp, CMP_GT, line),
                    BinaryOp::GreaterEqual => self.buf.emit(Op::CompareOp, CMP_GE, line),
                }
            }

            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                self.compile_expr(left)?;
                let l_end = self.buf.new_label();
                let op = match operator {
                    LogicalOp::And => Op::JumpIfFalseOrPop,
                    LogicalOp::Or => Op::JumpIfTrueOrPop,
                };
                self.buf.emit_jump(op, l_end, line);
                self.compile_expr(right)?;
                self.buf.bind(l_end);
            }

            ExprKind::Unary { operator, operand } => {
                self.compile_expr(operand)?;
                match operator {
                    UnaryOp::Negate => self.buf.emit(Op::UnaryNeg, 0, line),
                    UnaryOp::Not => self.buf.emit(Op::UnaryNot, 0, line),
                }
            }

            ExprKind::Call { callee, arguments } => {
                self.compile_expr(callee)?;
                for argument in arguments {
                    self.compile_expr(argument)?;
                }
                let count = arguments.len() as u32;
                self.buf
                    .emit_dyn(Op::CallFunc, count, -(count as i32), line);
            }

            ExprKind::Member { object, name } => {
                self.compile_expr(object)?;
                let index = self.name_index(name);
                self.buf.emit(Op::LoadAttr, index, line);
            }

            ExprKind::Index { object, index } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.buf.emit(Op::LoadSubscr, 0, line);
            }

            ExprKind::Array(items) => {
                for item in items {
                    self.compile_expr(item)?;
                }
                let count = items.len() as u32;
                self.buf
                    .emit_dyn(Op::BuildArray, count, 1 - count as i32, line);
            }

            ExprKind::Map(entries) => {
                for (key, value) in entries {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                let count = entries.len() as u32;
                self.buf
                    .emit_dyn(Op::BuildMap, count, 1 - 2 * count as i32, line);
            }

            ExprKind::Function { params, body } => {
                let code = self.compile_function_code("<anonymous>", params, body, line)?;
                let index = self.const_index(Constant::Code(code));
                self.buf.emit(Op::MakeFunction, index, line);
            }
        }
        Ok(())
    }
}
