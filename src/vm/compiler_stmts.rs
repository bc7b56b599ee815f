//! Statement lowering.

use crate::ast::{AssignTarget, CatchClause, FunctionDecl, Stmt, StmtKind};
use crate::error::CompileError;

use super::compiler::{CompileResult, Compiler, LoopLabels};
use super::code::Constant;
use super::opcode::Op;

impl Compiler {
    pub(crate) fn compile_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        let line = stmt.span.line;
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.compile_expr(expr)?;
                self.buf.emit(Op::PopTop, 0, line);
            }

            StmtKind::Assign { target, value } => self.compile_assign(target, value, line)?,

            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.compile_expr(condition)?;
                match else_branch {
                    Some(else_branch) => {
                        let l_else = self.buf.new_label();
                        let l_end = self.buf.new_label();
                        self.buf.emit_jump(Op::PopJumpIfFalse, l_else, line);
                        for stmt in then_branch {
                            self.compile_stmt(stmt)?;
                        }
                        self.buf.emit_jump(Op::Jump, l_end, line);
                        self.buf.bind(l_else);
                        for stmt in else_branch {
                            self.compile_stmt(stmt)?;
                        }
                        self.buf.bind(l_end);
                    }
                    None => {
                        let l_end = self.buf.new_label();
                        self.buf.emit_jump(Op::PopJumpIfFalse, l_end, line);
                        for stmt in then_branch {
                            self.compile_stmt(stmt)?;
                        }
                        self.buf.bind(l_end);
                    }
                }
            }

            StmtKind::While { condition, body } => {
                let l_after = self.buf.new_label();
                let l_test = self.buf.new_label();
                let l_exit = self.buf.new_label();

                self.buf.emit_jump(Op::SetupLoop, l_after, line);
                self.buf.bind(l_test);
                self.compile_expr(condition)?;
                self.buf.emit_jump(Op::PopJumpIfFalse, l_exit, line);

                self.loops.push(LoopLabels {
                    continue_label: l_test,
                });
                for stmt in body {
                    self.compile_stmt(stmt)?;
                }
                self.loops.pop();

                self.buf.emit_jump(Op::Jump, l_test, line);
                self.buf.bind(l_exit);
                self.buf.emit(Op::PopLoop, 0, line);
                self.buf.bind(l_after);
            }

            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.compile_stmt(init)?;
                }

                let l_after = self.buf.new_label();
                let l_test = self.buf.new_label();
                let l_exit = self.buf.new_label();
                let l_update = self.buf.new_label();

                self.buf.emit_jump(Op::SetupLoop, l_after, line);
                self.buf.bind(l_test);
                if let Some(condition) = condition {
                    self.compile_expr(condition)?;
                    self.buf.emit_jump(Op::PopJumpIfFalse, l_exit, line);
                }

                self.loops.push(LoopLabels {
                    continue_label: l_update,
                });
                for stmt in body {
                    self.compile_stmt(stmt)?;
                }
                self.loops.pop();

                self.buf.bind(l_update);
                if let Some(update) = update {
                    self.compile_stmt(update)?;
                }
                self.buf.emit_jump(Op::Jump, l_test, line);
                self.buf.bind(l_exit);
                self.buf.emit(Op::PopLoop, 0, line);
                self.buf.bind(l_after);
            }

            StmtKind::Return(value) => {
                match value {
                    Some(expr) => self.compile_expr(expr)?,
                    None => {
                        let null = self.const_index(Constant::Null);
                        self.buf.emit(Op::LoadConst, null, line);
                    }
                }
                self.buf.emit(Op::ReturnValue, 0, line);
            }

            StmtKind::Break => {
                if self.loops.is_empty() {
                    return Err(CompileError::BreakOutsideLoop(line));
                }
                self.buf.emit(Op::BreakLoop, 0, line);
            }

            StmtKind::Continue => {
                let Some(labels) = self.loops.last() else {
                    return Err(CompileError::ContinueOutsideLoop(line));
                };
                let target = labels.continue_label;
                self.buf.emit_jump(Op::ContinueLoop, target, line);
            }

            StmtKind::Throw(expr) => {
                self.compile_expr(expr)?;
                self.buf.emit(Op::Throw, 0, line);
            }

            StmtKind::Assert(condition) => {
                self.compile_expr(condition)?;
                let l_ok = self.buf.new_label();
                self.buf.emit_jump(Op::PopJumpIfTrue, l_ok, line);
                let message = self.const_index(Constant::Str("assertion failed".to_string()));
                self.buf.emit(Op::LoadConst, message, line);
                self.buf.emit(Op::AssertFail, 0, line);
                self.buf.bind(l_ok);
            }

            StmtKind::Try {
                body,
                catches,
                finally,
            } => self.compile_try(body, catches, finally.as_deref(), line)?,

            StmtKind::Function(decl) => self.compile_function_decl(decl)?,

            StmtKind::StructDef { name, fields } => {
                for field in fields {
                    let index = self.name_index(field);
                    self.buf.emit(Op::LoadVarname, index, line);
                }
                let name_idx = self.name_index(name);
                self.buf.emit(Op::LoadVarname, name_idx, line);
                self.buf
                    .emit_dyn(Op::BuildStruct, fields.len() as u32, -(fields.len() as i32), line);
                self.emit_store_name(name, line);
            }

            StmtKind::Global(names) => {
                for name in names {
                    self.declare_global(name);
                }
            }

            StmtKind::Import(path) => {
                let index = self.const_index(Constant::Str(path.clone()));
                self.buf.emit(Op::ImportName, index, line);
            }

            StmtKind::Print(values) => {
                for value in values {
                    self.compile_expr(value)?;
                }
                self.buf
                    .emit_dyn(Op::Print, values.len() as u32, -(values.len() as i32), line);
            }

            StmtKind::Input { prompt, targets } => {
                self.compile_expr(prompt)?;
                for target in targets {
                    let index = self.name_index(target);
                    self.buf.emit(Op::LoadVarname, index, line);
                }
                let count = targets.len() as i32;
                self.buf
                    .emit_dyn(Op::InputLine, targets.len() as u32, -(count + 1), line);
            }
        }
        Ok(())
    }

    fn compile_assign(
        &mut self,
        target: &AssignTarget,
        value: &crate::ast::Expr,
        line: usize,
    ) -> CompileResult<()> {
        match target {
            AssignTarget::Name(name) => {
                self.compile_expr(value)?;
                self.emit_store_name(name, line);
            }
            AssignTarget::Member { object, name } => {
                self.compile_expr(value)?;
                self.compile_expr(object)?;
                let index = self.name_index(name);
                self.buf.emit(Op::StoreAttr, index, line);
            }
            AssignTarget::Index { object, index } => {
                self.compile_expr(value)?;
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.buf.emit(Op::StoreSubscr, 0, line);
            }
        }
        Ok(())
    }

    /// Stores to `global`-declared names bypass the scope chain.
    pub(crate) fn emit_store_name(&mut self, name: &str, line: usize) {
        let op = if self.is_declared_global(name) {
            Op::StoreGlobal
        } else {
            Op::StoreName
        };
        let index = self.name_index(name);
        self.buf.emit(op, index, line);
    }

    fn compile_function_decl(&mut self, decl: &FunctionDecl) -> CompileResult<()> {
        let line = decl.span.line;
        let code = self.compile_function_code(&decl.name, &decl.params, &decl.body, line)?;
        let index = self.const_index(Constant::Code(code));
        self.buf.emit(Op::MakeFunction, index, line);

        match &decl.receiver {
            Some(receiver) => {
                let index = self.name_index(receiver);
                self.buf.emit(Op::BindMethod, index, line);
            }
            None => self.emit_store_name(&decl.name, line),
        }
        Ok(())
    }

    /// try/catch/finally lowering: a protected-region marker before the
    /// guarded block, a leave marker after it, one filter-and-branch
    /// sequence per catch clause, and one shared finally tail entered with
    /// an unwind signal from both the normal path and the machine.
    fn compile_try(
        &mut self,
        body: &[Stmt],
        catches: &[CatchClause],
        finally: Option<&[Stmt]>,
        line: usize,
    ) -> CompileResult<()> {
        let has_catch = !catches.is_empty();
        let l_leave = self.buf.new_label();
        let l_catch = self.buf.new_label();
        let l_finally = self.buf.new_label();

        if finally.is_some() {
            self.buf.emit_jump(Op::SetupFinally, l_finally, line);
        }
        if has_catch {
            self.buf.emit_jump(Op::SetupTry, l_catch, line);
        }

        for stmt in body {
            self.compile_stmt(stmt)?;
        }

        if has_catch {
            self.buf.emit(Op::PopTry, 0, line);
        }
        self.buf.emit_jump(Op::Jump, l_leave, line);

        if has_catch {
            self.buf.bind(l_catch);
            // The machine pushes the pending error at the handler entry.
            self.buf.touch(1);

            let mut saw_catch_all = false;
            for clause in catches {
                let clause_line = clause.span.line;
                let l_next = clause.kind.as_ref().map(|_| self.buf.new_label());

                if let Some(kind) = &clause.kind {
                    self.buf.emit(Op::DupTop, 0, clause_line);
                    let kind_idx = self.const_index(Constant::Str(kind.clone()));
                    self.buf.emit(Op::LoadConst, kind_idx, clause_line);
                    self.buf.emit(Op::ExcMatch, 0, clause_line);
                    self.buf
                        .emit_jump(Op::PopJumpIfFalse, l_next.unwrap(), clause_line);
                }

                let name_idx = self.name_index(&clause.name);
                self.buf.emit(Op::StoreName, name_idx, clause_line);
                for stmt in &clause.body {
                    self.compile_stmt(stmt)?;
                }
                // The error counts as being handled until the clause body
                // completes.
                self.buf.emit(Op::CatchDone, 0, clause_line);
                self.buf.emit_jump(Op::Jump, l_leave, clause_line);

                match l_next {
                    Some(l_next) => {
                        self.buf.bind(l_next);
                        // The unmatched error is still on the stack here.
                        self.buf.touch(1);
                    }
                    None => {
                        // A bare catch matches everything; later clauses
                        // are unreachable.
                        saw_catch_all = true;
                        break;
                    }
                }
            }

            // No clause matched: re-raise the pending error.
            if !saw_catch_all {
                self.buf.emit(Op::Throw, 0, line);
            }
        }

        self.buf.bind(l_leave);
        if let Some(finally_body) = finally {
            self.buf.emit(Op::PopFinally, 0, line);
            self.buf.emit(Op::PushNormal, 0, line);
            self.buf.bind(l_finally);
            for stmt in finally_body {
                self.compile_stmt(stmt)?;
            }
            self.buf.emit(Op::EndFinally, 0, line);
        }
        Ok(())
    }
}
