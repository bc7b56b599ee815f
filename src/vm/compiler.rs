//! AST-to-bytecode compiler.
//!
//! Walks expressions post-order and statements in sequence, emitting into
//! a [`CodeBuffer`] with symbolic jump targets. Constant-pool and
//! variable-name indices are interned by equality, and emission order is a
//! pure function of the AST, so compiling the same input twice yields
//! byte-identical instruction streams.

use std::rc::Rc;

use crate::ast::{Program, Stmt};
use crate::error::CompileError;

use super::assembler::{CodeBuffer, Label};
use super::code::{CodeFlags, CodeObject, Constant};
use super::opcode::Op;

pub type CompileResult<T> = Result<T, CompileError>;

/// What kind of body is being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenMode {
    /// A module body: its locals are the global namespace.
    Main,
    /// A single interactive line: a lone expression becomes the produced
    /// value instead of being discarded.
    Repl,
    /// A function body.
    Function,
}

/// Compile-time loop context: the continue target and validation that
/// break/continue appear where a runtime loop block exists.
pub(crate) struct LoopLabels {
    pub continue_label: Label,
}

/// The code generator for one function or module body.
pub struct Compiler {
    pub(crate) buf: CodeBuffer,
    pub(crate) consts: Vec<Constant>,
    pub(crate) varnames: Vec<String>,
    pub(crate) name: String,
    pub(crate) file: String,
    pub(crate) mode: GenMode,
    pub(crate) loops: Vec<LoopLabels>,
    pub(crate) global_names: Vec<String>,
    is_closure: bool,
}

impl Compiler {
    fn new(name: String, file: String, mode: GenMode, is_closure: bool) -> Self {
        Self {
            buf: CodeBuffer::new(),
            consts: Vec::new(),
            varnames: Vec::new(),
            name,
            file,
            mode,
            loops: Vec::new(),
            global_names: Vec::new(),
            is_closure,
        }
    }

    /// Compile a whole program into the main code object.
    pub fn compile(program: &Program, file: &str) -> CompileResult<Rc<CodeObject>> {
        Self::compile_with_mode(program, file, GenMode::Main)
    }

    /// Compile one interactive line: a single expression statement leaves
    /// its value as the produced value of the unit.
    pub fn compile_repl(program: &Program, file: &str) -> CompileResult<Rc<CodeObject>> {
        Self::compile_with_mode(program, file, GenMode::Repl)
    }

    fn compile_with_mode(
        program: &Program,
        file: &str,
        mode: GenMode,
    ) -> CompileResult<Rc<CodeObject>> {
        let first_line = program
            .statements
            .first()
            .map(|s| s.span.line)
            .unwrap_or(1);
        let mut gen = Compiler::new("<main>".to_string(), file.to_string(), mode, false);

        let mut statements = program.statements.as_slice();
        let mut tail_expr = None;
        if mode == GenMode::Repl {
            if let Some((last, rest)) = program.statements.split_last() {
                if let crate::ast::StmtKind::Expression(expr) = &last.kind {
                    tail_expr = Some(expr);
                    statements = rest;
                }
            }
        }

        for stmt in statements {
            gen.compile_stmt(stmt)?;
        }

        let last_line = program
            .statements
            .last()
            .map(|s| s.span.line)
            .unwrap_or(first_line);
        match tail_expr {
            Some(expr) => {
                gen.compile_expr(expr)?;
                gen.buf.emit(Op::ReturnValue, 0, expr.span.line);
            }
            None => gen.emit_implicit_return(last_line),
        }

        gen.finalize(0, first_line)
    }

    /// Compile a nested function body into its own code object.
    pub(crate) fn compile_function_code(
        &self,
        name: &str,
        params: &[String],
        body: &[Stmt],
        first_line: usize,
    ) -> CompileResult<Rc<CodeObject>> {
        // Anything defined inside a function body captures its defining
        // frame when made into a value.
        let is_closure = self.mode == GenMode::Function;
        let mut gen = Compiler::new(
            name.to_string(),
            self.file.clone(),
            GenMode::Function,
            is_closure,
        );

        // Parameters occupy the leading variable-name slots.
        for param in params {
            gen.name_index(param);
        }

        for stmt in body {
            gen.compile_stmt(stmt)?;
        }

        let last_line = body.last().map(|s| s.span.line).unwrap_or(first_line);
        gen.emit_implicit_return(last_line);
        gen.finalize(params.len(), first_line)
    }

    fn emit_implicit_return(&mut self, line: usize) {
        let null = self.const_index(Constant::Null);
        self.buf.emit(Op::LoadConst, null, line);
        self.buf.emit(Op::ReturnValue, 0, line);
    }

    fn finalize(self, argcount: usize, first_line: usize) -> CompileResult<Rc<CodeObject>> {
        let assembled = self.buf.finalize(&self.name, first_line)?;
        Ok(Rc::new(CodeObject {
            name: self.name,
            file: self.file,
            first_line,
            consts: self.consts,
            varnames: self.varnames,
            code: assembled.code,
            lnotab: assembled.lnotab,
            stack_size: assembled.stack_size,
            argcount,
            flags: CodeFlags {
                is_main: self.mode != GenMode::Function,
                is_closure: self.is_closure,
            },
            global_names: self.global_names,
        }))
    }

    // ===== Pool interning =====

    /// Index of `constant` in the pool, appending only when no equal entry
    /// exists.
    pub(crate) fn const_index(&mut self, constant: Constant) -> u32 {
        if let Some(index) = self.consts.iter().position(|c| *c == constant) {
            return index as u32;
        }
        self.consts.push(constant);
        (self.consts.len() - 1) as u32
    }

    /// Index of `name` in the variable-name table, interned by equality.
    pub(crate) fn name_index(&mut self, name: &str) -> u32 {
        if let Some(index) = self.varnames.iter().position(|n| n == name) {
            return index as u32;
        }
        self.varnames.push(name.to_string());
        (self.varnames.len() - 1) as u32
    }

    pub(crate) fn declare_global(&mut self, name: &str) {
        if !self.global_names.iter().any(|n| n == name) {
            self.global_names.push(name.to_string());
        }
    }

    pub(crate) fn is_declared_global(&self, name: &str) -> bool {
        self.global_names.iter().any(|n| n == name)
    }
}
