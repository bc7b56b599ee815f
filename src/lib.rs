//! Rill: a dynamically-typed scripting language with a compact
//! stack-machine bytecode VM.
//!
//! The pipeline: [`lexer`] turns source text into tokens, [`parser`] into
//! an AST, [`vm::Compiler`] lowers that into an immutable [`vm::CodeObject`],
//! and [`vm::Machine`] executes it.

#![allow(clippy::new_without_default)]
#![allow(clippy::result_large_err)]
#![allow(clippy::type_complexity)]

pub mod ast;
pub mod builtins;
pub mod error;
pub mod lexer;
pub mod module;
pub mod object;
pub mod parser;
pub mod repl;
pub mod span;
pub mod vm;

use std::rc::Rc;

use error::RillError;
use vm::{CodeObject, Compiler, Completion, Machine};

/// Compile source text into a code object.
pub fn compile_source(source: &str, file: &str) -> Result<Rc<CodeObject>, RillError> {
    let program = parser::parse_source(source)?;
    Ok(Compiler::compile(&program, file)?)
}

/// Compile and execute source text on a fresh machine.
pub fn run_source(source: &str, file: &str) -> Result<Completion, RillError> {
    let code = compile_source(source, file)?;
    let mut machine = Machine::new();
    Ok(machine.execute(code, None))
}

/// Compile and execute a script file on a fresh machine.
pub fn run_file(path: &str) -> Result<Completion, RillError> {
    let source = std::fs::read_to_string(path)?;
    run_source(&source, path)
}
