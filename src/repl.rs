//! The interactive shell: one machine, one global namespace, one line at a
//! time. Uncaught errors are reported and the loop resumes.

use std::io::{self, BufRead, Write};

use colored::Colorize;

use crate::parser::parse_source;
use crate::vm::{Compiler, Completion, Machine};
use crate::object;

const PROMPT: &str = "rill> ";

pub fn run_repl() {
    println!("rill {} — interactive shell", env!("CARGO_PKG_VERSION"));
    println!("type 'exit' to leave");

    let mut machine = Machine::new();
    let stdin = io::stdin();

    loop {
        print!("{}", PROMPT);
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let program = match parse_source(line) {
            Ok(program) => program,
            Err(err) => {
                eprintln!("{} {}", "parse error:".red().bold(), err);
                continue;
            }
        };
        let code = match Compiler::compile_repl(&program, "<repl>") {
            Ok(code) => code,
            Err(err) => {
                eprintln!("{} {}", "compile error:".red().bold(), err);
                continue;
            }
        };

        match machine.execute(code, None) {
            Completion::Normal(Some(value)) => println!("{}", object::represent(&value)),
            Completion::Normal(None) => {}
            Completion::UnhandledError(err) | Completion::ErrorInHandling(err) => {
                err.report();
            }
        }
    }
}
