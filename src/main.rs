//! Rill CLI: execute files, evaluate strings, disassemble, or run the
//! shell.

use std::env;
use std::process;

use colored::Colorize;

use rill::repl::run_repl;
use rill::vm::{disassemble, Completion, Machine};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

enum Command {
    /// Run a script file
    Run { file: String },
    /// Evaluate a string
    Eval { code: String },
    /// Dump the compiled bytecode of a file
    Disassemble { file: String },
    /// Start the shell
    Repl,
    Version,
    Help,
}

fn parse_args(mut args: env::Args) -> Result<Command, String> {
    args.next(); // program name
    let Some(first) = args.next() else {
        return Ok(Command::Repl);
    };
    match first.as_str() {
        "--version" | "-V" => Ok(Command::Version),
        "--help" | "-h" => Ok(Command::Help),
        "-e" => match args.next() {
            Some(code) => Ok(Command::Eval { code }),
            None => Err("-e needs an argument".to_string()),
        },
        "--dis" => match args.next() {
            Some(file) => Ok(Command::Disassemble { file }),
            None => Err("--dis needs a file".to_string()),
        },
        flag if flag.starts_with('-') => Err(format!("unknown option '{}'", flag)),
        file => Ok(Command::Run {
            file: file.to_string(),
        }),
    }
}

fn usage() {
    println!("usage: rill [file.rl]");
    println!("       rill -e <code>");
    println!("       rill --dis <file.rl>");
    println!("       rill              (interactive shell)");
}

fn run(source: &str, file: &str) -> i32 {
    let code = match rill::compile_source(source, file) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            return 1;
        }
    };
    let mut machine = Machine::new();
    match machine.execute(code, None) {
        Completion::Normal(_) => 0,
        Completion::UnhandledError(err) | Completion::ErrorInHandling(err) => {
            err.report();
            1
        }
    }
}

fn main() {
    let command = match parse_args(env::args()) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{} {}", "error:".red().bold(), message);
            usage();
            process::exit(2);
        }
    };

    let status = match command {
        Command::Version => {
            println!("rill {}", VERSION);
            0
        }
        Command::Help => {
            usage();
            0
        }
        Command::Repl => {
            run_repl();
            0
        }
        Command::Eval { code } => run(&code, "<eval>"),
        Command::Run { file } => match std::fs::read_to_string(&file) {
            Ok(source) => run(&source, &file),
            Err(err) => {
                eprintln!("{} cannot read '{}': {}", "error:".red().bold(), file, err);
                1
            }
        },
        Command::Disassemble { file } => match std::fs::read_to_string(&file) {
            Ok(source) => match rill::compile_source(&source, &file) {
                Ok(code) => {
                    print!("{}", disassemble(&code));
                    0
                }
                Err(err) => {
                    eprintln!("{} {}", "error:".red().bold(), err);
                    1
                }
            },
            Err(err) => {
                eprintln!("{} cannot read '{}': {}", "error:".red().bold(), file, err);
                1
            }
        },
    };

    process::exit(status);
}
