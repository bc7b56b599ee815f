//! Error types for all phases: scanning, parsing, code generation, execution.

use colored::Colorize;
use thiserror::Error;

use crate::object::Value;
use crate::span::Span;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("Unterminated string at {0}")]
    UnterminatedString(Span),

    #[error("Invalid escape sequence '\\{0}' at {1}")]
    InvalidEscape(char, Span),

    #[error("Invalid number '{0}' at {1}")]
    InvalidNumber(String, Span),
}

impl LexerError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
            Self::InvalidEscape(_, span) => *span,
            Self::InvalidNumber(_, span) => *span,
        }
    }
}

/// Parser errors.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Unexpected token '{found}', expected {expected} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unexpected end of file at {0}")]
    UnexpectedEof(Span),

    #[error("Invalid assignment target at {0}")]
    InvalidAssignmentTarget(Span),

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn general(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::UnexpectedEof(span) => *span,
            Self::InvalidAssignmentTarget(span) => *span,
            Self::General { span, .. } => *span,
        }
    }
}

impl From<LexerError> for ParserError {
    fn from(err: LexerError) -> Self {
        Self::General {
            message: err.to_string(),
            span: err.span(),
        }
    }
}

/// Code-generation errors. Fatal to compilation: there is no partial
/// compiled unit.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("'break' outside of a loop at line {0}")]
    BreakOutsideLoop(usize),

    #[error("'continue' outside of a loop at line {0}")]
    ContinueOutsideLoop(usize),

    #[error("Invalid assignment target at line {0}")]
    InvalidAssignTarget(usize),

    #[error("Jump target out of range in '{0}' (function body too large)")]
    JumpTooFar(String),

    #[error("{message} at line {line}")]
    General { message: String, line: usize },
}

impl CompileError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self::General {
            message: message.into(),
            line,
        }
    }
}

/// The closed set of runtime error kinds. A kind, not a type hierarchy:
/// catch clauses filter on the kind name string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Name,
    TypeMismatch,
    AttributeMissing,
    IndexOutOfRange,
    ArityMismatch,
    ZeroDivision,
    Unhashable,
    RecursionLimit,
    ForeignCall,
    UserThrown,
    Assertion,
    Import,
}

impl ErrorKind {
    /// The user-visible kind name, as matched by `catch <Kind> e` clauses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Name => "NameError",
            ErrorKind::TypeMismatch => "TypeError",
            ErrorKind::AttributeMissing => "AttributeError",
            ErrorKind::IndexOutOfRange => "IndexError",
            ErrorKind::ArityMismatch => "ArityError",
            ErrorKind::ZeroDivision => "ZeroDivisionError",
            ErrorKind::Unhashable => "UnhashableError",
            ErrorKind::RecursionLimit => "RecursionError",
            ErrorKind::ForeignCall => "ForeignError",
            ErrorKind::UserThrown => "Throw",
            ErrorKind::Assertion => "AssertionError",
            ErrorKind::Import => "ImportError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame of a captured call chain.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub name: String,
    pub file: String,
    pub line: usize,
}

/// A structured runtime error: kind + message + the frame chain captured at
/// raise time. `value` carries the thrown payload for user throws; `context`
/// links an error raised while another one was being handled.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub value: Option<Value>,
    pub trace: Vec<TraceEntry>,
    pub context: Option<Box<RuntimeError>>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            value: None,
            trace: Vec::new(),
            context: None,
        }
    }

    pub fn name_error(name: &str) -> Self {
        Self::new(ErrorKind::Name, format!("name '{}' is not defined", name))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn attribute_error(kind_name: &str, attr: &str) -> Self {
        Self::new(
            ErrorKind::AttributeMissing,
            format!("{} object has no attribute '{}'", kind_name, attr),
        )
    }

    pub fn index_error(index: i64, length: usize) -> Self {
        Self::new(
            ErrorKind::IndexOutOfRange,
            format!("index {} out of range (length {})", index, length),
        )
    }

    pub fn arity_error(name: &str, expected: usize, got: usize) -> Self {
        Self::new(
            ErrorKind::ArityMismatch,
            format!("'{}' takes {} argument(s), but got {}", name, expected, got),
        )
    }

    pub fn zero_division() -> Self {
        Self::new(ErrorKind::ZeroDivision, "division by zero")
    }

    pub fn unhashable(kind_name: &str) -> Self {
        Self::new(
            ErrorKind::Unhashable,
            format!("{} object is not hashable", kind_name),
        )
    }

    pub fn foreign_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ForeignCall, message)
    }

    pub fn thrown(message: impl Into<String>, value: Value) -> Self {
        let mut err = Self::new(ErrorKind::UserThrown, message);
        err.value = Some(value);
        err
    }

    /// Render the full diagnostic: call chain outermost first, then the
    /// kind and message. Mirrors the frame chain at the moment of the raise.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(prev) = &self.context {
            out.push_str(&prev.render());
            out.push_str("\nDuring handling of the above error, another error occurred:\n\n");
        }
        for entry in &self.trace {
            out.push_str(&format!("in '{}' at line {}\n", entry.name, entry.line));
        }
        out.push_str(&format!("{}: {}", self.kind, self.message));
        out
    }

    /// Print the diagnostic to stderr, with the kind highlighted.
    pub fn report(&self) {
        if let Some(prev) = &self.context {
            prev.report();
            eprintln!("\nDuring handling of the above error, another error occurred:\n");
        }
        for entry in &self.trace {
            eprintln!("in '{}' at line {}", entry.name, entry.line);
        }
        eprintln!("{}: {}", self.kind.as_str().red().bold(), self.message);
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum RillError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
