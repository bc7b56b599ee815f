//! Statement AST nodes.

use crate::ast::expr::Expr;
use crate::span::Span;

/// A complete parsed program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

/// A statement in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The left-hand side of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    /// x = ...
    Name(String),
    /// obj.field = ...
    Member { object: Expr, name: String },
    /// arr[index] = ...
    Index { object: Expr, index: Expr },
}

/// One catch clause of a try statement. `kind` filters on the error kind
/// name ("TypeError", ...); `None` matches every error.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub kind: Option<String>,
    pub name: String,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// A named function declaration. `receiver` is the struct type name for
/// method definitions: `func (Point) norm() { ... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub receiver: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement (value discarded)
    Expression(Expr),

    /// Assignment: target = expr
    Assign { target: AssignTarget, value: Expr },

    /// if cond { ... } else { ... }
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },

    /// while cond { ... }
    While { condition: Expr, body: Vec<Stmt> },

    /// for init; cond; update { ... }
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },

    /// return expr?
    Return(Option<Expr>),

    /// break
    Break,

    /// continue
    Continue,

    /// throw expr
    Throw(Expr),

    /// assert expr
    Assert(Expr),

    /// try { ... } catch Kind e { ... } finally { ... }
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },

    /// Named function (or method) declaration
    Function(FunctionDecl),

    /// struct Name { field; field }
    StructDef { name: String, fields: Vec<String> },

    /// global a, b
    Global(Vec<String>),

    /// import "path"
    Import(String),

    /// print a, b
    Print(Vec<Expr>),

    /// input "prompt" -> a, b
    Input { prompt: Expr, targets: Vec<String> },
}
