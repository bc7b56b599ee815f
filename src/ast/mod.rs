//! AST node definitions: tagged nodes, each carrying a source span.

pub mod expr;
pub mod stmt;

pub use expr::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
pub use stmt::{AssignTarget, CatchClause, FunctionDecl, Program, Stmt, StmtKind};
