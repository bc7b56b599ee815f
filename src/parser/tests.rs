//! Parser tests.

use crate::ast::*;
use crate::parser::parse_source;

fn parse_stmt(source: &str) -> Stmt {
    parse_source(source)
        .unwrap()
        .statements
        .into_iter()
        .next()
        .unwrap()
}

fn parse_expr(source: &str) -> Expr {
    match parse_stmt(source).kind {
        StmtKind::Expression(expr) => expr,
        other => panic!("Expected expression statement, got {:?}", other),
    }
}

#[test]
fn binary_expr() {
    match parse_expr("1 + 2").kind {
        ExprKind::Binary { operator, .. } => assert_eq!(operator, BinaryOp::Add),
        other => panic!("Expected binary expression, got {:?}", other),
    }
}

#[test]
fn precedence() {
    // 1 + 2 * 3 parses as 1 + (2 * 3)
    match parse_expr("1 + 2 * 3").kind {
        ExprKind::Binary {
            operator: BinaryOp::Add,
            right,
            ..
        } => match right.kind {
            ExprKind::Binary {
                operator: BinaryOp::Multiply,
                ..
            } => {}
            other => panic!("Expected multiply on right, got {:?}", other),
        },
        other => panic!("Expected add at top, got {:?}", other),
    }
}

#[test]
fn power_is_right_associative() {
    match parse_expr("2 ^ 3 ^ 2").kind {
        ExprKind::Binary {
            operator: BinaryOp::Power,
            right,
            ..
        } => match right.kind {
            ExprKind::Binary {
                operator: BinaryOp::Power,
                ..
            } => {}
            other => panic!("Expected power on right, got {:?}", other),
        },
        other => panic!("Expected power at top, got {:?}", other),
    }
}

#[test]
fn assignment_statement() {
    match parse_stmt("x = 1 + 2").kind {
        StmtKind::Assign {
            target: AssignTarget::Name(name),
            ..
        } => assert_eq!(name, "x"),
        other => panic!("Expected assignment, got {:?}", other),
    }
}

#[test]
fn member_assignment_target() {
    match parse_stmt("p.x = 3").kind {
        StmtKind::Assign {
            target: AssignTarget::Member { name, .. },
            ..
        } => assert_eq!(name, "x"),
        other => panic!("Expected member assignment, got {:?}", other),
    }
}

#[test]
fn invalid_assignment_target() {
    let result = parse_source("1 + 2 = 3");
    assert!(result.is_err());
}

#[test]
fn while_statement() {
    let source = "while i < 5 { i = i + 1 }";
    match parse_stmt(source).kind {
        StmtKind::While { body, .. } => assert_eq!(body.len(), 1),
        other => panic!("Expected while, got {:?}", other),
    }
}

#[test]
fn for_statement_clauses() {
    let source = "for i = 0; i < 10; i = i + 1 { print i }";
    match parse_stmt(source).kind {
        StmtKind::For {
            init,
            condition,
            update,
            body,
        } => {
            assert!(init.is_some());
            assert!(condition.is_some());
            assert!(update.is_some());
            assert_eq!(body.len(), 1);
        }
        other => panic!("Expected for, got {:?}", other),
    }
}

#[test]
fn function_declaration() {
    let source = "func add(a, b) { return a + b }";
    match parse_stmt(source).kind {
        StmtKind::Function(decl) => {
            assert_eq!(decl.name, "add");
            assert_eq!(decl.params, vec!["a".to_string(), "b".to_string()]);
            assert!(decl.receiver.is_none());
        }
        other => panic!("Expected function, got {:?}", other),
    }
}

#[test]
fn method_declaration() {
    let source = "func (Point) norm() { return this.x }";
    match parse_stmt(source).kind {
        StmtKind::Function(decl) => {
            assert_eq!(decl.receiver.as_deref(), Some("Point"));
            assert_eq!(decl.name, "norm");
        }
        other => panic!("Expected method, got {:?}", other),
    }
}

#[test]
fn anonymous_function_expression() {
    match parse_stmt("f = func (x) { return x }").kind {
        StmtKind::Assign { value, .. } => match value.kind {
            ExprKind::Function { params, .. } => assert_eq!(params, vec!["x".to_string()]),
            other => panic!("Expected function expression, got {:?}", other),
        },
        other => panic!("Expected assignment, got {:?}", other),
    }
}

#[test]
fn try_catch_finally() {
    let source = "try { f() } catch TypeError e { g() } catch e { h() } finally { k() }";
    match parse_stmt(source).kind {
        StmtKind::Try {
            catches, finally, ..
        } => {
            assert_eq!(catches.len(), 2);
            assert_eq!(catches[0].kind.as_deref(), Some("TypeError"));
            assert_eq!(catches[0].name, "e");
            assert!(catches[1].kind.is_none());
            assert!(finally.is_some());
        }
        other => panic!("Expected try, got {:?}", other),
    }
}

#[test]
fn try_without_handlers_is_an_error() {
    assert!(parse_source("try { f() }").is_err());
}

#[test]
fn struct_declaration() {
    let source = "struct Point { x; y }";
    match parse_stmt(source).kind {
        StmtKind::StructDef { name, fields } => {
            assert_eq!(name, "Point");
            assert_eq!(fields, vec!["x".to_string(), "y".to_string()]);
        }
        other => panic!("Expected struct, got {:?}", other),
    }
}

#[test]
fn print_and_input() {
    match parse_stmt("print a, b").kind {
        StmtKind::Print(values) => assert_eq!(values.len(), 2),
        other => panic!("Expected print, got {:?}", other),
    }
    match parse_stmt("input \"? \" -> a, b").kind {
        StmtKind::Input { targets, .. } => {
            assert_eq!(targets, vec!["a".to_string(), "b".to_string()])
        }
        other => panic!("Expected input, got {:?}", other),
    }
}

#[test]
fn newlines_terminate_statements() {
    let program = parse_source("x = 1\ny = 2\n").unwrap();
    assert_eq!(program.statements.len(), 2);
}

#[test]
fn semicolons_terminate_statements() {
    let program = parse_source("x = 1; y = 2; z = 3").unwrap();
    assert_eq!(program.statements.len(), 3);
}

#[test]
fn map_literal() {
    match parse_expr("{\"a\": 1, \"b\": 2}").kind {
        ExprKind::Map(entries) => assert_eq!(entries.len(), 2),
        other => panic!("Expected map literal, got {:?}", other),
    }
}

#[test]
fn call_chain() {
    match parse_expr("f(1)(2)").kind {
        ExprKind::Call { callee, .. } => match callee.kind {
            ExprKind::Call { .. } => {}
            other => panic!("Expected inner call, got {:?}", other),
        },
        other => panic!("Expected call, got {:?}", other),
    }
}

#[test]
fn global_declaration() {
    match parse_stmt("global a, b").kind {
        StmtKind::Global(names) => assert_eq!(names, vec!["a".to_string(), "b".to_string()]),
        other => panic!("Expected global, got {:?}", other),
    }
}
