//! Statement parsing.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl Parser {
    /// Parse one statement (any kind).
    pub(crate) fn statement(&mut self) -> ParseResult<Stmt> {
        match self.peek().kind {
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Func => self.function_declaration(),
            TokenKind::Struct => self.struct_declaration(),
            TokenKind::Try => self.try_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Break => self.simple_keyword(StmtKind::Break),
            TokenKind::Continue => self.simple_keyword(StmtKind::Continue),
            TokenKind::Throw => self.throw_statement(),
            TokenKind::Assert => self.assert_statement(),
            TokenKind::Global => self.global_statement(),
            TokenKind::Import => self.import_statement(),
            TokenKind::Print => self.print_statement(),
            TokenKind::Input => self.input_statement(),
            _ => self.assign_or_expression_statement(),
        }
    }

    /// `{ statements }`
    pub(crate) fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut statements = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
            self.skip_separators();
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(statements)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // if
        let condition = self.expression()?;
        let then_branch = self.block()?;

        let else_branch = if self.match_token(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(vec![self.if_statement()?])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span,
        ))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // while
        let condition = self.expression()?;
        let body = self.block()?;
        Ok(Stmt::new(StmtKind::While { condition, body }, span))
    }

    /// `for init; cond; update { ... }` — any of the three clauses may be empty.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // for

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.for_clause()?))
        };
        self.expect(&TokenKind::Semicolon)?;

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::LeftBrace) {
            None
        } else {
            Some(Box::new(self.for_clause()?))
        };

        let body = self.block()?;
        Ok(Stmt::new(
            StmtKind::For {
                init,
                condition,
                update,
                body,
            },
            span,
        ))
    }

    /// An assignment or expression, without a statement terminator (used in
    /// for-loop headers).
    fn for_clause(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        let expr = self.expression()?;
        if self.match_token(&TokenKind::Equal) {
            let target = self.expr_to_assign_target(expr)?;
            let value = self.expression()?;
            Ok(Stmt::new(StmtKind::Assign { target, value }, span))
        } else {
            Ok(Stmt::new(StmtKind::Expression(expr), span))
        }
    }

    /// `func name(params) { ... }` or `func (Type) name(params) { ... }`
    fn function_declaration(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // func

        let receiver = if self.match_token(&TokenKind::LeftParen) {
            let name = self.expect_identifier("receiver type name")?;
            self.expect(&TokenKind::RightParen)?;
            Some(name)
        } else {
            None
        };

        let name = self.expect_identifier("function name")?;
        let params = self.parameter_list()?;
        let body = self.block()?;

        Ok(Stmt::new(
            StmtKind::Function(FunctionDecl {
                name,
                receiver,
                params,
                body,
                span,
            }),
            span,
        ))
    }

    pub(crate) fn parameter_list(&mut self) -> ParseResult<Vec<String>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        self.skip_newlines();
        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.expect_identifier("parameter name")?);
                self.skip_newlines();
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
                self.skip_newlines();
            }
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(params)
    }

    /// `struct Name { field; field }`
    fn struct_declaration(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // struct
        let name = self.expect_identifier("struct name")?;
        self.expect(&TokenKind::LeftBrace)?;

        let mut fields = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            fields.push(self.expect_identifier("field name")?);
            self.skip_separators();
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(Stmt::new(StmtKind::StructDef { name, fields }, span))
    }

    /// `try { } catch Kind e { } catch e { } finally { }`
    fn try_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // try
        let body = self.block()?;

        let mut catches = Vec::new();
        while self.check(&TokenKind::Catch) {
            let clause_span = self.current_span();
            self.advance();
            // Two identifiers: kind filter + binding; one: binding only.
            let first = self.expect_identifier("error binding name")?;
            let (kind, name) = if matches!(self.peek().kind, TokenKind::Identifier(_)) {
                (Some(first), self.expect_identifier("error binding name")?)
            } else {
                (None, first)
            };
            let body = self.block()?;
            catches.push(CatchClause {
                kind,
                name,
                body,
                span: clause_span,
            });
        }

        let finally = if self.match_token(&TokenKind::Finally) {
            Some(self.block()?)
        } else {
            None
        };

        if catches.is_empty() && finally.is_none() {
            return Err(ParserError::general(
                "try statement requires at least one catch or finally block",
                span,
            ));
        }

        Ok(Stmt::new(
            StmtKind::Try {
                body,
                catches,
                finally,
            },
            span,
        ))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // return
        let value = if matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        ) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_terminator()?;
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    fn simple_keyword(&mut self, kind: StmtKind) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance();
        self.expect_terminator()?;
        Ok(Stmt::new(kind, span))
    }

    fn throw_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // throw
        let value = self.expression()?;
        self.expect_terminator()?;
        Ok(Stmt::new(StmtKind::Throw(value), span))
    }

    fn assert_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // assert
        let condition = self.expression()?;
        self.expect_terminator()?;
        Ok(Stmt::new(StmtKind::Assert(condition), span))
    }

    fn global_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // global
        let mut names = vec![self.expect_identifier("variable name")?];
        while self.match_token(&TokenKind::Comma) {
            names.push(self.expect_identifier("variable name")?);
        }
        self.expect_terminator()?;
        Ok(Stmt::new(StmtKind::Global(names), span))
    }

    fn import_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // import
        let path = match &self.peek().kind {
            TokenKind::StringLiteral(s) => {
                let s = s.clone();
                self.advance();
                s
            }
            other => {
                return Err(ParserError::unexpected_token(
                    "module path string",
                    format!("{}", other),
                    self.current_span(),
                ))
            }
        };
        self.expect_terminator()?;
        Ok(Stmt::new(StmtKind::Import(path), span))
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // print
        let mut values = vec![self.expression()?];
        while self.match_token(&TokenKind::Comma) {
            values.push(self.expression()?);
        }
        self.expect_terminator()?;
        Ok(Stmt::new(StmtKind::Print(values), span))
    }

    /// `input "prompt" -> a, b`
    fn input_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        self.advance(); // input
        let prompt = self.expression()?;
        self.expect(&TokenKind::Arrow)?;
        let mut targets = vec![self.expect_identifier("input target name")?];
        while self.match_token(&TokenKind::Comma) {
            targets.push(self.expect_identifier("input target name")?);
        }
        self.expect_terminator()?;
        Ok(Stmt::new(StmtKind::Input { prompt, targets }, span))
    }

    /// Either `target = expr` or a bare expression statement.
    fn assign_or_expression_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.current_span();
        let expr = self.expression()?;

        if self.match_token(&TokenKind::Equal) {
            let target = self.expr_to_assign_target(expr)?;
            let value = self.expression()?;
            self.expect_terminator()?;
            return Ok(Stmt::new(StmtKind::Assign { target, value }, span));
        }

        self.expect_terminator()?;
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }

    fn expr_to_assign_target(&self, expr: Expr) -> ParseResult<AssignTarget> {
        match expr.kind {
            ExprKind::Variable(name) => Ok(AssignTarget::Name(name)),
            ExprKind::Member { object, name } => Ok(AssignTarget::Member {
                object: *object,
                name,
            }),
            ExprKind::Index { object, index } => Ok(AssignTarget::Index {
                object: *object,
                index: *index,
            }),
            _ => Err(ParserError::InvalidAssignmentTarget(expr.span)),
        }
    }
}
