//! Expression parsing with precedence climbing.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl Parser {
    pub(crate) fn expression(&mut self) -> ParseResult<Expr> {
        self.or_expression()
    }

    fn or_expression(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and_expression()?;
        while self.match_token(&TokenKind::OrOr) {
            let right = self.and_expression()?;
            let span = expr.span.merge(right.span);
            expr = Expr::new(
                ExprKind::Logical {
                    left: Box::new(expr),
                    operator: LogicalOp::Or,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn and_expression(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;
        while self.match_token(&TokenKind::AndAnd) {
            let right = self.equality()?;
            let span = expr.span.merge(right.span);
            expr = Expr::new(
                ExprKind::Logical {
                    left: Box::new(expr),
                    operator: LogicalOp::And,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;
        loop {
            let operator = if self.match_token(&TokenKind::EqualEqual) {
                BinaryOp::Equal
            } else if self.match_token(&TokenKind::BangEqual) {
                BinaryOp::NotEqual
            } else {
                break;
            };
            let right = self.comparison()?;
            let span = expr.span.merge(right.span);
            expr = Expr::new(
                ExprKind::Binary {
                    left: Box::new(expr),
                    operator,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;
        loop {
            let operator = if self.match_token(&TokenKind::Less) {
                BinaryOp::Less
            } else if self.match_token(&TokenKind::LessEqual) {
                BinaryOp::LessEqual
            } else if self.match_token(&TokenKind::Greater) {
                BinaryOp::Greater
            } else if self.match_token(&TokenKind::GreaterEqual) {
                BinaryOp::GreaterEqual
            } else {
                break;
            };
            let right = self.term()?;
            let span = expr.span.merge(right.span);
            expr = Expr::new(
                ExprKind::Binary {
                    left: Box::new(expr),
                    operator,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;
        loop {
            let operator = if self.match_token(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.match_token(&TokenKind::Minus) {
                BinaryOp::Subtract
            } else {
                break;
            };
            let right = self.factor()?;
            let span = expr.span.merge(right.span);
            expr = Expr::new(
                ExprKind::Binary {
                    left: Box::new(expr),
                    operator,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.power()?;
        loop {
            let operator = if self.match_token(&TokenKind::Star) {
                BinaryOp::Multiply
            } else if self.match_token(&TokenKind::Slash) {
                BinaryOp::Divide
            } else if self.match_token(&TokenKind::Percent) {
                BinaryOp::Modulo
            } else {
                break;
            };
            let right = self.power()?;
            let span = expr.span.merge(right.span);
            expr = Expr::new(
                ExprKind::Binary {
                    left: Box::new(expr),
                    operator,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(expr)
    }

    /// `^` is right-associative: `2 ^ 3 ^ 2` is `2 ^ (3 ^ 2)`.
    fn power(&mut self) -> ParseResult<Expr> {
        let base = self.unary()?;
        if self.match_token(&TokenKind::Caret) {
            let exponent = self.power()?;
            let span = base.span.merge(exponent.span);
            return Ok(Expr::new(
                ExprKind::Binary {
                    left: Box::new(base),
                    operator: BinaryOp::Power,
                    right: Box::new(exponent),
                },
                span,
            ));
        }
        Ok(base)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();
        if self.match_token(&TokenKind::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    operator: UnaryOp::Negate,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        if self.match_token(&TokenKind::Bang) {
            let operand = self.unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    operator: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.postfix()
    }

    /// Calls, subscripts and member accesses.
    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(&TokenKind::LeftParen) {
                let mut arguments = Vec::new();
                self.skip_newlines();
                if !self.check(&TokenKind::RightParen) {
                    loop {
                        arguments.push(self.expression()?);
                        self.skip_newlines();
                        if !self.match_token(&TokenKind::Comma) {
                            break;
                        }
                        self.skip_newlines();
                    }
                }
                let end = self.expect(&TokenKind::RightParen)?.span;
                let span = expr.span.merge(end);
                expr = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        arguments,
                    },
                    span,
                );
            } else if self.match_token(&TokenKind::LeftBracket) {
                self.skip_newlines();
                let index = self.expression()?;
                self.skip_newlines();
                let end = self.expect(&TokenKind::RightBracket)?.span;
                let span = expr.span.merge(end);
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else if self.match_token(&TokenKind::Dot) {
                let name = self.expect_identifier("attribute name")?;
                let span = expr.span.merge(self.previous().span);
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        name,
                    },
                    span,
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();
        let kind = self.peek().kind.clone();
        match kind {
            TokenKind::IntLiteral(v) => {
                self.advance();
                Ok(Expr::new(ExprKind::IntLiteral(v), span))
            }
            TokenKind::FloatLiteral(v) => {
                self.advance();
                Ok(Expr::new(ExprKind::FloatLiteral(v), span))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::StringLiteral(s), span))
            }
            TokenKind::BoolLiteral(b) => {
                self.advance();
                Ok(Expr::new(ExprKind::BoolLiteral(b), span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::new(ExprKind::Null, span))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Variable(name), span))
            }
            TokenKind::LeftParen => {
                self.advance();
                self.skip_newlines();
                let expr = self.expression()?;
                self.skip_newlines();
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.array_literal(),
            TokenKind::LeftBrace => self.map_literal(),
            TokenKind::Func => self.function_expression(),
            TokenKind::Eof => Err(ParserError::UnexpectedEof(span)),
            other => Err(ParserError::unexpected_token(
                "expression",
                format!("{}", other),
                span,
            )),
        }
    }

    fn array_literal(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();
        self.advance(); // [
        let mut items = Vec::new();
        self.skip_newlines();
        if !self.check(&TokenKind::RightBracket) {
            loop {
                items.push(self.expression()?);
                self.skip_newlines();
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
                self.skip_newlines();
            }
        }
        let end = self.expect(&TokenKind::RightBracket)?.span;
        Ok(Expr::new(ExprKind::Array(items), span.merge(end)))
    }

    fn map_literal(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();
        self.advance(); // {
        let mut entries = Vec::new();
        self.skip_newlines();
        if !self.check(&TokenKind::RightBrace) {
            loop {
                let key = self.expression()?;
                self.expect(&TokenKind::Colon)?;
                self.skip_newlines();
                let value = self.expression()?;
                entries.push((key, value));
                self.skip_newlines();
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
                self.skip_newlines();
            }
        }
        let end = self.expect(&TokenKind::RightBrace)?.span;
        Ok(Expr::new(ExprKind::Map(entries), span.merge(end)))
    }

    /// Anonymous function: `func (a, b) { ... }`
    fn function_expression(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();
        self.advance(); // func
        let params = self.parameter_list()?;
        let body = self.block()?;
        Ok(Expr::new(ExprKind::Function { params, body }, span))
    }
}
