//! Scanner for Rill source code.

use crate::error::LexerError;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

/// The scanner transforms source text into a stream of tokens.
///
/// Newlines are significant (they terminate simple statements) and are
/// emitted as `TokenKind::Newline`; consecutive blank lines collapse to one.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    column: usize,
    start_pos: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scan all tokens from the source.
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens: Vec<Token> = Vec::new();

        loop {
            let token = self.scan_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            // Collapse runs of newlines
            if token.kind == TokenKind::Newline
                && matches!(
                    tokens.last().map(|t| &t.kind),
                    None | Some(TokenKind::Newline)
                )
            {
                continue;
            }
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Scan the next token.
    fn scan_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments();
        self.mark_start();

        let Some((_, c)) = self.advance() else {
            return Ok(Token::eof(self.current_pos, self.line, self.column));
        };

        match c {
            '\n' => Ok(self.make_token(TokenKind::Newline)),
            '(' => Ok(self.make_token(TokenKind::LeftParen)),
            ')' => Ok(self.make_token(TokenKind::RightParen)),
            '{' => Ok(self.make_token(TokenKind::LeftBrace)),
            '}' => Ok(self.make_token(TokenKind::RightBrace)),
            '[' => Ok(self.make_token(TokenKind::LeftBracket)),
            ']' => Ok(self.make_token(TokenKind::RightBracket)),
            ',' => Ok(self.make_token(TokenKind::Comma)),
            '.' => Ok(self.make_token(TokenKind::Dot)),
            ':' => Ok(self.make_token(TokenKind::Colon)),
            ';' => Ok(self.make_token(TokenKind::Semicolon)),
            '+' => Ok(self.make_token(TokenKind::Plus)),
            '-' => {
                if self.match_char('>') {
                    Ok(self.make_token(TokenKind::Arrow))
                } else {
                    Ok(self.make_token(TokenKind::Minus))
                }
            }
            '*' => Ok(self.make_token(TokenKind::Star)),
            '/' => Ok(self.make_token(TokenKind::Slash)),
            '%' => Ok(self.make_token(TokenKind::Percent)),
            '^' => Ok(self.make_token(TokenKind::Caret)),
            '=' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::EqualEqual))
                } else {
                    Ok(self.make_token(TokenKind::Equal))
                }
            }
            '!' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::BangEqual))
                } else {
                    Ok(self.make_token(TokenKind::Bang))
                }
            }
            '<' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::LessEqual))
                } else {
                    Ok(self.make_token(TokenKind::Less))
                }
            }
            '>' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::GreaterEqual))
                } else {
                    Ok(self.make_token(TokenKind::Greater))
                }
            }
            '&' => {
                if self.match_char('&') {
                    Ok(self.make_token(TokenKind::AndAnd))
                } else {
                    Err(LexerError::UnexpectedChar(c, self.current_span()))
                }
            }
            '|' => {
                if self.match_char('|') {
                    Ok(self.make_token(TokenKind::OrOr))
                } else {
                    Err(LexerError::UnexpectedChar(c, self.current_span()))
                }
            }
            '"' => self.scan_string(),
            c if c.is_ascii_digit() => self.scan_number(c),
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(c),
            _ => Err(LexerError::UnexpectedChar(c, self.current_span())),
        }
    }

    fn scan_string(&mut self) -> Result<Token, LexerError> {
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return Err(LexerError::UnterminatedString(self.current_span())),
                Some((_, '"')) => break,
                Some((_, '\n')) => return Err(LexerError::UnterminatedString(self.current_span())),
                Some((_, '\\')) => match self.advance() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, '"')) => value.push('"'),
                    Some((_, '0')) => value.push('\0'),
                    Some((_, other)) => {
                        return Err(LexerError::InvalidEscape(other, self.current_span()))
                    }
                    None => return Err(LexerError::UnterminatedString(self.current_span())),
                },
                Some((_, c)) => value.push(c),
            }
        }

        Ok(self.make_token(TokenKind::StringLiteral(value)))
    }

    fn scan_number(&mut self, _first: char) -> Result<Token, LexerError> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        let mut is_float = false;
        // A '.' is part of the number only when followed by a digit, so that
        // `1.abs` stays an attribute access.
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(1), Some('+') | Some('-')) {
                lookahead = 2;
            }
            if matches!(self.peek_at(lookahead), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                for _ in 0..=lookahead {
                    self.advance();
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = &self.source[self.start_pos..self.current_pos];
        if is_float {
            match text.parse::<f64>() {
                Ok(v) => Ok(self.make_token(TokenKind::FloatLiteral(v))),
                Err(_) => Err(LexerError::InvalidNumber(
                    text.to_string(),
                    self.current_span(),
                )),
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => Ok(self.make_token(TokenKind::IntLiteral(v))),
                Err(_) => Err(LexerError::InvalidNumber(
                    text.to_string(),
                    self.current_span(),
                )),
            }
        }
    }

    fn scan_identifier(&mut self, _first: char) -> Result<Token, LexerError> {
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }

        let text = &self.source[self.start_pos..self.current_pos];
        let kind =
            TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()));
        Ok(self.make_token(kind))
    }

    // ===== Character handling =====

    fn advance(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((pos, c)) = next {
            self.current_pos = pos + c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.current_pos..].chars().nth(n)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn mark_start(&mut self) {
        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            Span::new(
                self.start_pos,
                self.current_pos,
                self.start_line,
                self.start_column,
            ),
        )
    }

    fn current_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_operators_and_numbers() {
        assert_eq!(
            kinds("1 + 2.5 * x"),
            vec![
                TokenKind::IntLiteral(1),
                TokenKind::Plus,
                TokenKind::FloatLiteral(2.5),
                TokenKind::Star,
                TokenKind::Identifier("x".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(
            kinds("while whilex"),
            vec![
                TokenKind::While,
                TokenKind::Identifier("whilex".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\nb""#),
            vec![TokenKind::StringLiteral("a\nb".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn newlines_collapse() {
        assert_eq!(
            kinds("a\n\n\nb"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Newline,
                TokenKind::Identifier("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("a // comment\nb"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Newline,
                TokenKind::Identifier("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn dot_after_int_is_member_access() {
        assert_eq!(
            kinds("p.x"),
            vec![
                TokenKind::Identifier("p".to_string()),
                TokenKind::Dot,
                TokenKind::Identifier("x".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_numbers_advance() {
        let tokens = Scanner::new("a\nb").scan_tokens().unwrap();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[2].span.line, 2);
    }
}
