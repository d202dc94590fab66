//! SQL Tokenizer implementation.

use super::{Keyword, Span, Token, TokenKind};

/// A lexer that tokenizes SQL input.
#[derive(Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    start: usize,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span())
    }

    fn scan_identifier(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[self.start..self.pos];
        if let Some(keyword) = Keyword::from_keyword(text) {
            self.make_token(TokenKind::Keyword(keyword))
        } else {
            self.make_token(TokenKind::Identifier(text.to_string()))
        }
    }

    /// Scans a number literal: digits, optionally with a single `.`, and
    /// optionally an exponent.
    /// Decimal/exponent literals are decoded and truncated to their integer
    /// part since the dialect has no floating-point scalar kind.
    fn scan_number(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        let mut is_decimal = false;
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_decimal = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            is_decimal = true;
            self.advance();
            if self.peek().is_some_and(|c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.input[self.start..self.pos];
        if is_decimal {
            match text.parse::<f64>() {
                Ok(f) => self.make_token(TokenKind::Number(f as i64)),
                Err(e) => self.make_token(TokenKind::Error(format!("invalid number: {e}"))),
            }
        } else {
            match text.parse::<i64>() {
                Ok(i) => self.make_token(TokenKind::Number(i)),
                Err(e) => self.make_token(TokenKind::Error(format!("invalid number: {e}"))),
            }
        }
    }

    /// Scans a single-quoted string literal. No escape sequences (spec
    /// §4.1); an unterminated string surfaces as a lex error.
    fn scan_string(&mut self) -> Token {
        self.advance(); // opening quote
        let content_start = self.pos;

        loop {
            match self.peek() {
                Some('\'') => break,
                Some(_) => {
                    self.advance();
                }
                None => {
                    return self.make_token(TokenKind::Error(
                        "unterminated string literal".to_string(),
                    ));
                }
            }
        }

        let content = self.input[content_start..self.pos].to_string();
        self.advance(); // closing quote
        self.make_token(TokenKind::Str(content))
    }

    /// Scans and returns the next token, advancing past it.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.start = self.pos;

        let Some(c) = self.peek() else {
            return self.make_token(TokenKind::Eof);
        };

        if c.is_alphabetic() || c == '_' {
            return self.scan_identifier();
        }
        if c.is_ascii_digit() {
            return self.scan_number();
        }
        if c == '\'' {
            return self.scan_string();
        }

        self.advance();
        match c {
            '*' => self.make_token(TokenKind::Star),
            ',' => self.make_token(TokenKind::Comma),
            ';' => self.make_token(TokenKind::Semicolon),
            '(' => self.make_token(TokenKind::LParen),
            ')' => self.make_token(TokenKind::RParen),
            '=' => self.make_token(TokenKind::Eq),
            other => self.make_token(TokenKind::Error(format!("unexpected character '{other}'"))),
        }
    }

    /// Tokenizes the entire input, appending a trailing `Eof` token.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = matches!(tok.kind, TokenKind::Eof);
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_select_statement() {
        let kinds = kinds("SELECT * FROM users WHERE id = 1;");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Star,
                TokenKind::Keyword(Keyword::From),
                TokenKind::Identifier("users".to_string()),
                TokenKind::Keyword(Keyword::Where),
                TokenKind::Identifier("id".to_string()),
                TokenKind::Eq,
                TokenKind::Number(1),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(kinds("select")[0], TokenKind::Keyword(Keyword::Select));
        assert_eq!(kinds("SeLeCt")[0], TokenKind::Keyword(Keyword::Select));
    }

    #[test]
    fn lexes_string_literal() {
        let kinds = kinds("'hello world'");
        assert_eq!(kinds[0], TokenKind::Str("hello world".to_string()));
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let kinds = kinds("'hello");
        assert!(matches!(kinds[0], TokenKind::Error(_)));
    }

    #[test]
    fn identifier_allows_leading_underscore() {
        let kinds = kinds("_id");
        assert_eq!(kinds[0], TokenKind::Identifier("_id".to_string()));
    }
}
