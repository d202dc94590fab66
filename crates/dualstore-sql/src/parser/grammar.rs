//! Recursive-descent parser for the restricted SQL dialect.

use super::ast::{
    Assignment, CreateStatement, DeleteStatement, Equality, InsertStatement, MetaCommand,
    Predicate, Projection, SelectStatement, Statement, UpdateStatement,
};
use super::error::ParseError;
use crate::lexer::{Keyword, Lexer, Span, Token, TokenKind};
use crate::value::{Column, ColumnType, Scalar};

/// SQL parser over a token stream produced by [`Lexer`].
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self { lexer, current }
    }

    fn bump(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn span(&self) -> Span {
        self.current.span
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(&self.current.kind, TokenKind::Keyword(k) if *k == kw)
    }

    fn eat_keyword(&mut self, kw: Keyword) -> Result<(), ParseError> {
        if self.check_keyword(kw) {
            self.bump();
            Ok(())
        } else {
            Err(self.expected(kw.as_str()))
        }
    }

    fn expected(&self, what: &str) -> ParseError {
        match &self.current.kind {
            TokenKind::Eof => ParseError::unexpected_eof(what, self.span()),
            TokenKind::Error(msg) => ParseError::new(msg.clone(), self.span()),
            other => ParseError::unexpected(what, other.clone(), self.span()),
        }
    }

    fn eat_punct(&mut self, kind: &TokenKind, what: &str) -> Result<(), ParseError> {
        if std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind) {
            self.bump();
            Ok(())
        } else {
            Err(self.expected(what))
        }
    }

    fn eat_identifier(&mut self) -> Result<String, ParseError> {
        match self.current.kind.clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.expected("identifier")),
        }
    }

    fn eat_literal(&mut self) -> Result<Scalar, ParseError> {
        match self.current.kind.clone() {
            TokenKind::Number(n) => {
                self.bump();
                Ok(Scalar::Int(n))
            }
            TokenKind::Str(s) => {
                self.bump();
                Ok(Scalar::Str(s))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.bump();
                Ok(Scalar::Null)
            }
            _ => Err(self.expected("literal")),
        }
    }

    /// Parses exactly one statement. A terminating `;` or end-of-input is
    /// the only acceptable end; trailing garbage is a parse error
    ///.
    pub fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let stmt = match &self.current.kind {
            TokenKind::Keyword(Keyword::Select) => Statement::Select(self.parse_select()?),
            TokenKind::Keyword(Keyword::Insert) => Statement::Insert(self.parse_insert()?),
            TokenKind::Keyword(Keyword::Update) => Statement::Update(self.parse_update()?),
            TokenKind::Keyword(Keyword::Delete) => Statement::Delete(self.parse_delete()?),
            TokenKind::Keyword(Keyword::Create) => Statement::Create(self.parse_create()?),
            TokenKind::Keyword(Keyword::Show) => {
                self.bump();
                self.eat_keyword(Keyword::Tables)?;
                Statement::ShowTables
            }
            _ => return Err(self.expected("a statement")),
        };
        self.eat_end()?;
        Ok(stmt)
    }

    fn eat_end(&mut self) -> Result<(), ParseError> {
        match &self.current.kind {
            TokenKind::Semicolon => {
                self.bump();
                if matches!(self.current.kind, TokenKind::Eof) {
                    Ok(())
                } else {
                    Err(self.expected("end of input"))
                }
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.expected("';' or end of input")),
        }
    }

    /// Parses a meta-command recognised ahead of the grammar:
    /// `SHOW TABLE <name>`, `EXPLAIN <select>`, `FORCE_SYNC`. Returns `None`
    /// if the input is not a meta-command so the caller can fall back to
    /// [`Self::parse_statement`].
    pub fn try_parse_meta(&mut self) -> Result<Option<MetaCommand>, ParseError> {
        match &self.current.kind {
            TokenKind::Keyword(Keyword::ForceSync) => {
                self.bump();
                self.eat_end()?;
                Ok(Some(MetaCommand::ForceSync))
            }
            TokenKind::Keyword(Keyword::Explain) => {
                self.bump();
                let select = self.parse_select()?;
                self.eat_end()?;
                Ok(Some(MetaCommand::Explain(select)))
            }
            TokenKind::Keyword(Keyword::Show) => {
                // Lookahead: `SHOW TABLE <name>` is a meta-command, while
                // `SHOW TABLES` is the ordinary grammar statement.
                let saved_lexer = self.lexer.clone();
                let saved_current = self.current.clone();
                self.bump();
                if matches!(self.current.kind, TokenKind::Keyword(Keyword::Table)) {
                    self.bump();
                    let table = self.eat_identifier()?;
                    self.eat_end()?;
                    return Ok(Some(MetaCommand::ShowTable(table)));
                }
                self.lexer = saved_lexer;
                self.current = saved_current;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn parse_projection(&mut self) -> Result<Projection, ParseError> {
        if matches!(self.current.kind, TokenKind::Star) {
            self.bump();
            return Ok(Projection::Star);
        }
        let mut columns = vec![self.parse_select_column()?];
        while matches!(self.current.kind, TokenKind::Comma) {
            self.bump();
            columns.push(self.parse_select_column()?);
        }
        Ok(Projection::Columns(columns))
    }

    /// Parses one item in a `SELECT` column list. `COUNT(*)` is a reserved
    /// spelling the executor treats as a scalar aggregate.
    fn parse_select_column(&mut self) -> Result<String, ParseError> {
        if self.check_keyword(Keyword::Count) {
            self.bump();
            self.eat_punct(&TokenKind::LParen, "'('")?;
            self.eat_punct(&TokenKind::Star, "'*'")?;
            self.eat_punct(&TokenKind::RParen, "')'")?;
            return Ok("COUNT(*)".to_string());
        }
        self.eat_identifier()
    }

    fn parse_predicate(&mut self) -> Result<Predicate, ParseError> {
        if !self.check_keyword(Keyword::Where) {
            return Ok(Predicate::default());
        }
        self.bump();

        let mut equalities = vec![self.parse_equality()?];
        loop {
            if self.check_keyword(Keyword::And) || self.check_keyword(Keyword::Or) {
                self.bump();
                equalities.push(self.parse_equality()?);
            } else {
                break;
            }
        }
        Ok(Predicate(equalities))
    }

    fn parse_equality(&mut self) -> Result<Equality, ParseError> {
        let column = self.eat_identifier()?;
        self.eat_punct(&TokenKind::Eq, "'='")?;
        let value = self.eat_literal()?;
        Ok(Equality { column, value })
    }

    fn parse_select(&mut self) -> Result<SelectStatement, ParseError> {
        self.eat_keyword(Keyword::Select)?;
        let projection = self.parse_projection()?;
        self.eat_keyword(Keyword::From)?;
        let table = self.eat_identifier()?;
        let predicate = self.parse_predicate()?;
        Ok(SelectStatement {
            table,
            projection,
            predicate,
        })
    }

    fn parse_insert(&mut self) -> Result<InsertStatement, ParseError> {
        self.eat_keyword(Keyword::Insert)?;
        self.eat_keyword(Keyword::Into)?;
        let table = self.eat_identifier()?;
        self.eat_keyword(Keyword::Values)?;
        self.eat_punct(&TokenKind::LParen, "'('")?;

        let mut values = vec![self.eat_literal()?];
        while matches!(self.current.kind, TokenKind::Comma) {
            self.bump();
            values.push(self.eat_literal()?);
        }
        self.eat_punct(&TokenKind::RParen, "')'")?;

        Ok(InsertStatement { table, values })
    }

    fn parse_update(&mut self) -> Result<UpdateStatement, ParseError> {
        self.eat_keyword(Keyword::Update)?;
        let table = self.eat_identifier()?;
        self.eat_keyword(Keyword::Set)?;

        let mut assignments = vec![self.parse_assignment()?];
        while matches!(self.current.kind, TokenKind::Comma) {
            self.bump();
            assignments.push(self.parse_assignment()?);
        }
        let predicate = self.parse_predicate()?;

        Ok(UpdateStatement {
            table,
            assignments,
            predicate,
        })
    }

    fn parse_assignment(&mut self) -> Result<Assignment, ParseError> {
        let column = self.eat_identifier()?;
        self.eat_punct(&TokenKind::Eq, "'='")?;
        let value = self.eat_literal()?;
        Ok(Assignment { column, value })
    }

    fn parse_delete(&mut self) -> Result<DeleteStatement, ParseError> {
        self.eat_keyword(Keyword::Delete)?;
        self.eat_keyword(Keyword::From)?;
        let table = self.eat_identifier()?;
        let predicate = self.parse_predicate()?;
        Ok(DeleteStatement { table, predicate })
    }

    /// `CREATE TABLE name (col_def (',' col_def)*)`. Duplicate column names
    /// fail to parse; emitted columns default to nullable.
    fn parse_create(&mut self) -> Result<CreateStatement, ParseError> {
        self.eat_keyword(Keyword::Create)?;
        self.eat_keyword(Keyword::Table)?;
        let table = self.eat_identifier()?;
        self.eat_punct(&TokenKind::LParen, "'('")?;

        let mut columns = vec![self.parse_column_def()?];
        while matches!(self.current.kind, TokenKind::Comma) {
            self.bump();
            columns.push(self.parse_column_def()?);
        }
        self.eat_punct(&TokenKind::RParen, "')'")?;

        let mut seen = std::collections::HashSet::new();
        for c in &columns {
            if !seen.insert(c.name.clone()) {
                return Err(ParseError::new(
                    format!("duplicate column name '{}'", c.name),
                    self.span(),
                ));
            }
        }

        Ok(CreateStatement { table, columns })
    }

    fn parse_column_def(&mut self) -> Result<Column, ParseError> {
        let name = self.eat_identifier()?;
        let ty = match &self.current.kind {
            TokenKind::Keyword(Keyword::Int) => {
                self.bump();
                ColumnType::Int
            }
            TokenKind::Keyword(Keyword::String | Keyword::Text) => {
                self.bump();
                ColumnType::String
            }
            _ => return Err(self.expected("a column type (INT, STRING or TEXT)")),
        };
        Ok(Column::new(name, ty, true))
    }
}
