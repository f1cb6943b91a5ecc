//! Recursive-descent parser for instance files
//!
//! Grammar:
//!
//! ```text
//! document  := statement*
//! statement := NAME '=' value ';'
//! value     := NUMBER | '[' items ']' | '(' items ')'
//! items     := (value (',' value)* ','?)?
//! ```

use num_traits::ToPrimitive;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::loader::{
    ParseError,
    lexer::{Lexer, Token, TokenKind},
};

/// A parsed value, before it is given a meaning by its field.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    /// Scalar
    Number(f64),

    /// `[a, b, ...]`
    List(Vec<Value>),

    /// `(a, b, ...)`
    Tuple(Vec<Value>),
}

impl Value {
    pub(crate) fn into_number(self, field: &'static str) -> Result<f64, ParseError> {
        match self {
            Value::Number(n) => Ok(n),
            _ => Err(ParseError::InvalidValue {
                field,
                expected: "a number",
            }),
        }
    }

    pub(crate) fn into_integer(self, field: &'static str) -> Result<u64, ParseError> {
        let n = self.into_number(field)?;

        integral(field, n)
    }

    pub(crate) fn into_index(self, field: &'static str) -> Result<usize, ParseError> {
        let n = self.into_number(field)?;

        integral(field, n)?
            .to_usize()
            .ok_or(ParseError::NotAnInteger { field, value: n })
    }

    fn into_items(self, field: &'static str, expected: &'static str) -> Result<Vec<Value>, ParseError> {
        match self {
            Value::List(items) | Value::Tuple(items) => Ok(items),
            Value::Number(_) => Err(ParseError::InvalidValue { field, expected }),
        }
    }

    pub(crate) fn into_numbers(self, field: &'static str) -> Result<Vec<f64>, ParseError> {
        self.into_items(field, "a list of numbers")?
            .into_iter()
            .map(|v| v.into_number(field))
            .collect()
    }

    pub(crate) fn into_integers(self, field: &'static str) -> Result<Vec<u64>, ParseError> {
        self.into_items(field, "a list of integers")?
            .into_iter()
            .map(|v| v.into_integer(field))
            .collect()
    }

    pub(crate) fn into_matrix(self, field: &'static str) -> Result<Vec<Vec<f64>>, ParseError> {
        self.into_items(field, "a list of rows")?
            .into_iter()
            .map(|row| row.into_numbers(field))
            .collect()
    }

    /// A list of index tuples; every tuple must have `arity` members if given.
    pub(crate) fn into_index_tuples(
        self,
        field: &'static str,
        arity: Option<usize>,
    ) -> Result<Vec<Vec<usize>>, ParseError> {
        self.into_items(field, "a list of index tuples")?
            .into_iter()
            .map(|entry| {
                let members = entry
                    .into_items(field, "an index tuple")?
                    .into_iter()
                    .map(|v| v.into_index(field))
                    .collect::<Result<Vec<_>, _>>()?;

                match arity {
                    Some(n) if members.len() != n => Err(ParseError::InvalidValue {
                        field,
                        expected: "a list of index pairs",
                    }),
                    _ => Ok(members),
                }
            })
            .collect()
    }
}

fn integral(field: &'static str, n: f64) -> Result<u64, ParseError> {
    if n.fract() != 0.0 || n < 0.0 {
        return Err(ParseError::NotAnInteger { field, value: n });
    }

    n.to_u64().ok_or(ParseError::NotAnInteger { field, value: n })
}

/// All statements of a file, by name.
#[derive(Debug, Default)]
pub(crate) struct Document {
    statements: FxHashMap<String, Value>,
}

impl Document {
    /// Remove and return a required statement.
    pub(crate) fn take(&mut self, field: &'static str) -> Result<Value, ParseError> {
        self.statements
            .remove(field)
            .ok_or(ParseError::MissingField { field })
    }

    /// Remove and return an optional statement.
    pub(crate) fn take_optional(&mut self, field: &str) -> Option<Value> {
        self.statements.remove(field)
    }

    /// Log statements that were never taken.
    pub(crate) fn finish(self) {
        for name in self.statements.keys() {
            debug!(name = %name, "ignoring unknown statement");
        }
    }
}

/// Parse source text into a [`Document`].
pub(crate) fn parse(src: &str) -> Result<Document, ParseError> {
    let mut parser = Parser {
        lexer: Lexer::new(src),
        lookahead: None,
        field: String::new(),
    };

    let mut document = Document::default();

    while parser.peek()?.is_some() {
        let (name, value) = parser.statement()?;

        if document.statements.contains_key(&name) {
            return Err(ParseError::DuplicateField { field: name });
        }

        document.statements.insert(name, value);
    }

    Ok(document)
}

struct Parser<'s> {
    lexer: Lexer<'s>,
    lookahead: Option<Token<'s>>,
    field: String,
}

impl<'s> Parser<'s> {
    fn peek(&mut self) -> Result<Option<TokenKind<'s>>, ParseError> {
        if self.lookahead.is_none() {
            self.lookahead = self.lexer.next().transpose()?;
        }

        Ok(self.lookahead.map(|t| t.kind))
    }

    fn next(&mut self, expected: &'static str) -> Result<Token<'s>, ParseError> {
        if let Some(token) = self.lookahead.take() {
            return Ok(token);
        }

        self.lexer
            .next()
            .transpose()?
            .ok_or(ParseError::UnexpectedEnd { expected })
    }

    fn expect(&mut self, kind: TokenKind<'static>, expected: &'static str) -> Result<(), ParseError> {
        let token = self.next(expected)?;

        if token.kind == kind {
            Ok(())
        } else {
            Err(unexpected(expected, token))
        }
    }

    fn statement(&mut self) -> Result<(String, Value), ParseError> {
        let token = self.next("a statement name")?;

        let TokenKind::Ident(name) = token.kind else {
            return Err(unexpected("a statement name", token));
        };

        name.clone_into(&mut self.field);

        self.expect(TokenKind::Assign, "`=`")?;

        let value = self.value()?;

        self.expect(TokenKind::Semicolon, "`;`")?;

        Ok((name.to_string(), value))
    }

    fn value(&mut self) -> Result<Value, ParseError> {
        let token = self.next("a value")?;

        match token.kind {
            TokenKind::Number(text) => self.number(text).map(Value::Number),
            TokenKind::OpenBracket => self.items(TokenKind::CloseBracket).map(Value::List),
            TokenKind::OpenParen => self.items(TokenKind::CloseParen).map(Value::Tuple),
            _ => Err(unexpected("a value", token)),
        }
    }

    fn number(&self, text: &str) -> Result<f64, ParseError> {
        text.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| ParseError::InvalidNumber {
                field: self.field.clone(),
                fragment: text.to_string(),
            })
    }

    fn items(&mut self, close: TokenKind<'static>) -> Result<Vec<Value>, ParseError> {
        let mut items = Vec::new();

        loop {
            if self.peek()? == Some(close) {
                self.next("a closing delimiter")?;

                return Ok(items);
            }

            items.push(self.value()?);

            let token = self.next("`,` or a closing delimiter")?;

            if token.kind == close {
                return Ok(items);
            }

            if token.kind != TokenKind::Comma {
                return Err(unexpected("`,` or a closing delimiter", token));
            }
        }
    }
}

fn unexpected(expected: &'static str, token: Token<'_>) -> ParseError {
    ParseError::UnexpectedToken {
        expected,
        found: token.kind.describe(),
        offset: token.offset,
    }
}
