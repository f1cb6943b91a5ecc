//! Tokenizer for instance files

use crate::loader::ParseError;

/// Kinds of token in an instance file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind<'s> {
    /// Statement name
    Ident(&'s str),

    /// Numeric literal, unparsed
    Number(&'s str),

    /// `=`
    Assign,

    /// `;`
    Semicolon,

    /// `,`
    Comma,

    /// `[`
    OpenBracket,

    /// `]`
    CloseBracket,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,
}

impl TokenKind<'_> {
    /// Human-readable rendering for error messages
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("name `{name}`"),
            TokenKind::Number(text) => format!("number `{text}`"),
            TokenKind::Assign => "`=`".to_string(),
            TokenKind::Semicolon => "`;`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::OpenBracket => "`[`".to_string(),
            TokenKind::CloseBracket => "`]`".to_string(),
            TokenKind::OpenParen => "`(`".to_string(),
            TokenKind::CloseParen => "`)`".to_string(),
        }
    }
}

/// A token and its byte offset in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'s> {
    pub(crate) kind: TokenKind<'s>,
    pub(crate) offset: usize,
}

/// Splits source text into tokens, skipping whitespace and `#` / `//` line comments.
#[derive(Debug, Clone)]
pub(crate) struct Lexer<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Lexer<'s> {
    pub(crate) fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'s str {
        self.src.get(self.pos..).unwrap_or_default()
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();

            self.pos += rest.len() - trimmed.len();

            if trimmed.starts_with('#') || trimmed.starts_with("//") {
                let line_len = trimmed.find('\n').unwrap_or(trimmed.len());

                self.pos += line_len;
            } else {
                return;
            }
        }
    }

    /// Consume characters while `accept` holds and return the consumed slice.
    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> &'s str {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(_, ch)| !accept(ch))
            .map_or(rest.len(), |(idx, _)| idx);

        self.pos += len;

        rest.get(..len).unwrap_or_default()
    }
}

fn is_number_char(ch: char) -> bool {
    ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E')
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

impl<'s> Iterator for Lexer<'s> {
    type Item = Result<Token<'s>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_trivia();

        let offset = self.pos;
        let ch = self.rest().chars().next()?;

        let punct = match ch {
            '=' => Some(TokenKind::Assign),
            ';' => Some(TokenKind::Semicolon),
            ',' => Some(TokenKind::Comma),
            '[' => Some(TokenKind::OpenBracket),
            ']' => Some(TokenKind::CloseBracket),
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            _ => None,
        };

        if let Some(kind) = punct {
            self.pos += ch.len_utf8();

            return Some(Ok(Token { kind, offset }));
        }

        let kind = if ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+') {
            TokenKind::Number(self.take_while(is_number_char))
        } else if ch.is_ascii_alphabetic() || ch == '_' {
            TokenKind::Ident(self.take_while(is_ident_char))
        } else {
            self.pos += ch.len_utf8();

            return Some(Err(ParseError::UnexpectedToken {
                expected: "a name, number or punctuation",
                found: format!("`{ch}`"),
                offset,
            }));
        };

        Some(Ok(Token { kind, offset }))
    }
}
