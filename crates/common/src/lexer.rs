// TDB - TinyVM Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! General purpose lexer shared by the assembly grammar, the debug-info
//! grammar and the expression grammar.
//!
//! The lexer consumes the input lazily, skips whitespace and `#` line
//! comments, and stamps every token with the row/column where it began.
//! Token payloads (identifier text, numbers, unescaped strings) are kept
//! in the lexer and read through accessors after a token of the matching
//! kind has been produced.

use crate::error::ParseError;
use std::str::Chars;

/// The kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier, `[A-Za-z_][A-Za-z0-9_]*`; payload via [`Lexer::id`].
    Id,
    /// Integer literal; payload via [`Lexer::number`].
    Num,
    /// Float literal; payload via [`Lexer::float`].
    Float,
    /// String literal with escapes resolved; payload via [`Lexer::string`].
    Str,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Plus,
    Minus,
    Times,
    Slash,
    Percent,
    Comma,
    Semicolon,
    Bang,
    Eq,
    Neq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Arrow,
    Dollar,
    /// End of input.
    End,
}

/// A token with the position it started at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub row: usize,
    pub col: usize,
}

/// Lazily tokenizes a character stream.
pub struct Lexer<'a> {
    input: Chars<'a>,
    lookahead: Option<char>,
    row: usize,
    col: usize,
    tok_row: usize,
    tok_col: usize,
    id: String,
    number: i64,
    float: f64,
    string: String,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.chars();
        let lookahead = chars.next();
        Self {
            input: chars,
            lookahead,
            row: 0,
            col: 0,
            tok_row: 0,
            tok_col: 0,
            id: String::new(),
            number: 0,
            float: 0.0,
            string: String::new(),
        }
    }

    /// The text of the last [`TokenKind::Id`] token.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The value of the last [`TokenKind::Num`] token.
    pub fn number(&self) -> i64 {
        self.number
    }

    /// The value of the last [`TokenKind::Float`] token.
    pub fn float(&self) -> f64 {
        self.float
    }

    /// The unescaped content of the last [`TokenKind::Str`] token.
    pub fn string(&self) -> &str {
        &self.string
    }

    /// Reads the rest of the input, including the pending lookahead
    /// character, as an uninterpreted string.
    pub fn rest(&mut self) -> String {
        let mut out = String::new();
        if let Some(c) = self.lookahead.take() {
            out.push(c);
        }
        out.extend(&mut self.input);
        out
    }

    fn advance(&mut self) -> Option<char> {
        if self.lookahead == Some('\n') {
            self.row += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        self.lookahead = self.input.next();
        self.lookahead
    }

    fn record_token_start(&mut self) {
        self.tok_row = self.row;
        self.tok_col = self.col;
    }

    fn token(&self, kind: TokenKind) -> Token {
        Token { kind, row: self.tok_row, col: self.tok_col }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.row, self.col, message)
    }

    /// Produces the next token, or a [`ParseError`] stamped with the
    /// position of the offending character.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        loop {
            match self.lookahead {
                Some('#') => {
                    while self.lookahead.is_some() && self.lookahead != Some('\n') {
                        self.advance();
                    }
                    if self.lookahead == Some('\n') {
                        self.advance();
                    }
                }
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                _ => break,
            }
        }

        self.record_token_start();
        let c = match self.lookahead {
            None => return Ok(self.token(TokenKind::End)),
            Some(c) => c,
        };
        match c {
            ';' => self.single(TokenKind::Semicolon),
            ',' => self.single(TokenKind::Comma),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '+' => self.single(TokenKind::Plus),
            '*' => self.single(TokenKind::Times),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            '.' => self.single(TokenKind::Dot),
            '$' => self.single(TokenKind::Dollar),
            '-' => {
                self.advance();
                match self.lookahead {
                    Some(d) if d.is_ascii_digit() => self.lex_number(true),
                    Some('>') => {
                        self.advance();
                        Ok(self.token(TokenKind::Arrow))
                    }
                    _ => Ok(self.token(TokenKind::Minus)),
                }
            }
            '!' => {
                self.advance();
                if self.lookahead == Some('=') {
                    self.advance();
                    Ok(self.token(TokenKind::Neq))
                } else {
                    Ok(self.token(TokenKind::Bang))
                }
            }
            '=' => {
                self.advance();
                if self.lookahead == Some('=') {
                    self.advance();
                    Ok(self.token(TokenKind::Eq))
                } else {
                    Err(self.error("expected '==' after '='"))
                }
            }
            '<' => {
                self.advance();
                if self.lookahead == Some('=') {
                    self.advance();
                    Ok(self.token(TokenKind::LessEq))
                } else {
                    Ok(self.token(TokenKind::Less))
                }
            }
            '>' => {
                self.advance();
                if self.lookahead == Some('=') {
                    self.advance();
                    Ok(self.token(TokenKind::GreaterEq))
                } else {
                    Ok(self.token(TokenKind::Greater))
                }
            }
            '"' => self.lex_string(),
            c if c.is_ascii_digit() => self.lex_number(false),
            c if c.is_ascii_alphabetic() || c == '_' => self.lex_identifier(),
            c => Err(self.error(format!("no token beginning with '{c}'"))),
        }
    }

    fn single(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        self.advance();
        Ok(self.token(kind))
    }

    fn lex_number(&mut self, negative: bool) -> Result<Token, ParseError> {
        let mut digits = String::new();
        digits.push(self.lookahead.expect("number lexing starts on a digit"));
        let mut is_float = false;
        loop {
            match self.advance() {
                Some('.') => {
                    is_float = true;
                    digits.push('.');
                }
                Some(d) if d.is_ascii_digit() => digits.push(d),
                _ => break,
            }
        }
        let sign = if negative { -1.0 } else { 1.0 };
        if is_float {
            let value: f64 = digits
                .parse()
                .map_err(|_| self.error(format!("malformed float literal '{digits}'")))?;
            self.float = sign * value;
            Ok(self.token(TokenKind::Float))
        } else {
            let value: i64 = digits
                .parse()
                .map_err(|_| self.error(format!("malformed number literal '{digits}'")))?;
            self.number = if negative { -value } else { value };
            Ok(self.token(TokenKind::Num))
        }
    }

    fn lex_string(&mut self) -> Result<Token, ParseError> {
        self.string.clear();
        loop {
            match self.advance() {
                None => return Err(self.error("unterminated string")),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => self.string.push('\n'),
                    Some('t') => self.string.push('\t'),
                    Some('\\') => self.string.push('\\'),
                    Some('"') => self.string.push('"'),
                    Some(c) => {
                        return Err(self.error(format!("unknown escape sequence: '\\{c}'")))
                    }
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => self.string.push(c),
            }
        }
        self.advance();
        Ok(self.token(TokenKind::Str))
    }

    fn lex_identifier(&mut self) -> Result<Token, ParseError> {
        let mut id = String::new();
        id.push(self.lookahead.expect("identifier lexing starts on a letter"));
        loop {
            match self.advance() {
                Some(c) if c.is_ascii_alphanumeric() || c == '_' => id.push(c),
                _ => break,
            }
        }
        self.id = id;
        Ok(self.token(TokenKind::Id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut lex = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let tok = lex.next_token().unwrap();
            out.push(tok.kind);
            if tok.kind == TokenKind::End {
                break;
            }
        }
        out
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds(". , ; [ ] + * ( ) / %"),
            vec![
                TokenKind::Dot,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Plus,
                TokenKind::Times,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_identifiers_and_numbers() {
        let mut lex = Lexer::new("MOV R0, 42");
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Id);
        assert_eq!(lex.id(), "MOV");
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Id);
        assert_eq!(lex.id(), "R0");
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Comma);
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Num);
        assert_eq!(lex.number(), 42);
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::End);
    }

    #[test]
    fn test_negative_numbers_and_minus() {
        let mut lex = Lexer::new("-8 a - b");
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Num);
        assert_eq!(lex.number(), -8);
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Id);
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Minus);
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Id);
    }

    #[test]
    fn test_float_promotion() {
        let mut lex = Lexer::new("3.25 -1.5 7");
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Float);
        assert_eq!(lex.float(), 3.25);
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Float);
        assert_eq!(lex.float(), -1.5);
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Num);
        assert_eq!(lex.number(), 7);
    }

    #[test]
    fn test_string_escapes() {
        let mut lex = Lexer::new(r#""hello\n\t\\\"""#);
        assert_eq!(lex.next_token().unwrap().kind, TokenKind::Str);
        assert_eq!(lex.string(), "hello\n\t\\\"");
    }

    #[test]
    fn test_unterminated_string() {
        let mut lex = Lexer::new("\"oops");
        let err = lex.next_token().unwrap_err();
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn test_unknown_escape() {
        let mut lex = Lexer::new(r#""\q""#);
        assert!(lex.next_token().is_err());
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("# a comment\nMOV # trailing\n7"),
            vec![TokenKind::Id, TokenKind::Num, TokenKind::End]
        );
    }

    #[test]
    fn test_token_positions() {
        let mut lex = Lexer::new("ab\n  cd");
        let tok = lex.next_token().unwrap();
        assert_eq!((tok.row, tok.col), (0, 0));
        let tok = lex.next_token().unwrap();
        assert_eq!((tok.row, tok.col), (1, 2));
    }

    #[test]
    fn test_expression_operators() {
        assert_eq!(
            kinds("a == b != c <= d >= e < f > g -> h ! $0"),
            vec![
                TokenKind::Id,
                TokenKind::Eq,
                TokenKind::Id,
                TokenKind::Neq,
                TokenKind::Id,
                TokenKind::LessEq,
                TokenKind::Id,
                TokenKind::GreaterEq,
                TokenKind::Id,
                TokenKind::Less,
                TokenKind::Id,
                TokenKind::Greater,
                TokenKind::Id,
                TokenKind::Arrow,
                TokenKind::Id,
                TokenKind::Bang,
                TokenKind::Dollar,
                TokenKind::Num,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_unknown_character_error_has_position() {
        let mut lex = Lexer::new("ok\n  ?");
        lex.next_token().unwrap();
        let err = lex.next_token().unwrap_err();
        assert_eq!((err.row, err.col), (1, 2));
        assert!(err.message.contains("no token beginning with"));
    }

    #[test]
    fn test_rest_returns_remaining_input() {
        let mut lex = Lexer::new("id rest of it");
        lex.next_token().unwrap();
        assert_eq!(lex.rest().trim_start(), "rest of it");
    }
}
