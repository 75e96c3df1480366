//! Minimal C++ tokenizer.
//!
//! Recognizes identifiers, numbers, string and character literals, and
//! punctuation. Comments and preprocessor lines are dropped, so marker names
//! that appear inside `#define` or comments are never reported.

use crate::error::SourceLocation;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Char,
    /// Single punctuation character, or `::`
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte range in the source text
    pub span: Range<usize>,
    pub location: SourceLocation,
}

impl Token {
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span.clone()]
    }

    pub fn is_punct(&self, source: &str, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text(source) == p
    }
}

/// Token iterator over a source string
pub struct Lexer<'s> {
    source: &'s str,
    bytes: &'s [u8],
    pos: usize,
    line: u32,
    column: u32,
    /// Only whitespace seen since the last newline
    line_start: bool,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            line_start: true,
        }
    }

    fn peek_byte(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) {
        let Some(c) = self.source[self.pos..].chars().next() else {
            return;
        };
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.line_start = true;
        } else {
            self.column += 1;
            if !c.is_whitespace() {
                self.line_start = false;
            }
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_byte(0) {
                Some(b) if b.is_ascii_whitespace() => self.advance(),
                Some(b'/') if self.peek_byte(1) == Some(b'/') => {
                    while !matches!(self.peek_byte(0), None | Some(b'\n')) {
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_byte(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    while let Some(b) = self.peek_byte(0) {
                        if b == b'*' && self.peek_byte(1) == Some(b'/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'#') if self.line_start => {
                    // Preprocessor directive, honoring line continuations
                    while let Some(b) = self.peek_byte(0) {
                        if b == b'\n' {
                            break;
                        }
                        if b == b'\\' && self.peek_byte(1) == Some(b'\n') {
                            self.advance();
                        } else if b == b'\\'
                            && self.peek_byte(1) == Some(b'\r')
                            && self.peek_byte(2) == Some(b'\n')
                        {
                            self.advance();
                            self.advance();
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn lex_quoted(&mut self, quote: u8) {
        self.advance();
        while let Some(b) = self.peek_byte(0) {
            if b == b'\\' {
                self.advance();
                self.advance();
                continue;
            }
            if b == b'\n' {
                return;
            }
            self.advance();
            if b == quote {
                return;
            }
        }
    }

    /// `R"delim( ... )delim"`, positioned on the opening quote
    fn lex_raw_string(&mut self) {
        self.advance();
        let delim_start = self.pos;
        while !matches!(self.peek_byte(0), None | Some(b'(')) {
            self.advance();
        }
        let terminator = format!("){}\"", &self.source[delim_start..self.pos]);
        match self.source[self.pos..].find(&terminator) {
            Some(idx) => {
                let end = self.pos + idx + terminator.len();
                while self.pos < end {
                    self.advance();
                }
            }
            None => {
                while self.peek_byte(0).is_some() {
                    self.advance();
                }
            }
        }
    }
}

impl<'s> Iterator for Lexer<'s> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.skip_trivia();
        let start = self.pos;
        let location = SourceLocation::new(self.line, self.column);
        let c = self.source[self.pos..].chars().next()?;

        let kind = if c.is_alphabetic() || c == '_' {
            while matches!(self.source[self.pos..].chars().next(), Some(c) if c.is_alphanumeric() || c == '_')
            {
                self.advance();
            }
            let word = &self.source[start..self.pos];
            let raw_prefix = matches!(word, "R" | "LR" | "uR" | "UR" | "u8R");
            if raw_prefix && self.peek_byte(0) == Some(b'"') {
                self.lex_raw_string();
                TokenKind::Str
            } else if matches!(word, "L" | "u" | "U" | "u8") && self.peek_byte(0) == Some(b'"') {
                self.lex_quoted(b'"');
                TokenKind::Str
            } else {
                TokenKind::Ident
            }
        } else if c.is_ascii_digit() || (c == '.' && matches!(self.peek_byte(1), Some(b) if b.is_ascii_digit())) {
            while let Some(b) = self.peek_byte(0) {
                let exponent = matches!(b, b'+' | b'-')
                    && matches!(self.bytes.get(self.pos.wrapping_sub(1)), Some(b'e' | b'E' | b'p' | b'P'));
                if b.is_ascii_alphanumeric() || b == b'.' || b == b'\'' || exponent {
                    self.advance();
                } else {
                    break;
                }
            }
            TokenKind::Number
        } else if c == '"' {
            self.lex_quoted(b'"');
            TokenKind::Str
        } else if c == '\'' {
            self.lex_quoted(b'\'');
            TokenKind::Char
        } else if c == ':' && self.peek_byte(1) == Some(b':') {
            self.advance();
            self.advance();
            TokenKind::Punct
        } else {
            self.advance();
            TokenKind::Punct
        };

        Some(Token {
            kind,
            span: start..self.pos,
            location,
        })
    }
}
