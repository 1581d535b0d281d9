//! Single-pass lexer.
//!
//! Every byte of the input ends up in exactly one token, so concatenating the token texts
//! reproduces the file. The stream always ends with an [`TokenKind::Eof`] token.

use super::{FileId, Span, Token, TokenKind};

/// Tokenizes `text`, tagging every span with `file`.
pub fn lex(file: FileId, text: &str) -> Vec<Token<'_>> {
    Lexer {
        file,
        text,
        pos: 0,
        line: 1,
        tokens: Vec::with_capacity(text.len() / 3 + 1),
    }
    .run()
}

fn single_rune(c: char) -> Option<TokenKind> {
    let kind = match c {
        '\n' => TokenKind::Newline,
        '\\' => TokenKind::Escape,
        '/' => TokenKind::ForwardSlash,
        '|' => TokenKind::Pipe,
        '%' => TokenKind::Percent,
        '{' => TokenKind::BraceOpen,
        '}' => TokenKind::BraceClose,
        '[' => TokenKind::BracketOpen,
        ']' => TokenKind::BracketClose,
        '<' => TokenKind::AngleOpen,
        '>' => TokenKind::AngleClose,
        '~' => TokenKind::Tilde,
        '&' => TokenKind::Ampersand,
        '=' => TokenKind::Equals,
        '!' => TokenKind::Bang,
        '.' => TokenKind::Stop,
        ':' => TokenKind::Colon,
        '+' => TokenKind::Plus,
        '×' => TokenKind::Multiply,
        '$' => TokenKind::Dollar,
        _ => return None,
    };
    Some(kind)
}

/// Whitespace other than the newline, which is significant.
pub(crate) fn is_space(c: char) -> bool {
    c != '\n' && c.is_whitespace()
}

fn is_name_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

struct Lexer<'src> {
    file: FileId,
    text: &'src str,
    pos: usize,
    line: u32,
    tokens: Vec<Token<'src>>,
}

impl<'src> Lexer<'src> {
    fn run(mut self) -> Vec<Token<'src>> {
        while let Some(c) = self.rest().chars().next() {
            let start = self.pos;

            if let Some(kind) = single_rune(c) {
                self.pos += c.len_utf8();
                self.push(kind, start);
                if kind == TokenKind::Newline {
                    self.line += 1;
                }
                continue;
            }

            if is_space(c) {
                self.eat_while(is_space);
                self.push(TokenKind::Whitespace, start);
                continue;
            }

            if c.is_ascii_digit() {
                self.eat_while(|c| c.is_ascii_digit());
                self.push(TokenKind::Number, start);
                continue;
            }

            if c == '_' || c.is_alphabetic() {
                self.eat_while(is_name_char);
                let kind = if self.text[start..self.pos].contains('_') {
                    TokenKind::Ident
                } else {
                    TokenKind::Word
                };
                self.push(kind, start);
                continue;
            }

            self.eat_while(|next| next == c);
            let kind = if c == '*' {
                TokenKind::Asterisk
            } else if !c.is_ascii() && !c.is_alphanumeric() {
                // typographic symbols (arrows, ©, digits in other scripts) read as text
                TokenKind::Word
            } else {
                TokenKind::NonWord
            };
            self.push(kind, start);
        }

        let end = self.text.len();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            text: "",
            span: Span::new(self.file, self.line, end, end),
        });
        self.tokens
    }

    fn rest(&self) -> &'src str {
        &self.text[self.pos..]
    }

    fn eat_while(&mut self, keep: impl Fn(char) -> bool) {
        let len = self
            .rest()
            .char_indices()
            .find(|&(_, c)| !keep(c))
            .map_or(self.rest().len(), |(i, _)| i);
        self.pos += len;
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            text: &self.text[start..self.pos],
            span: Span::new(self.file, self.line, start, self.pos),
        });
    }
}
