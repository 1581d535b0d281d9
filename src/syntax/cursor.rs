//! Checkpoint/restore cursor over an owned token buffer.

use super::{Token, TokenKind};

/// A saved cursor position. Restoring it undoes any number of reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(usize);

#[derive(Debug)]
pub struct Cursor<'src> {
    tokens: Vec<Token<'src>>,
    index: usize,
}

impl<'src> Cursor<'src> {
    /// Wraps a token buffer. A missing trailing `Eof` is supplied so reads never run dry.
    pub fn new(mut tokens: Vec<Token<'src>>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: "",
                span,
            });
        }
        Self { tokens, index: 0 }
    }

    /// Consumes and returns the current token. Stays on `Eof` once reached.
    pub fn next(&mut self) -> Token<'src> {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.index += 1;
        }
        token
    }

    pub fn peek(&self) -> Token<'src> {
        self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    pub fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    /// The first token at or after the cursor that is not whitespace.
    pub fn peek_past_whitespace(&self) -> Token<'src> {
        self.tokens[self.index..]
            .iter()
            .copied()
            .find(|t| t.kind != TokenKind::Whitespace)
            .unwrap_or_else(|| self.tokens[self.tokens.len() - 1])
    }

    /// Consumes a whitespace run. Returns whether anything was skipped.
    pub fn skip_whitespace(&mut self) -> bool {
        let start = self.index;
        while self.peek_kind() == TokenKind::Whitespace {
            self.index += 1;
        }
        self.index != start
    }

    /// Consumes the current token if it has the given kind.
    pub fn eat(&mut self, kind: TokenKind) -> Option<Token<'src>> {
        if self.peek_kind() == kind {
            Some(self.next())
        } else {
            None
        }
    }

    pub fn mark(&self) -> Mark {
        Mark(self.index)
    }

    pub fn reset(&mut self, mark: Mark) {
        self.index = mark.0;
    }

    pub fn step_back(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    /// The most recently consumed token.
    pub fn previous(&self) -> Option<Token<'src>> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .copied()
    }

    /// The token read before the most recently consumed one.
    pub fn before_previous(&self) -> Option<Token<'src>> {
        self.index
            .checked_sub(2)
            .and_then(|i| self.tokens.get(i))
            .copied()
    }

    pub fn at_end(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }
}
