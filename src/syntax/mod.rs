//! Source positions, tokens and the front end of the markup language.
//!
//! The lexer turns a file into a flat token buffer, the cursor walks that buffer with
//! checkpoint/restore, and the parser builds the [`crate::ast`] tree from it.

use serde::Serialize;

pub mod cursor;
pub mod lexer;
pub mod parser;

pub use cursor::Cursor;
pub use lexer::lex;
pub use parser::{parse, Grammar, ParseContext};

// ============================================================================
// SOURCE POSITIONS
// ============================================================================

/// Index of a file registered in the session's [`crate::errors::SourceMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct FileId(pub u32);

/// A byte range in one source file, plus the line it starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub file: FileId,
    pub line: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file: FileId, line: u32, start: usize, end: usize) -> Self {
        Self {
            file,
            line,
            start: start as u32,
            end: end as u32,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            file: self.file,
            line: self.line.min(other.line),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        miette::SourceSpan::from(span.start as usize..span.end as usize)
    }
}

// ============================================================================
// TOKENS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Whitespace,
    Newline,
    Escape,
    ForwardSlash,
    Pipe,
    Percent,
    BraceOpen,
    BraceClose,
    BracketOpen,
    BracketClose,
    AngleOpen,
    AngleClose,
    Tilde,
    Ampersand,
    Equals,
    Bang,
    Stop,
    Colon,
    Plus,
    Multiply,
    Dollar,
    Number,
    Word,
    Ident,
    NonWord,
    Asterisk,
    Eof,
}

impl TokenKind {
    /// Kinds whose runs may open a token line (`# Heading`, `- item`, `| cell`).
    pub fn is_token_capable(self) -> bool {
        matches!(
            self,
            TokenKind::Equals
                | TokenKind::Bang
                | TokenKind::Stop
                | TokenKind::Plus
                | TokenKind::Percent
                | TokenKind::Pipe
                | TokenKind::NonWord
                | TokenKind::Asterisk
        )
    }

    pub fn is_name(self) -> bool {
        matches!(self, TokenKind::Word | TokenKind::Ident)
    }

    pub fn ends_line(self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Eof)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub span: Span,
}

impl<'src> Token<'src> {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}
