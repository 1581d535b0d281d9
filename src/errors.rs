//! Bobbin error handling.
//!
//! Every problem, from an ambiguous token to an unreadable output directory, is a
//! [`BobbinError`]. Parse and render problems are collected in [`Diagnostics`] and never
//! abort the caller; build problems are returned as `Result` errors.

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::syntax::{FileId, Span};

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// A registered source file, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

/// Every file lexed during a session, addressable by [`FileId`].
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<(SourceContext, Arc<NamedSource<String>>)>,
}

impl SourceMap {
    pub fn add(&mut self, name: impl Into<String>, content: impl Into<String>) -> FileId {
        let context = SourceContext::from_file(name, content);
        let named = context.to_named_source();
        self.files.push((context, named));
        FileId(self.files.len() as u32 - 1)
    }

    pub fn get(&self, file: FileId) -> Option<&SourceContext> {
        self.files.get(file.0 as usize).map(|(context, _)| context)
    }

    pub fn name(&self, file: FileId) -> &str {
        self.get(file).map_or("<unknown>", |context| context.name.as_str())
    }

    fn named_source(&self, file: FileId) -> Option<Arc<NamedSource<String>>> {
        self.files.get(file.0 as usize).map(|(_, named)| named.clone())
    }
}

// ============================================================================
// ERROR KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Parse errors
    #[error("ambiguous token {token:?} should be escaped")]
    AmbiguousToken { token: String },
    #[error("malformed import (or unescaped ~ at start of line)")]
    MalformedImport,
    #[error("malformed script call (or unescaped $ at start of line)")]
    MalformedScriptCall,
    #[error("'else' must follow an if-statement")]
    ElseWithoutIf,
    #[error("{found:?} cannot be used as a {expected} name")]
    BadDeclaration { found: String, expected: String },
    #[error("unknown variable modifier {name:?}")]
    UnknownModifier { name: String },
    #[error("unknown path type {name:?}")]
    UnknownPathType { name: String },
    #[error("image format {format:?} is unsupported")]
    UnsupportedImageFormat { format: String },
    #[error("{text:?} is too large to be used as a number")]
    InvalidNumber { text: String },
    #[error("resource finder has no target")]
    EmptyFinder,
    #[error("resource finder is missing its closing brace")]
    UnterminatedFinder,
    #[error("closing brace has no matching opening brace")]
    UnbalancedBrace,

    // Render errors
    #[error("failed to load template {name:?}")]
    MissingTemplate { name: String },
    #[error("didn't find {name:?} as a partial or a file")]
    MissingPartial { name: String },
    #[error("no such template for import {name:?}")]
    MissingImportTemplate { name: String },
    #[error("didn't find page {target:?} to import")]
    ImportNotFound { target: String },
    #[error("couldn't load page {path:?}")]
    PageUnavailable { path: String },
    #[error("template has no content available to substitute")]
    NoAnonymousContent,
    #[error("content only supplies {supplied} arguments, but {needed} are needed")]
    NotEnoughArguments { supplied: usize, needed: usize },
    #[error("token {token:?} does not have a template; output may be unexpected unless it is escaped")]
    MissingTokenTemplate { token: String },
    #[error("failed to load script {name:?}")]
    MissingScript { name: String },
    #[error("script {name:?} failed: {message}")]
    ScriptFailed { name: String, message: String },
    #[error("resource finder did not find file {target:?}")]
    ResourceNotFound { target: String },
    #[error("{path:?} is a draft")]
    DraftLinked { path: String },
    #[error("templates nest deeper than {limit} levels")]
    RecursionLimit { limit: usize },

    // Build errors
    #[error("{path}: {message}")]
    Io { path: String, message: String },
    #[error("invalid configuration: {message}")]
    Config { message: String },
    #[error("the site has no root index page")]
    MissingIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Render,
    Build,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorCategory::Parse => "parse",
            ErrorCategory::Render => "render",
            ErrorCategory::Build => "build",
        })
    }
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AmbiguousToken { .. }
            | Self::MalformedImport
            | Self::MalformedScriptCall
            | Self::ElseWithoutIf
            | Self::BadDeclaration { .. }
            | Self::UnknownModifier { .. }
            | Self::UnknownPathType { .. }
            | Self::UnsupportedImageFormat { .. }
            | Self::InvalidNumber { .. }
            | Self::EmptyFinder
            | Self::UnterminatedFinder
            | Self::UnbalancedBrace => ErrorCategory::Parse,

            Self::MissingTemplate { .. }
            | Self::MissingPartial { .. }
            | Self::MissingImportTemplate { .. }
            | Self::ImportNotFound { .. }
            | Self::PageUnavailable { .. }
            | Self::NoAnonymousContent
            | Self::NotEnoughArguments { .. }
            | Self::MissingTokenTemplate { .. }
            | Self::MissingScript { .. }
            | Self::ScriptFailed { .. }
            | Self::ResourceNotFound { .. }
            | Self::DraftLinked { .. }
            | Self::RecursionLimit { .. } => ErrorCategory::Render,

            Self::Io { .. } | Self::Config { .. } | Self::MissingIndex => ErrorCategory::Build,
        }
    }

    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::AmbiguousToken { .. } => "ambiguous_token",
            Self::MalformedImport => "malformed_import",
            Self::MalformedScriptCall => "malformed_script_call",
            Self::ElseWithoutIf => "else_without_if",
            Self::BadDeclaration { .. } => "bad_declaration",
            Self::UnknownModifier { .. } => "unknown_modifier",
            Self::UnknownPathType { .. } => "unknown_path_type",
            Self::UnsupportedImageFormat { .. } => "unsupported_image_format",
            Self::InvalidNumber { .. } => "invalid_number",
            Self::EmptyFinder => "empty_finder",
            Self::UnterminatedFinder => "unterminated_finder",
            Self::UnbalancedBrace => "unbalanced_brace",
            Self::MissingTemplate { .. } => "missing_template",
            Self::MissingPartial { .. } => "missing_partial",
            Self::MissingImportTemplate { .. } => "missing_import_template",
            Self::ImportNotFound { .. } => "import_not_found",
            Self::PageUnavailable { .. } => "page_unavailable",
            Self::NoAnonymousContent => "no_anonymous_content",
            Self::NotEnoughArguments { .. } => "not_enough_arguments",
            Self::MissingTokenTemplate { .. } => "missing_token_template",
            Self::MissingScript { .. } => "missing_script",
            Self::ScriptFailed { .. } => "script_failed",
            Self::ResourceNotFound { .. } => "resource_not_found",
            Self::DraftLinked { .. } => "draft_linked",
            Self::RecursionLimit { .. } => "recursion_limit",
            Self::Io { .. } => "io",
            Self::Config { .. } => "config",
            Self::MissingIndex => "missing_index",
        }
    }

    fn primary_label(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Parse => "while parsing this",
            ErrorCategory::Render => "while rendering this",
            ErrorCategory::Build => "here",
        }
    }

    fn help(&self) -> Option<String> {
        match self {
            Self::AmbiguousToken { token } => Some(format!("write \\{token} for a literal")),
            Self::MissingTokenTemplate { token } => {
                Some(format!("declare one with [{token}] = ... or escape the line"))
            }
            Self::UnsupportedImageFormat { .. } => Some("use png, jpg, jpeg or webp".into()),
            Self::DraftLinked { .. } => Some("build with --drafts to include drafts".into()),
            Self::RecursionLimit { .. } => {
                Some("a template, partial or import probably includes itself".into())
            }
            _ => None,
        }
    }
}

// ============================================================================
// THE ERROR TYPE
// ============================================================================

/// Where a diagnostic points.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub file_name: String,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct BobbinError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub source_info: Option<SourceInfo>,
    pub help: Option<String>,
    pub error_code: String,
}

impl BobbinError {
    /// An error that is not tied to any source position.
    pub fn unspanned(kind: ErrorKind) -> Self {
        let error_code = format!("bobbin::{}::{}", kind.category(), kind.code_suffix());
        let help = kind.help();
        Self {
            kind,
            severity: Severity::Failure,
            source_info: None,
            help,
            error_code,
        }
    }

    pub fn io(path: &Path, error: impl fmt::Display) -> Self {
        Self::unspanned(ErrorKind::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        })
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::unspanned(ErrorKind::Config {
            message: message.into(),
        })
    }

    pub fn line(&self) -> Option<u32> {
        self.source_info.as_ref().map(|info| info.line)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.source_info.as_ref().map(|info| info.file_name.as_str())
    }
}

impl std::error::Error for BobbinError {}

impl fmt::Display for BobbinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Diagnostic for BobbinError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.error_code))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Warning => miette::Severity::Warning,
            Severity::Failure => miette::Severity::Error,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let info = self.source_info.as_ref()?;
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.kind.primary_label().to_string()),
            info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_info
            .as_ref()
            .map(|info| &*info.source as &dyn miette::SourceCode)
    }
}

// ============================================================================
// ERROR SINK
// ============================================================================

/// Context-aware error creation.
pub trait ErrorReporting {
    fn report(&self, kind: ErrorKind, severity: Severity, span: Span) -> BobbinError;
}

/// Collects diagnostics for a whole session, in order, without duplicates.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub sources: SourceMap,
    entries: Vec<BobbinError>,
}

impl ErrorReporting for Diagnostics {
    fn report(&self, kind: ErrorKind, severity: Severity, span: Span) -> BobbinError {
        let mut error = BobbinError::unspanned(kind);
        error.severity = severity;
        error.source_info = self.sources.named_source(span.file).map(|source| SourceInfo {
            source,
            primary_span: span.into(),
            file_name: self.sources.name(span.file).to_string(),
            line: span.line,
        });
        error
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, kind: ErrorKind, span: Span) {
        let error = self.report(kind, Severity::Warning, span);
        self.push(error);
    }

    pub fn fail(&mut self, kind: ErrorKind, span: Span) {
        let error = self.report(kind, Severity::Failure, span);
        self.push(error);
    }

    pub fn push(&mut self, error: BobbinError) {
        let duplicate = self.entries.iter().any(|seen| {
            seen.kind == error.kind
                && seen.severity == error.severity
                && seen.line() == error.line()
                && seen.file_name() == error.file_name()
        });
        if !duplicate {
            self.entries.push(error);
        }
    }

    pub fn entries(&self) -> &[BobbinError] {
        &self.entries
    }

    pub fn has_failures(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Failure)
    }

    pub fn failure_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Failure)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries.len() - self.failure_count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A standalone HTML page listing every entry, for display in place of a broken page.
    pub fn render_html(&self) -> String {
        let mut items = String::new();
        for entry in &self.entries {
            let class = match entry.severity {
                Severity::Warning => "warning",
                Severity::Failure => "failure",
            };
            let location = entry
                .source_info
                .as_ref()
                .map(|info| format!("{}, line {}", info.file_name, info.line))
                .unwrap_or_default();
            items.push_str(&format!(
                "<li class=\"{class}\"><b>{}</b> <i>{}</i><p>{}</p></li>",
                entry.kind.category(),
                escape_html(&location),
                escape_html(&entry.kind.to_string()),
            ));
        }
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Build errors</title></head>\
             <body><h1>Build errors</h1><ul>{items}</ul></body></html>"
        )
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Prints an error with full miette diagnostics.
pub fn print_error(error: BobbinError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
