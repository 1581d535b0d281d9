//! User-facing output for the CLI: diagnostics, build summaries and token dumps.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::errors::{print_error, Diagnostics};
use crate::site::BuildReport;
use crate::syntax::Token;

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// Prints every diagnostic as a miette report on stderr.
pub fn print_diagnostics(diagnostics: &Diagnostics) {
    for entry in diagnostics.entries() {
        print_error(entry.clone());
    }
}

// ============================================================================
// SUMMARIES
// ============================================================================

pub fn print_build_summary(report: &BuildReport) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let (color, label) = if report.succeeded() {
        (Color::Green, "built")
    } else {
        (Color::Red, "failed")
    };
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = write!(stdout, "{label:>8}");
    let _ = stdout.reset();
    let _ = writeln!(
        stdout,
        " {} pages, {} files copied, {} tag pages into {}",
        report.pages,
        report.copied,
        report.tag_pages,
        report.output.display()
    );

    if !report.images.is_empty() {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
        let _ = write!(stdout, "{:>8}", "images");
        let _ = stdout.reset();
        let _ = writeln!(stdout, " {} conversions pending", report.images.len());
        for job in &report.images {
            let _ = writeln!(
                stdout,
                "         {} -> {}",
                job.source.display(),
                job.output.display()
            );
        }
    }

    let failures = report.diagnostics.failure_count();
    let warnings = report.diagnostics.warning_count();
    if failures + warnings > 0 {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = write!(stdout, "{:>8}", "problems");
        let _ = stdout.reset();
        let _ = writeln!(stdout, " {failures} failures, {warnings} warnings");
    }
}

// ============================================================================
// TOKEN DUMPS
// ============================================================================

pub fn print_tokens(tokens: &[Token<'_>]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for token in tokens {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Blue)));
        let _ = write!(stdout, "{:>4}  {:<12}", token.span.line, format!("{:?}", token.kind));
        let _ = stdout.reset();
        let _ = writeln!(stdout, " {:?}", token.text);
    }
}
