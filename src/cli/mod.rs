//! The Bobbin command-line interface.
//!
//! Each subcommand returns `Result<bool, BobbinError>`: `Err` for problems that stop the
//! command outright, `Ok(false)` when it ran but reported failures.

use std::fs;
use std::path::Path;
use std::process;

use clap::Parser;
use tracing::debug;

use crate::cli::args::{BobbinArgs, Command};
use crate::engine::{Options, Session};
use crate::errors::{print_error, BobbinError};
use crate::host::Resource;
use crate::site::{build, BuildSettings, Project, SiteTree};
use crate::syntax::{lex, FileId, Grammar};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = BobbinArgs::parse();
    crate::logging::init(args.verbose);

    let result = match args.command {
        Command::Build { root, all, drafts } => handle_build(&root, BuildSettings { all, drafts }),
        Command::Render {
            file,
            root,
            error_page,
        } => handle_render(&file, &root, error_page),
        Command::Ast { file } => handle_ast(&file),
        Command::Tokens { file } => handle_tokens(&file),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(error) => {
            print_error(error);
            process::exit(1);
        }
    }
}

fn read(path: &Path) -> Result<String, BobbinError> {
    fs::read_to_string(path).map_err(|e| BobbinError::io(path, e))
}

fn handle_build(root: &Path, settings: BuildSettings) -> Result<bool, BobbinError> {
    let project = Project::open(root)?;
    let report = build(&project, settings)?;
    output::print_diagnostics(&report.diagnostics);
    output::print_build_summary(&report);
    Ok(report.succeeded())
}

/// Renders `file` to stdout. Inside the project's `source/` it resolves like any other
/// page; elsewhere it renders standalone against the project's support files.
fn handle_render(file: &Path, root: &Path, error_page: bool) -> Result<bool, BobbinError> {
    let project = Project::open(root)?;
    let mut session = project.session(false)?;
    let scripts = project.scripts();
    let source_dir = project.source_dir();
    let tree = if source_dir.is_dir() {
        project.tree(false)?
    } else {
        SiteTree::empty(&source_dir, &project.config.domain)
    };

    let inside = file
        .canonicalize()
        .ok()
        .zip(source_dir.canonicalize().ok())
        .and_then(|(file, source)| file.strip_prefix(&source).ok().map(Path::to_path_buf));

    let page = match inside {
        Some(relative) => {
            debug!(path = %relative.display(), "rendering from source tree");
            let resource = tree.get(&relative).unwrap_or_else(|| Resource::new(relative));
            session
                .page(&resource, &tree)
                .ok_or_else(|| BobbinError::io(file, "could not be read"))?
        }
        None => {
            let text = read(file)?;
            let name = file.file_name().map(Path::new).unwrap_or(file);
            session.page_from_source(name, &text)
        }
    };

    let html = session.render_page(&page, &tree, &scripts);
    output::print_diagnostics(&session.diagnostics);
    if error_page && session.diagnostics.has_failures() {
        println!("{}", session.diagnostics.render_html());
    } else {
        println!("{html}");
    }
    Ok(!session.diagnostics.has_failures())
}

fn handle_ast(file: &Path) -> Result<bool, BobbinError> {
    let text = read(file)?;
    let mut session = Session::new(Options::default());
    let markup = session.parse(file, &text, Grammar::Page);
    let json = serde_json::to_string_pretty(&*markup.nodes)
        .map_err(|e| BobbinError::io(file, e))?;
    output::print_diagnostics(&session.diagnostics);
    println!("{json}");
    Ok(!session.diagnostics.has_failures())
}

fn handle_tokens(file: &Path) -> Result<bool, BobbinError> {
    let text = read(file)?;
    output::print_tokens(&lex(FileId(0), &text));
    Ok(true)
}
