//! Command-line arguments and subcommands, declared with `clap`'s derive API.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "bobbin",
    version,
    about = "A line-oriented markup and templating engine for static sites."
)]
pub struct BobbinArgs {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides it.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the site into the configured build path.
    Build {
        /// The project directory, holding `source/` and `config/`.
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Build every file, not only those reachable from the root index.
        #[arg(long)]
        all: bool,
        /// Include drafts (paths with a `_` component).
        #[arg(long)]
        drafts: bool,
    },
    /// Render one page to stdout, using the project's templates and partials.
    Render {
        #[arg(required = true)]
        file: PathBuf,
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// On failure print an HTML page listing the problems instead of the page.
        #[arg(long)]
        error_page: bool,
    },
    /// Print the parsed tree of a file as JSON.
    Ast {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Print the token stream of a file.
    Tokens {
        #[arg(required = true)]
        file: PathBuf,
    },
}
