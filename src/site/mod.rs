//! A project on disk: `source/`, `config/` and the build output.
//!
//! ```text
//! project/
//!   config/bobbin.toml
//!   config/templates/<name>.x
//!   config/partials/<name>.x
//!   config/scripts/<name>.js
//!   source/index.x
//! ```

pub mod build;
pub mod tree;
pub mod urls;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;
use crate::engine::Session;
use crate::errors::BobbinError;
use crate::host::UnavailableScripts;

pub use build::{build, BuildReport, BuildSettings};
pub use tree::SiteTree;

pub const SOURCE_DIR: &str = "source";
pub const TEMPLATE_DIR: &str = "config/templates";
pub const PARTIAL_DIR: &str = "config/partials";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Support {
    Template,
    Partial,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
}

impl Project {
    pub fn open(root: &Path) -> Result<Self, BobbinError> {
        Ok(Self {
            root: root.to_path_buf(),
            config: Config::load(root)?,
        })
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.join(SOURCE_DIR)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join(&self.config.build_path)
    }

    pub fn tree(&self, build_drafts: bool) -> Result<SiteTree, BobbinError> {
        SiteTree::load(&self.source_dir(), &self.config.domain, build_drafts)
    }

    pub fn scripts(&self) -> UnavailableScripts {
        UnavailableScripts::new(&self.root)
    }

    /// A session with the project's options, templates and partials loaded.
    pub fn session(&self, build_drafts: bool) -> Result<Session, BobbinError> {
        let mut session = Session::new(self.config.options(build_drafts)?);
        let templates = load_support(&mut session, &self.root.join(TEMPLATE_DIR), Support::Template)?;
        let partials = load_support(&mut session, &self.root.join(PARTIAL_DIR), Support::Partial)?;
        debug!(templates, partials, "loaded support files");
        Ok(session)
    }
}

/// Loads every non-draft file directly inside `dir`, named by its file stem.
fn load_support(session: &mut Session, dir: &Path, kind: Support) -> Result<usize, BobbinError> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    for item in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let item = item.map_err(|e| BobbinError::io(dir, e))?;
        if !item.file_type().is_file() {
            continue;
        }
        let Some(name) = item.path().file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if name.starts_with('_') {
            continue;
        }
        let text = fs::read_to_string(item.path()).map_err(|e| BobbinError::io(item.path(), e))?;
        match kind {
            Support::Template => session.add_template(name, &text),
            Support::Partial => session.add_partial(name, &text),
        };
        count += 1;
    }
    Ok(count)
}
