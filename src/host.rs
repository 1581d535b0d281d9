//! Collaborator seams between the renderer and the outside world.
//!
//! The renderer never touches the filesystem directly. Resource lookups, URL construction
//! and script execution all go through the traits here; [`crate::site`] implements them for
//! a project on disk and the integration tests implement them in memory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::{FinderKind, PathType};

// ============================================================================
// RESOURCES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A page in the markup language (`.x`).
    Markup,
    Markdown,
    Html,
    Css,
    Js,
    Image,
    Static,
    Directory,
}

impl ResourceKind {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("x") => ResourceKind::Markup,
            Some("md") => ResourceKind::Markdown,
            Some("html" | "htm") => ResourceKind::Html,
            Some("css") => ResourceKind::Css,
            Some("js") => ResourceKind::Js,
            Some("png" | "jpg" | "jpeg" | "webp" | "tif" | "tiff" | "gif" | "svg") => {
                ResourceKind::Image
            }
            _ => ResourceKind::Static,
        }
    }

    /// Kinds that are rendered rather than copied.
    pub fn is_page(self) -> bool {
        matches!(self, ResourceKind::Markup | ResourceKind::Markdown)
    }

    /// Whether a finder of `kind` may resolve to a resource of this kind.
    pub fn satisfies(self, kind: FinderKind) -> bool {
        match kind {
            FinderKind::Any => self != ResourceKind::Directory,
            FinderKind::Page => self.is_page() || self == ResourceKind::Html,
            FinderKind::Image => self == ResourceKind::Image,
            FinderKind::Static => !self.is_page() && self != ResourceKind::Directory,
        }
    }
}

/// A file found by a [`FileResolver`]. Paths are relative to the source root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    pub path: PathBuf,
    pub kind: ResourceKind,
    /// Any path component starts with `_`.
    pub draft: bool,
}

impl Resource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let draft = path
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('_'));
        Self {
            kind: ResourceKind::from_path(&path),
            path,
            draft,
        }
    }
}

/// Resolves finder targets against a file tree and writes URLs for them.
pub trait FileResolver {
    /// Fuzzy lookup of `query`, restricted to resources that satisfy `kind`.
    fn find(&self, query: &str, kind: FinderKind) -> Option<Resource>;

    /// The URL of `resource` as written into a page located at `from`.
    fn url_of(&self, resource: &Resource, path_type: PathType, from: &Path) -> String;

    /// Records that a rendered page links to `resource`.
    fn mark_used(&self, resource: &Resource);

    fn read_source(&self, resource: &Resource) -> Option<String>;
}

/// Appends `<tag_path>/<tag>` to a page URL, dropping a trailing `index`.
pub fn tag_url(url: &str, tag_path: &str, tag: &str) -> String {
    let base = url.strip_suffix("index").unwrap_or(url).trim_end_matches('/');
    format!("{base}/{tag_path}/{tag}")
}

// ============================================================================
// SCRIPTS
// ============================================================================

/// A token line as seen by a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptToken {
    pub token: String,
    pub text: String,
    pub line: u32,
}

/// Callbacks into the calling page and scope, available to a running script.
pub trait ScriptAccessors {
    /// The rendered value of a declaration, empty when undeclared.
    fn get(&mut self, name: &str) -> String;
    /// Token lines keyed by any of `tokens`, searching `depth` levels of nesting.
    fn get_token(&mut self, depth: usize, tokens: &[&str]) -> Vec<ScriptToken>;
    /// A declaration's rendered value split into fields.
    fn get_array(&mut self, name: &str) -> Vec<String>;
    /// Whether the page contains any token line or named block keyed by `names`.
    fn has_elements(&mut self, names: &[&str]) -> bool;
    /// The URL of a resource, empty when not found.
    fn find_file(&mut self, query: &str) -> String;
}

/// The embedded scripting engine.
pub trait ScriptSandbox {
    /// The source of the script called `name`.
    fn load(&self, name: &str) -> Option<String>;

    fn call(
        &self,
        name: &str,
        source: &str,
        args: &[String],
        accessors: &mut dyn ScriptAccessors,
    ) -> Result<String, String>;
}

/// Rejects every script call. For sites without scripts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScripts;

impl ScriptSandbox for NoScripts {
    fn load(&self, _name: &str) -> Option<String> {
        None
    }

    fn call(
        &self,
        name: &str,
        _source: &str,
        _args: &[String],
        _accessors: &mut dyn ScriptAccessors,
    ) -> Result<String, String> {
        Err(format!("no script named {name:?}"))
    }
}

/// Loads scripts from `config/scripts/<name>.js` but has no engine to run them.
#[derive(Debug, Clone)]
pub struct UnavailableScripts {
    directory: PathBuf,
}

impl UnavailableScripts {
    pub fn new(project_root: &Path) -> Self {
        Self {
            directory: project_root.join("config").join("scripts"),
        }
    }
}

impl ScriptSandbox for UnavailableScripts {
    fn load(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.directory.join(format!("{name}.js"))).ok()
    }

    fn call(
        &self,
        _name: &str,
        _source: &str,
        _args: &[String],
        _accessors: &mut dyn ScriptAccessors,
    ) -> Result<String, String> {
        Err("this build has no script engine".into())
    }
}

#[cfg(test)]
mod host_tests {
    use super::*;

    #[test]
    fn drafts_are_marked_by_any_component() {
        assert!(Resource::new("blog/_wip/post.x").draft);
        assert!(!Resource::new("blog/post.x").draft);
    }

    #[test]
    fn tag_urls_collapse_index() {
        assert_eq!(tag_url("/blog/index", "tag", "rust"), "/blog/tag/rust");
        assert_eq!(tag_url("/blog/", "tag", "rust"), "/blog/tag/rust");
        assert_eq!(tag_url("/notes/post", "tag", "go"), "/notes/post/tag/go");
    }
}
