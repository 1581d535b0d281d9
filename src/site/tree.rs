//! The source tree on disk and the [`FileResolver`] built over it.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::ast::{FinderKind, PathType};
use crate::errors::BobbinError;
use crate::host::{FileResolver, Resource, ResourceKind};
use crate::site::urls::resource_url;

/// One file or directory under `source/`.
#[derive(Debug, Clone)]
pub struct Entry {
    pub resource: Resource,
    pub children: Vec<Entry>,
}

impl Entry {
    fn is_directory(&self) -> bool {
        self.resource.kind == ResourceKind::Directory
    }

    /// The string a query is compared against: the relative path, without the extension
    /// for pages.
    fn match_key(&self) -> String {
        let path = &self.resource.path;
        let path = if self.resource.kind.is_page() || self.resource.kind == ResourceKind::Html {
            path.with_extension("")
        } else {
            path.clone()
        };
        slashed(&path)
    }

    fn base_name(&self) -> String {
        self.resource
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn slashed(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// A loaded `source/` directory.
#[derive(Debug)]
pub struct SiteTree {
    root: PathBuf,
    entries: Vec<Entry>,
    domain: String,
    build_drafts: bool,
    used: RefCell<HashSet<PathBuf>>,
}

impl SiteTree {
    /// Walks `root` in sorted order.
    pub fn load(root: &Path, domain: &str, build_drafts: bool) -> Result<Self, BobbinError> {
        if !root.is_dir() {
            return Err(BobbinError::io(root, "source directory not found"));
        }
        let entries = read_level(root, root)?;
        debug!(root = %root.display(), entries = entries.len(), "loaded source tree");
        Ok(Self {
            root: root.to_path_buf(),
            entries,
            domain: domain.to_string(),
            build_drafts,
            used: RefCell::new(HashSet::new()),
        })
    }

    /// A tree with no files, for rendering outside a project.
    pub fn empty(root: &Path, domain: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            entries: Vec::new(),
            domain: domain.to_string(),
            build_drafts: false,
            used: RefCell::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Every file in the tree, depth first, in sorted order.
    pub fn files(&self) -> Vec<&Resource> {
        fn walk<'t>(entries: &'t [Entry], out: &mut Vec<&'t Resource>) {
            for entry in entries {
                if entry.is_directory() {
                    walk(&entry.children, out);
                } else {
                    out.push(&entry.resource);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.entries, &mut out);
        out
    }

    pub fn is_used(&self, resource: &Resource) -> bool {
        self.used.borrow().contains(&resource.path)
    }

    /// The resource at an exact source-relative path.
    pub fn get(&self, path: &Path) -> Option<Resource> {
        self.files()
            .into_iter()
            .find(|resource| resource.path == path)
            .cloned()
    }

    pub fn absolute_path(&self, resource: &Resource) -> PathBuf {
        self.root.join(&resource.path)
    }
}

fn read_level(root: &Path, dir: &Path) -> Result<Vec<Entry>, BobbinError> {
    let mut entries = Vec::new();
    for item in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let item = item.map_err(|e| BobbinError::io(dir, e))?;
        let relative = item
            .path()
            .strip_prefix(root)
            .map_err(|e| BobbinError::io(item.path(), e))?
            .to_path_buf();
        if item.file_type().is_dir() {
            let mut resource = Resource::new(relative);
            resource.kind = ResourceKind::Directory;
            entries.push(Entry {
                resource,
                children: read_level(root, item.path())?,
            });
        } else {
            entries.push(Entry {
                resource: Resource::new(relative),
                children: Vec::new(),
            });
        }
    }
    Ok(entries)
}

// ============================================================================
// FUZZY FINDER
// ============================================================================

/// Looks through `entries` for `query`: every sibling first, then each directory in turn.
pub fn find_in(entries: &[Entry], query: &str, kind: FinderKind) -> Option<Resource> {
    let query = query.trim().trim_start_matches("./").trim_start_matches('/');
    if query.is_empty() {
        return None;
    }
    find_level(entries, query, kind)
}

fn find_level(entries: &[Entry], query: &str, kind: FinderKind) -> Option<Resource> {
    entries
        .iter()
        .find_map(|entry| match_entry(entry, query, kind))
        .or_else(|| {
            entries
                .iter()
                .filter(|entry| entry.is_directory())
                .find_map(|entry| find_level(&entry.children, query, kind))
        })
}

/// An entry matches when its edit distance from the query is within the length
/// difference, and the base names agree in length and first character.
fn match_entry(entry: &Entry, query: &str, kind: FinderKind) -> Option<Resource> {
    let candidate = entry.match_key();
    let allowed = candidate.len().checked_sub(query.len())?;
    if strsim::levenshtein(&candidate, query) > allowed {
        return None;
    }

    let query_base = query.rsplit('/').next().unwrap_or(query);
    let candidate_base = candidate.rsplit('/').next().unwrap_or(&candidate);
    if query_base.len() != candidate_base.len()
        || query_base.chars().next() != candidate_base.chars().next()
    {
        return None;
    }

    if !entry.is_directory() {
        return entry
            .resource
            .kind
            .satisfies(kind)
            .then(|| entry.resource.clone());
    }

    let child = match entry.children.as_slice() {
        [only] => Some(only),
        children => children
            .iter()
            .find(|child| !child.is_directory() && child.base_name() == "index"),
    }?;
    (!child.is_directory() && child.resource.kind.satisfies(kind)).then(|| child.resource.clone())
}

impl FileResolver for SiteTree {
    fn find(&self, query: &str, kind: FinderKind) -> Option<Resource> {
        find_in(&self.entries, query, kind)
    }

    fn url_of(&self, resource: &Resource, path_type: PathType, from: &Path) -> String {
        resource_url(resource, path_type, from, &self.domain, self.build_drafts)
    }

    fn mark_used(&self, resource: &Resource) {
        self.used.borrow_mut().insert(resource.path.clone());
    }

    fn read_source(&self, resource: &Resource) -> Option<String> {
        fs::read_to_string(self.absolute_path(resource)).ok()
    }
}
