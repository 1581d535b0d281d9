//! Shared fixtures: an in-memory site and a one-call render helper.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use bobbin::ast::{FinderKind, PathType};
use bobbin::engine::{Options, Session};
use bobbin::host::{FileResolver, NoScripts, Resource, ResourceKind};
use bobbin::markup::Page;
use bobbin::site::tree::{find_in, Entry};
use bobbin::site::urls::resource_url;

pub const DOMAIN: &str = "https://example.com/";

/// A [`FileResolver`] over files held in memory, using the same fuzzy finder as the disk
/// tree.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    files: BTreeMap<PathBuf, String>,
    used: RefCell<HashSet<PathBuf>>,
}

impl MemoryResolver {
    pub fn insert(&mut self, path: &str, text: &str) {
        self.files.insert(PathBuf::from(path), text.to_string());
    }

    pub fn is_used(&self, path: &str) -> bool {
        self.used.borrow().contains(Path::new(path))
    }

    fn entries(&self) -> Vec<Entry> {
        let paths: Vec<&Path> = self.files.keys().map(PathBuf::as_path).collect();
        level(&paths, Path::new(""))
    }
}

fn level(paths: &[&Path], dir: &Path) -> Vec<Entry> {
    let mut dirs: BTreeMap<PathBuf, Vec<&Path>> = BTreeMap::new();
    let mut entries = Vec::new();
    for path in paths {
        let Ok(rest) = path.strip_prefix(dir) else {
            continue;
        };
        let mut components = rest.components();
        let Some(first) = components.next() else {
            continue;
        };
        if components.next().is_some() {
            dirs.entry(dir.join(first)).or_default().push(*path);
        } else {
            entries.push(Entry {
                resource: Resource::new(*path),
                children: Vec::new(),
            });
        }
    }
    let mut directories: Vec<Entry> = dirs
        .into_iter()
        .map(|(sub, children)| {
            let mut resource = Resource::new(sub.clone());
            resource.kind = ResourceKind::Directory;
            Entry {
                resource,
                children: level(&children, &sub),
            }
        })
        .collect();
    directories.extend(entries);
    directories
}

impl FileResolver for MemoryResolver {
    fn find(&self, query: &str, kind: FinderKind) -> Option<Resource> {
        find_in(&self.entries(), query, kind)
    }

    fn url_of(&self, resource: &Resource, path_type: PathType, from: &Path) -> String {
        resource_url(resource, path_type, from, DOMAIN, false)
    }

    fn mark_used(&self, resource: &Resource) {
        self.used.borrow_mut().insert(resource.path.clone());
    }

    fn read_source(&self, resource: &Resource) -> Option<String> {
        self.files.get(&resource.path).cloned()
    }
}

/// A session plus an in-memory file tree.
pub struct Site {
    pub session: Session,
    pub files: MemoryResolver,
}

impl Default for Site {
    fn default() -> Self {
        Self::new()
    }
}

impl Site {
    pub fn new() -> Self {
        Self::with_options(Options {
            path_mode: PathType::Rooted,
            ..Options::default()
        })
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            session: Session::new(options),
            files: MemoryResolver::default(),
        }
    }

    pub fn template(mut self, name: &str, text: &str) -> Self {
        self.session.add_template(name, text);
        self
    }

    pub fn partial(mut self, name: &str, text: &str) -> Self {
        self.session.add_partial(name, text);
        self
    }

    pub fn file(mut self, path: &str, text: &str) -> Self {
        self.files.insert(path, text);
        self
    }

    pub fn page(&mut self, path: &str) -> Page {
        let resource = Resource::new(path);
        self.session
            .page(&resource, &self.files)
            .unwrap_or_else(|| panic!("{path} is not in the site"))
    }

    pub fn render_page(&mut self, page: &Page) -> String {
        self.session.render_page(page, &self.files, &NoScripts)
    }

    /// Renders the stored file at `path`.
    pub fn render(&mut self, path: &str) -> String {
        let page = self.page(path);
        self.render_page(&page)
    }

    /// Renders `text` as `index.x`.
    pub fn render_source(&mut self, text: &str) -> String {
        let page = self.session.page_from_source("index.x", text);
        self.render_page(&page)
    }

    pub fn warnings(&self) -> usize {
        self.session.diagnostics.warning_count()
    }

    pub fn failures(&self) -> usize {
        self.session.diagnostics.failure_count()
    }

    pub fn codes(&self) -> Vec<String> {
        self.session
            .diagnostics
            .entries()
            .iter()
            .map(|e| e.error_code.clone())
            .collect()
    }
}

/// Renders a standalone page with no templates, partials or files.
pub fn render(text: &str) -> String {
    Site::new().render_source(text)
}
