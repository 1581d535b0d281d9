//! Parsed files: pages, templates and partials.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::{anon_count, top_scope, Key, Node, Nodes};
use crate::host::Resource;
use crate::syntax::FileId;

/// A parsed markup file with its hoistable declarations pre-extracted.
#[derive(Debug)]
pub struct Markup {
    pub path: PathBuf,
    pub file: FileId,
    pub nodes: Nodes,
    /// Direct-child declarations and template builtins.
    pub top_scope: Nodes,
    /// Contains `%%` or `%N` slots, so `& name` wraps the rest of the calling page.
    pub has_body: bool,
}

impl Markup {
    pub fn new(path: impl Into<PathBuf>, file: FileId, nodes: Vec<Node>) -> Self {
        let top_scope = top_scope(&nodes).into();
        let has_body = anon_count(&nodes) > 0;
        Self {
            path: path.into(),
            file,
            nodes: nodes.into(),
            top_scope,
            has_body,
        }
    }
}

/// The active tag of a taginator clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagContext {
    /// The tag-list declaration the taginator was pointed at.
    pub list: Key,
    /// Lower-cased tag this clone is rendered for.
    pub tag: String,
}

/// One render target: a parsed page, the file it came from and, for taginator clones,
/// the active tag. Clones share the original's tree.
#[derive(Debug, Clone)]
pub struct Page {
    pub markup: Rc<Markup>,
    pub resource: Resource,
    pub tag: Option<TagContext>,
}

impl Page {
    pub fn new(markup: Rc<Markup>, resource: Resource) -> Self {
        Self {
            markup,
            resource,
            tag: None,
        }
    }

    pub fn clone_for_tag(&self, list: Key, tag: impl Into<String>) -> Self {
        Self {
            markup: Rc::clone(&self.markup),
            resource: self.resource.clone(),
            tag: Some(TagContext {
                list,
                tag: tag.into(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.resource.path
    }
}
