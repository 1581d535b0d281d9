//! The taginator: one extra page render per distinct tag.
//!
//! `taginator = tags` names a tag-list declaration. When it renders, the sibling nodes are
//! scanned (through blocks and imported pages) for `tags = ...` declarations, and every tag
//! found schedules a clone of the page with that tag active. The clone renders at
//! `<page>/<tag_path>/<tag>`.

use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::ast::{BuiltinKind, DeclKind, Declaration, Key, Node, NodeKind, PathType};
use crate::host::tag_url;
use crate::markup::Page;
use crate::runtime::render::Renderer;
use crate::runtime::text::split_fields;

/// Clones waiting to be rendered, keyed by their rooted URL. A URL stays reserved after
/// its clone is drained, so rescanning during the clone's own render is a no-op.
#[derive(Debug, Default)]
pub struct TagQueue {
    reserved: HashSet<String>,
    pending: Vec<(String, Page)>,
}

impl TagQueue {
    /// Queues `page` under `url` unless that URL was already taken.
    pub fn schedule(&mut self, url: String, page: impl FnOnce() -> Page) -> bool {
        if !self.reserved.insert(url.clone()) {
            return false;
        }
        self.pending.push((url, page()));
        true
    }

    pub fn drain(&mut self) -> Vec<(String, Page)> {
        std::mem::take(&mut self.pending)
    }
}

/// Runs the scan for a rendered `taginator` declaration and binds `taginator.all_tags`.
pub(crate) fn run(renderer: &mut Renderer<'_>, decl: &Declaration, siblings: &[Node]) {
    let target = renderer.render_ast(&decl.children);
    let list = renderer.session.symbols.intern(target.trim());
    if list.is_none() {
        return;
    }

    let mut tags = BTreeSet::new();
    collect(renderer, siblings, list, &mut tags, 0);

    let page = renderer.page;
    let base = renderer
        .resolver
        .url_of(&page.resource, PathType::Rooted, page.path());
    for tag in &tags {
        let url = tag_url(&base, &renderer.session.options.tag_path, tag);
        if renderer
            .session
            .tags
            .schedule(url.clone(), || page.clone_for_tag(list, tag.as_str()))
        {
            debug!(%url, tag = tag.as_str(), "scheduled taginator page");
        }
    }

    let all = tags.into_iter().collect::<Vec<_>>().join(" ");
    renderer.bind(Key::TAGINATOR_ALL, &all);
}

fn collect(
    renderer: &mut Renderer<'_>,
    nodes: &[Node],
    list: Key,
    tags: &mut BTreeSet<String>,
    depth: usize,
) {
    if depth >= renderer.session.options.max_depth {
        return;
    }
    for node in nodes {
        match &node.kind {
            NodeKind::Declaration(decl) if decl.key == list && decl.kind == DeclKind::Value => {
                let decl = Rc::clone(decl);
                let text = renderer.render_ast(&decl.children).to_lowercase();
                tags.extend(split_fields(&text));
            }
            NodeKind::Builtin(builtin) if builtin.kind == BuiltinKind::Import => {
                let imported = renderer
                    .find_import(&builtin.path)
                    .and_then(|(_, resource)| renderer.load(&resource));
                if let Some(markup) = imported {
                    collect(renderer, &markup.nodes, list, tags, depth + 1);
                }
            }
            NodeKind::Block(block) => collect(renderer, &block.children, list, tags, depth + 1),
            _ => {}
        }
    }
}

#[cfg(test)]
mod queue_tests {
    use super::*;
    use crate::host::Resource;
    use crate::markup::Markup;
    use crate::syntax::FileId;

    fn page() -> Page {
        let markup = Rc::new(Markup::new("blog.x", FileId(0), Vec::new()));
        Page::new(markup, Resource::new("blog.x"))
    }

    #[test]
    fn urls_stay_reserved_after_drain() {
        let mut queue = TagQueue::default();
        let original = page();
        let list = Key::of("tags");

        assert!(queue.schedule("/blog/tag/rust".into(), || original.clone_for_tag(list, "rust")));
        assert!(!queue.schedule("/blog/tag/rust".into(), || original.clone_for_tag(list, "rust")));
        assert_eq!(queue.drain().len(), 1);
        assert!(!queue.schedule("/blog/tag/rust".into(), || original.clone_for_tag(list, "rust")));
        assert!(queue.drain().is_empty());
    }
}
