//! Page and scope access for running scripts.

use std::rc::Rc;

use crate::ast::{DeclKind, Key, Node, NodeKind};
use crate::host::{ScriptAccessors, ScriptToken};
use crate::runtime::render::Renderer;
use crate::runtime::text::split_fields;

/// The [`ScriptAccessors`] handed to a sandbox during a `$script` call. Lookups see the
/// caller's scope; token searches walk the calling page.
pub(crate) struct PageAccessors<'r, 'a> {
    renderer: &'r mut Renderer<'a>,
}

impl<'r, 'a> PageAccessors<'r, 'a> {
    pub(crate) fn new(renderer: &'r mut Renderer<'a>) -> Self {
        Self { renderer }
    }
}

impl ScriptAccessors for PageAccessors<'_, '_> {
    fn get(&mut self, name: &str) -> String {
        match self
            .renderer
            .scope
            .lookup_kind(Key::of(name), DeclKind::Value)
        {
            Some(decl) => self.renderer.render_ast(&decl.children),
            None => String::new(),
        }
    }

    fn get_token(&mut self, depth: usize, tokens: &[&str]) -> Vec<ScriptToken> {
        let keys: Vec<Key> = tokens.iter().map(|t| Key::of(t)).collect();
        let nodes = Rc::clone(&self.renderer.page.markup.nodes);
        let mut found = Vec::new();
        collect_tokens(self.renderer, &nodes, depth, &keys, &mut found);
        found
    }

    fn get_array(&mut self, name: &str) -> Vec<String> {
        split_fields(&self.get(name))
    }

    fn has_elements(&mut self, names: &[&str]) -> bool {
        let keys: Vec<Key> = names.iter().map(|n| Key::of(n)).collect();
        has_elements(&self.renderer.page.markup.nodes, &keys)
    }

    fn find_file(&mut self, query: &str) -> String {
        self.renderer.find_url(query)
    }
}

fn collect_tokens(
    renderer: &mut Renderer<'_>,
    nodes: &[Node],
    depth: usize,
    keys: &[Key],
    found: &mut Vec<ScriptToken>,
) {
    if depth == 0 {
        return;
    }
    for node in nodes {
        match &node.kind {
            NodeKind::Token(line) if keys.contains(&line.key) => {
                found.push(ScriptToken {
                    token: line.text.to_string(),
                    text: renderer.render_ast(&line.children),
                    line: node.span.line,
                });
            }
            NodeKind::Token(_) => {}
            _ => {
                if let Some(children) = node.children() {
                    collect_tokens(renderer, children, depth - 1, keys, found);
                }
            }
        }
    }
}

fn has_elements(nodes: &[Node], keys: &[Key]) -> bool {
    nodes.iter().any(|node| {
        let keyed = match &node.kind {
            NodeKind::Token(line) => return keys.contains(&line.key),
            NodeKind::Block(block) => block.name.is_some_and(|name| keys.contains(&name)),
            _ => false,
        };
        keyed || node.children().is_some_and(|children| has_elements(children, keys))
    })
}
