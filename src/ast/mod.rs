//! The syntax tree produced by the parser and walked by the renderer.
//!
//! Child lists are reference counted so the renderer can hold on to a subtree (in a scope
//! entry or an anonymous-substitution entry) while the file that owns it stays borrowed
//! elsewhere. Nothing mutates a tree after parsing.

use serde::Serialize;
use std::rc::Rc;

use crate::syntax::Span;

pub mod key;

pub use key::{Key, Symbols};

pub type Nodes = Rc<[Node]>;

pub fn empty_nodes() -> Nodes {
    Rc::from(Vec::new())
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub span: Span,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { span, kind }
    }

    pub fn text(text: impl Into<Rc<str>>, span: Span) -> Self {
        Self::new(NodeKind::Text(text.into()), span)
    }

    /// Child nodes that take part in anonymous-slot counting.
    pub fn children(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Paragraph(children)
            | NodeKind::Html(children)
            | NodeKind::Script(ScriptCall { args: children, .. })
            | NodeKind::Token(TokenLine { children, .. })
            | NodeKind::Block(Block { children, .. })
            | NodeKind::If(Conditional {
                body: Block { children, .. },
                ..
            })
            | NodeKind::For(Loop {
                body: Block { children, .. },
                ..
            })
            | NodeKind::Finder(Finder {
                target: children, ..
            }) => Some(children),
            NodeKind::Builtin(builtin) => Some(&builtin.path),
            _ => None,
        }
    }

    pub fn as_declaration(&self) -> Option<&Rc<Declaration>> {
        match &self.kind {
            NodeKind::Declaration(decl) => Some(decl),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum NodeKind {
    /// Plain text inside a line.
    Text(Rc<str>),
    /// An ordinary line. Rendered through the `default` template when one is in scope.
    Paragraph(Nodes),
    /// A line that starts with `<`. Rendered as-is.
    Html(Nodes),
    /// The escaped and re-indented body of a `raw { ... }` block.
    Raw(Rc<str>),
    Blank,
    Variable(Variable),
    Declaration(Rc<Declaration>),
    Block(Block),
    Token(TokenLine),
    Builtin(Builtin),
    Script(ScriptCall),
    If(Conditional),
    For(Loop),
    Finder(Finder),
}

// ============================================================================
// NODE PAYLOADS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeclKind {
    /// `name = value`
    Value,
    /// `[name] = ...`, a wrapper for `name { ... }` blocks.
    Block,
    /// `[#] = ...` or `{#} = ...`, a wrapper for token lines or their group.
    Token,
    /// Pushed by scope-unset. Stops lookups of its key.
    Reject,
}

#[derive(Debug, Clone, Serialize)]
pub struct Declaration {
    pub key: Key,
    pub kind: DeclKind,
    /// Declared in a template or partial: yields to an existing non-soft declaration.
    pub soft: bool,
    /// Declared with `:=`.
    pub immediate: bool,
    pub span: Span,
    pub children: Nodes,
}

impl Declaration {
    pub fn reject(key: Key, span: Span) -> Self {
        Self {
            key,
            kind: DeclKind::Reject,
            soft: false,
            immediate: false,
            span,
            children: empty_nodes(),
        }
    }

    /// A value declaration holding a single text node.
    pub fn text(key: Key, text: impl Into<Rc<str>>, span: Span) -> Self {
        Self {
            key,
            kind: DeclKind::Value,
            soft: false,
            immediate: false,
            span,
            children: Rc::from(vec![Node::text(text, span)]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VarKind {
    /// `%name` or `%name.sub`
    Named(Key),
    /// `%%`
    Anonymous,
    /// `%N`
    Indexed(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Modifier {
    #[default]
    None,
    Slug,
    UniqueSlug,
    Upper,
    Lower,
    Title,
}

impl Modifier {
    pub fn from_name(name: &str) -> Option<Modifier> {
        let modifier = match name {
            "slug" | "s" => Modifier::Slug,
            "unique_slug" | "uslug" | "us" => Modifier::UniqueSlug,
            "upper" | "u" => Modifier::Upper,
            "lower" | "l" => Modifier::Lower,
            "title" | "t" => Modifier::Title,
            _ => return None,
        };
        Some(modifier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Variable {
    pub kind: VarKind,
    pub modifier: Modifier,
}

impl Variable {
    pub fn is_slot(&self) -> bool {
        matches!(self.kind, VarKind::Anonymous | VarKind::Indexed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Block {
    /// Wrapper to look up, if the block was written `name { ... }`.
    pub name: Option<Key>,
    pub children: Nodes,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenLine {
    pub key: Key,
    pub text: Rc<str>,
    pub children: Nodes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuiltinKind {
    /// `~ target [alias]`
    Import,
    /// `& name`
    Template,
    /// `> name`
    Partial,
    /// `*name` or `× name`
    ScopeUnset,
}

#[derive(Debug, Clone, Serialize)]
pub struct Builtin {
    pub kind: BuiltinKind,
    pub name: Key,
    pub raw_name: Rc<str>,
    /// The import target. Empty for the other builtins.
    pub path: Nodes,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptCall {
    pub name: Rc<str>,
    pub args: Nodes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Condition {
    Not,
    And,
    Or,
    Exists(Key),
}

#[derive(Debug, Clone, Serialize)]
pub struct Conditional {
    pub conditions: Rc<[Condition]>,
    /// An `else` branch: the shared condition list is inverted.
    pub negated: bool,
    pub body: Block,
}

#[derive(Debug, Clone, Serialize)]
pub struct Loop {
    pub source: Box<Node>,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FinderKind {
    Any,
    Page,
    Image,
    Static,
}

/// How a resource URL is written into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PathType {
    /// `/blog/post`
    #[default]
    Rooted,
    /// `https://example.com/blog/post`
    Absolute,
    /// `../blog/post`, relative to the page being rendered.
    Relative,
}

impl PathType {
    pub fn from_name(name: &str) -> Option<PathType> {
        match name {
            "abs" | "absolute" => Some(PathType::Absolute),
            "rel" | "relative" => Some(PathType::Relative),
            "root" | "rooted" => Some(PathType::Rooted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImageFormat {
    Png,
    Jpg,
    Webp,
    Tiff,
}

impl ImageFormat {
    pub fn from_name(name: &str) -> Option<ImageFormat> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpg),
            "webp" => Some(ImageFormat::Webp),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Webp => "webp",
            ImageFormat::Tiff => "tiff",
        }
    }
}

/// Quality used when a finder or the site sets any image option but not the quality.
pub const DEFAULT_QUALITY: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ImageSettings {
    pub quality: u32,
    /// Longest edge in pixels, zero for unchanged.
    pub max_size: u32,
    /// `None` keeps the source image's format.
    pub format: Option<ImageFormat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Finder {
    pub kind: FinderKind,
    pub path_type: Option<PathType>,
    pub target: Nodes,
    pub image: Option<ImageSettings>,
}

// ============================================================================
// PRE-COUNTS
// ============================================================================

/// Number of `%%` / `%N` slots a wrapper consumes, looking through nested nodes but not
/// into declarations.
pub fn anon_count(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match &node.kind {
            NodeKind::Declaration(_) => 0,
            NodeKind::Variable(var) if var.is_slot() => 1,
            _ => node.children().map_or(0, anon_count),
        })
        .sum()
}

/// Scope entries a node list can push at its own level. Frames are only opened when this
/// is non-zero.
pub fn immediate_decl_count(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match &node.kind {
            NodeKind::Declaration(_) => 1,
            NodeKind::Builtin(Builtin {
                kind: BuiltinKind::Template,
                ..
            }) => 8,
            NodeKind::Builtin(Builtin {
                kind: BuiltinKind::ScopeUnset,
                ..
            }) => 2,
            _ => 0,
        })
        .sum()
}

/// The direct-child declarations and template builtins of a file, hoisted when the file is
/// imported or used as a template.
pub fn top_scope(nodes: &[Node]) -> Vec<Node> {
    nodes
        .iter()
        .filter(|node| {
            matches!(
                node.kind,
                NodeKind::Declaration(_)
                    | NodeKind::Builtin(Builtin {
                        kind: BuiltinKind::Template,
                        ..
                    })
            )
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod count_tests {
    use super::*;

    fn slot(span: Span) -> Node {
        Node::new(
            NodeKind::Variable(Variable {
                kind: VarKind::Anonymous,
                modifier: Modifier::None,
            }),
            span,
        )
    }

    #[test]
    fn anon_count_skips_declarations() {
        let span = Span::default();
        let decl = Declaration {
            key: Key::of("x"),
            kind: DeclKind::Value,
            soft: false,
            immediate: false,
            span,
            children: Rc::from(vec![slot(span)]),
        };
        let nodes = vec![
            Node::new(NodeKind::Paragraph(Rc::from(vec![slot(span)])), span),
            Node::new(NodeKind::Declaration(Rc::new(decl)), span),
            slot(span),
        ];
        assert_eq!(anon_count(&nodes), 2);
        assert_eq!(immediate_decl_count(&nodes), 1);
    }
}
