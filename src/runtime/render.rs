//! The tree-walking renderer.
//!
//! One [`Renderer`] renders one page. It owns the scope and anonymous stacks for that
//! pass and borrows the session for everything shared: templates, partials, the page
//! cache, diagnostics and the taginator queue.
//!
//! Like the parser, the renderer never aborts on user error. Failures are reported to the
//! session's diagnostics and set `unwind`, after which every `render_ast` call returns
//! empty text.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{
    anon_count, empty_nodes, immediate_decl_count, top_scope, Block, Builtin, BuiltinKind,
    Condition, Conditional, DeclKind, Declaration, Finder, FinderKind, Key, Loop, Node,
    NodeKind, Nodes, PathType, ScriptCall, TokenLine, VarKind, Variable,
};
use crate::engine::Session;
use crate::errors::ErrorKind;
use crate::host::{tag_url, FileResolver, Resource, ResourceKind, ScriptSandbox};
use crate::markup::{Markup, Page};
use crate::runtime::scope::{AnonContent, AnonEntry, AnonStack, ScopeStack};
use crate::runtime::script::PageAccessors;
use crate::runtime::taginator;
use crate::runtime::text::{apply_modifier, split_fields, SlugTracker};
use crate::syntax::Span;

static EXTERNAL_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("external URL pattern is valid")
});

pub struct Renderer<'a> {
    pub(crate) session: &'a mut Session,
    pub(crate) resolver: &'a dyn FileResolver,
    scripts: &'a dyn ScriptSandbox,
    pub(crate) page: &'a Page,
    pub(crate) scope: ScopeStack,
    anon: AnonStack,
    slugs: SlugTracker,
    depth: usize,
    unwind: bool,
}

impl<'a> Renderer<'a> {
    pub fn new(
        session: &'a mut Session,
        resolver: &'a dyn FileResolver,
        scripts: &'a dyn ScriptSandbox,
        page: &'a Page,
    ) -> Self {
        Self {
            session,
            resolver,
            scripts,
            page,
            scope: ScopeStack::new(),
            anon: AnonStack::new(),
            slugs: SlugTracker::default(),
            depth: 0,
            unwind: false,
        }
    }

    /// Binds the page's implicit variables and renders it.
    pub fn render(mut self) -> String {
        self.bind_page();
        let page = self.page;
        self.render_ast(&page.markup.nodes)
    }

    fn bind_page(&mut self) {
        let page = self.page;
        let path_mode = self.session.options.path_mode;
        let url = self.resolver.url_of(&page.resource, path_mode, page.path());
        let canonical = self
            .resolver
            .url_of(&page.resource, PathType::Absolute, page.path());

        match &page.tag {
            Some(tag) => {
                let tag_path = self.session.options.tag_path.clone();
                self.bind(Key::TAGINATOR_ACTIVE, "");
                self.bind(Key::TAGINATOR_TAG, &tag.tag);
                self.bind(Key::PAGE_CANONICAL, &tag_url(&canonical, &tag_path, &tag.tag));
                self.bind(Key::PAGE_URL, &tag_url(&url, &tag_path, &tag.tag));
            }
            None => {
                self.bind(Key::PAGE_CANONICAL, &canonical);
                self.bind(Key::PAGE_URL, &url);
            }
        }
        self.bind(Key::TAGINATOR_PARENT, &url);
        self.bind(Key::PAGE_FILE, &page.path().to_string_lossy());
    }

    /// Binds `key` to literal text in the innermost frame.
    pub(crate) fn bind(&mut self, key: Key, text: &str) {
        let span = Span {
            file: self.page.markup.file,
            ..Span::default()
        };
        self.scope
            .declare(Rc::new(Declaration::text(key, text, span)));
    }

    // ========================================================================
    // THE WALK
    // ========================================================================

    pub(crate) fn render_ast(&mut self, nodes: &[Node]) -> String {
        if self.unwind {
            return String::new();
        }
        let max_depth = self.session.options.max_depth;
        if self.depth >= max_depth {
            let span = nodes.first().map(|n| n.span).unwrap_or_default();
            self.fail(ErrorKind::RecursionLimit { limit: max_depth }, span);
            return String::new();
        }
        self.depth += 1;

        let anon = self.anon.top();
        let mut out = String::new();
        let mut index = 0;

        while index < nodes.len() && !self.unwind {
            let node = &nodes[index];
            index += 1;

            match &node.kind {
                NodeKind::Text(text) | NodeKind::Raw(text) => out.push_str(text),
                NodeKind::Blank => {}
                NodeKind::Html(children) => out.push_str(&self.render_ast(children)),
                NodeKind::Paragraph(children) => {
                    out.push_str(&self.render_paragraph(children, node.span))
                }
                NodeKind::Variable(var) => {
                    out.push_str(&self.render_variable(var, anon.as_ref(), node.span))
                }
                NodeKind::Declaration(decl) => self.declare(decl, Some(nodes)),
                NodeKind::Block(block) => out.push_str(&self.render_block(block, node.span)),
                NodeKind::Token(_) => {
                    let (text, used) = self.render_tokens(&nodes[index - 1..]);
                    out.push_str(&text);
                    index += used.saturating_sub(1);
                }
                NodeKind::Builtin(builtin) => match builtin.kind {
                    BuiltinKind::Template => {
                        let fresh = out.is_empty();
                        if let Some(text) =
                            self.expand_template(builtin, &nodes[index..], fresh, node.span)
                        {
                            out.push_str(&text);
                            break;
                        }
                    }
                    BuiltinKind::Partial => {
                        out.push_str(&self.render_partial(builtin, node.span))
                    }
                    BuiltinKind::Import => out.push_str(&self.render_import(builtin, node.span)),
                    BuiltinKind::ScopeUnset => {
                        self.scope.reject(builtin.name, node.span);
                        self.scope.reject(builtin.name.group(), node.span);
                    }
                },
                NodeKind::Script(call) => out.push_str(&self.render_script(call, node.span)),
                NodeKind::If(conditional) => {
                    if self.test(conditional) {
                        out.push_str(&self.render_body(&conditional.body, node.span));
                    }
                }
                NodeKind::For(each) => out.push_str(&self.render_loop(each, node.span)),
                NodeKind::Finder(finder) => out.push_str(&self.render_finder(finder, node.span)),
            }
        }

        self.depth -= 1;
        out
    }

    /// Binds a declaration in the innermost frame. `siblings` is the node list it was
    /// rendered from, or `None` when it is being hoisted.
    fn declare(&mut self, decl: &Rc<Declaration>, siblings: Option<&[Node]>) {
        let decl = if decl.immediate {
            let text = self.render_ast(&decl.children);
            Rc::new(Declaration {
                immediate: false,
                children: Rc::from(vec![Node::text(text, decl.span)]),
                ..(**decl).clone()
            })
        } else {
            Rc::clone(decl)
        };
        self.scope.declare(Rc::clone(&decl));

        if let Some(siblings) = siblings {
            if decl.key == Key::TAGINATOR && decl.kind == DeclKind::Value {
                taginator::run(self, &decl, siblings);
            }
        }
    }

    /// Declares the hoistable nodes of a list ahead of rendering it.
    fn hoist(&mut self, nodes: &[Node]) {
        for node in nodes {
            match &node.kind {
                NodeKind::Declaration(decl) => self.declare(decl, None),
                NodeKind::Builtin(Builtin {
                    kind: BuiltinKind::Template,
                    name,
                    ..
                }) => {
                    if self.depth >= self.session.options.max_depth {
                        continue;
                    }
                    if let Some(template) = self.session.template(*name) {
                        self.depth += 1;
                        self.hoist(&template.top_scope);
                        self.depth -= 1;
                    }
                }
                _ => {}
            }
        }
    }

    /// Renders `wrapper` around `content` in its own frame. `hoist` holds nodes whose
    /// declarations the wrapper should see.
    fn wrap(
        &mut self,
        wrapper: &Declaration,
        content: AnonContent,
        hoist: &[Node],
        span: Span,
    ) -> String {
        let frame = self
            .scope
            .open(immediate_decl_count(&wrapper.children) + immediate_decl_count(hoist));
        self.hoist(hoist);
        let depth = self
            .anon
            .push(anon_count(&wrapper.children), content, span);
        let out = self.render_ast(&wrapper.children);
        self.anon.truncate(depth);
        self.scope.close(frame);
        out
    }

    fn inline(&self, text: String) -> String {
        self.session.options.inline.apply(text)
    }

    // ========================================================================
    // LINES, BLOCKS AND TOKENS
    // ========================================================================

    fn render_paragraph(&mut self, children: &Nodes, span: Span) -> String {
        match self.scope.lookup(Key::DEFAULT) {
            Some(wrapper) => {
                let out = self.wrap(&wrapper, AnonContent::Nodes(Rc::clone(children)), &[], span);
                self.inline(out)
            }
            None => self.render_ast(children),
        }
    }

    fn render_variable(
        &mut self,
        var: &Variable,
        anon: Option<&Rc<AnonEntry>>,
        span: Span,
    ) -> String {
        let text = match var.kind {
            VarKind::Named(key) => match self.scope.lookup(key) {
                Some(decl) => self.render_ast(&decl.children),
                None => String::new(),
            },
            VarKind::Anonymous => self.substitute(anon, span),
            VarKind::Indexed(0) => self.substitute(anon, span),
            VarKind::Indexed(n) => {
                let text = self.substitute(anon, span);
                let mut fields = split_fields(&text);
                let needed = n as usize;
                if needed > fields.len() {
                    self.warn(
                        ErrorKind::NotEnoughArguments {
                            supplied: fields.len(),
                            needed,
                        },
                        span,
                    );
                    String::new()
                } else {
                    fields.swap_remove(needed - 1)
                }
            }
        };
        apply_modifier(var.modifier, text, &mut self.slugs)
    }

    /// Expands one anonymous slot of `entry`. Its content renders with `entry` off the
    /// stack, so slots inside the content resolve against the caller's entry.
    fn substitute(&mut self, entry: Option<&Rc<AnonEntry>>, span: Span) -> String {
        let Some(entry) = entry else {
            self.fail(ErrorKind::NoAnonymousContent, span);
            return String::new();
        };
        let restore = self.anon.consume(entry);
        let text = match &entry.content {
            AnonContent::Nodes(nodes) => self.render_ast(nodes),
            AnonContent::Text(text) => text.to_string(),
        };
        if restore {
            self.anon.restore(Rc::clone(entry));
        }
        text
    }

    fn render_block(&mut self, block: &Block, span: Span) -> String {
        if !self.tag_allows(&block.children) {
            return String::new();
        }
        self.render_body(block, span)
    }

    /// A block's children, wrapped when the block names a block template in scope.
    fn render_body(&mut self, block: &Block, span: Span) -> String {
        let wrapper = block
            .name
            .and_then(|name| self.scope.lookup_kind(name, DeclKind::Block));
        if let Some(wrapper) = wrapper {
            let content = AnonContent::Nodes(Rc::clone(&block.children));
            return self.wrap(&wrapper, content, &block.children, span);
        }
        let frame = self.scope.open(immediate_decl_count(&block.children));
        let out = self.render_ast(&block.children);
        self.scope.close(frame);
        out
    }

    /// Renders the token line at `nodes[0]`, and with a group wrapper every following line
    /// of the same token. Returns the output and the number of nodes consumed.
    fn render_tokens(&mut self, nodes: &[Node]) -> (String, usize) {
        let Some(NodeKind::Token(first)) = nodes.first().map(|n| &n.kind) else {
            return (String::new(), 1);
        };
        let span = nodes[0].span;
        let wrapper = self.scope.lookup_kind(first.key, DeclKind::Token);

        let Some(group) = self.scope.lookup_kind(first.key.group(), DeclKind::Token) else {
            return (self.render_token_line(wrapper.as_deref(), first, span), 1);
        };

        let mut items = String::new();
        let mut used = 0;
        for node in nodes {
            match &node.kind {
                NodeKind::Token(line) if line.key == first.key && !self.unwind => {
                    let item = self.render_token_line(wrapper.as_deref(), line, node.span);
                    items.push_str(&item);
                    used += 1;
                }
                _ => break,
            }
        }
        let out = self.wrap(&group, AnonContent::Text(items.into()), &[], span);
        (out, used.max(1))
    }

    /// One token line through its template, else `default` or its own text.
    fn render_token_line(
        &mut self,
        wrapper: Option<&Declaration>,
        line: &TokenLine,
        span: Span,
    ) -> String {
        if let Some(wrapper) = wrapper {
            return self.wrap_token(wrapper, line, span);
        }
        if line.children.is_empty() {
            match self.scope.lookup(Key::DEFAULT) {
                Some(default) => {
                    let out = self.wrap(&default, AnonContent::Nodes(empty_nodes()), &[], span);
                    self.inline(out)
                }
                None => {
                    self.warn_untemplated(line, span);
                    line.text.to_string()
                }
            }
        } else {
            self.warn_untemplated(line, span);
            let out = self.render_ast(&line.children);
            self.inline(out)
        }
    }

    fn wrap_token(&mut self, wrapper: &Declaration, line: &TokenLine, span: Span) -> String {
        let out = self.wrap(
            wrapper,
            AnonContent::Nodes(Rc::clone(&line.children)),
            &[],
            span,
        );
        self.inline(out)
    }

    fn warn_untemplated(&mut self, line: &TokenLine, span: Span) {
        if line.key != Key::STOP {
            self.warn(
                ErrorKind::MissingTokenTemplate {
                    token: line.text.to_string(),
                },
                span,
            );
        }
    }

    // ========================================================================
    // CONTROL FLOW
    // ========================================================================

    /// Conditions read as a disjunction of conjunctions: `|` ends a chain and succeeds
    /// if that chain held, `!` negates the next test.
    fn test(&self, conditional: &Conditional) -> bool {
        let mut chain = true;
        let mut tested = false;
        let mut negate = false;
        let mut result = false;

        for condition in conditional.conditions.iter() {
            match condition {
                Condition::Not => negate = !negate,
                Condition::And => {}
                Condition::Or => {
                    if chain && tested {
                        result = true;
                        break;
                    }
                    chain = true;
                    tested = false;
                    negate = false;
                }
                Condition::Exists(key) => {
                    chain &= self.scope.contains(*key) != negate;
                    tested = true;
                    negate = false;
                }
            }
        }

        let result = result || (chain && tested);
        result != conditional.negated
    }

    fn render_loop(&mut self, each: &Loop, span: Span) -> String {
        let source = self.render_ast(std::slice::from_ref(&*each.source));
        let fields = split_fields(&source);
        if fields.is_empty() {
            return String::new();
        }

        let frame = self.scope.open_always();
        let mut accumulated = String::new();
        for (i, field) in fields.iter().enumerate() {
            self.bind(Key::IT, field);
            if i + 1 == fields.len() {
                self.bind(Key::LAST, "");
            }
            accumulated.push_str(&self.render_ast(&each.body.children));
            if self.unwind {
                break;
            }
        }

        let wrapper = each.body.name.and_then(|name| self.scope.lookup(name));
        let out = match wrapper {
            Some(wrapper) => self.wrap(&wrapper, AnonContent::Text(accumulated.into()), &[], span),
            None => accumulated,
        };
        self.scope.close(frame);
        out
    }

    // ========================================================================
    // BUILTINS
    // ========================================================================

    /// `& name`. Returns the output when the template took over the rest of the level.
    fn expand_template(
        &mut self,
        builtin: &Builtin,
        rest: &[Node],
        fresh: bool,
        span: Span,
    ) -> Option<String> {
        if let Some(template) = self.session.template(builtin.name) {
            if template.has_body && fresh {
                let rest: Nodes = Rc::from(rest);
                let frame = self.scope.open(
                    immediate_decl_count(&template.nodes) + immediate_decl_count(&rest),
                );
                self.hoist(&rest);
                let depth = self.anon.push(
                    anon_count(&template.nodes),
                    AnonContent::Nodes(Rc::clone(&rest)),
                    span,
                );
                let out = self.render_ast(&template.nodes);
                self.anon.truncate(depth);
                self.scope.close(frame);
                return Some(out);
            }
            self.hoist(&template.top_scope);
            return None;
        }

        if let Some(decl) = self.scope.lookup(builtin.name) {
            if let [Node {
                kind: NodeKind::Block(block),
                ..
            }] = &decl.children[..]
            {
                self.hoist(&top_scope(&block.children));
                return None;
            }
        }

        self.fail(
            ErrorKind::MissingTemplate {
                name: builtin.raw_name.to_string(),
            },
            span,
        );
        None
    }

    /// `> name`: a partial from the store, or failing that any file the resolver finds.
    fn render_partial(&mut self, builtin: &Builtin, span: Span) -> String {
        if let Some(partial) = self.session.partial(builtin.name) {
            let frame = self.scope.open_always();
            let out = self.render_ast(&partial.nodes);
            self.scope.close(frame);
            return out;
        }

        if let Some(resource) = self.resolver.find(&builtin.raw_name, FinderKind::Any) {
            if resource.kind == ResourceKind::Markup {
                if let Some(markup) = self.session.load_page(&resource, self.resolver) {
                    let frame = self.scope.open_always();
                    self.hoist(&markup.top_scope);
                    let out = self.render_ast(&markup.nodes);
                    self.scope.close(frame);
                    return out;
                }
            } else if let Some(text) = self.resolver.read_source(&resource) {
                return text;
            }
        }

        self.fail(
            ErrorKind::MissingPartial {
                name: builtin.raw_name.to_string(),
            },
            span,
        );
        String::new()
    }

    /// Resolves an import target to a page. `None` when nothing matches.
    pub(crate) fn find_import(&mut self, path: &[Node]) -> Option<(String, Resource)> {
        let target = self.render_ast(path).trim().to_string();
        let resource = self.resolver.find(&target, FinderKind::Page)?;
        Some((target, resource))
    }

    pub(crate) fn load(&mut self, resource: &Resource) -> Option<Rc<Markup>> {
        self.session.load_page(resource, self.resolver)
    }

    /// `~ target alias`: renders the importer's `alias` declaration with the imported
    /// page's declarations in scope.
    fn render_import(&mut self, builtin: &Builtin, span: Span) -> String {
        let Some(template) = self.scope.lookup(builtin.name) else {
            self.fail(
                ErrorKind::MissingImportTemplate {
                    name: builtin.raw_name.to_string(),
                },
                span,
            );
            return String::new();
        };

        let Some((target, resource)) = self.find_import(&builtin.path) else {
            let target = self.render_ast(&builtin.path).trim().to_string();
            self.report(ErrorKind::ImportNotFound { target }, span);
            return String::new();
        };
        let Some(markup) = self.load(&resource) else {
            self.fail(
                ErrorKind::PageUnavailable {
                    path: resource.path.display().to_string(),
                },
                span,
            );
            return String::new();
        };
        if !self.tag_allows(&markup.top_scope) {
            return String::new();
        }

        self.resolver.mark_used(&resource);
        let path_mode = self.session.options.path_mode;
        let url = self
            .resolver
            .url_of(&resource, path_mode, self.page.path());

        let frame = self.scope.open_always();
        self.hoist(&markup.top_scope);
        self.bind(Key::PATH, &target);
        self.bind(Key::IMPORT_URL, &url);
        let out = self.render_ast(&template.children);
        self.scope.close(frame);
        out
    }

    fn render_script(&mut self, call: &ScriptCall, span: Span) -> String {
        let scripts = self.scripts;
        let Some(source) = scripts.load(&call.name) else {
            self.fail(
                ErrorKind::MissingScript {
                    name: call.name.to_string(),
                },
                span,
            );
            return String::new();
        };

        let args = split_fields(&self.render_ast(&call.args));
        let result = {
            let mut accessors = PageAccessors::new(self);
            scripts.call(&call.name, &source, &args, &mut accessors)
        };
        match result {
            Ok(text) => text,
            Err(message) => {
                self.report(
                    ErrorKind::ScriptFailed {
                        name: call.name.to_string(),
                        message,
                    },
                    span,
                );
                String::new()
            }
        }
    }

    // ========================================================================
    // RESOURCES
    // ========================================================================

    fn render_finder(&mut self, finder: &Finder, span: Span) -> String {
        let target = self.render_ast(&finder.target);
        if EXTERNAL_URL.is_match(&target) {
            return target;
        }

        let Some(resource) = self.resolver.find(&target, finder.kind) else {
            self.report(ErrorKind::ResourceNotFound { target }, span);
            return String::new();
        };
        if resource.draft && !self.session.options.build_drafts {
            self.report(
                ErrorKind::DraftLinked {
                    path: resource.path.display().to_string(),
                },
                span,
            );
        }

        let path_type = finder.path_type.unwrap_or(self.session.options.path_mode);
        if let (ResourceKind::Image, Some(settings)) = (resource.kind, finder.image) {
            let output = self.session.register_image(&resource.path, settings);
            let generated = Resource {
                path: output,
                ..resource
            };
            return self
                .resolver
                .url_of(&generated, path_type, self.page.path());
        }

        self.resolver.mark_used(&resource);
        self.resolver
            .url_of(&resource, path_type, self.page.path())
    }

    /// A resource URL in the site's path mode, for scripts. Empty when not found.
    pub(crate) fn find_url(&mut self, query: &str) -> String {
        let Some(resource) = self.resolver.find(query, FinderKind::Any) else {
            return String::new();
        };
        self.resolver.mark_used(&resource);
        let path_mode = self.session.options.path_mode;
        self.resolver
            .url_of(&resource, path_mode, self.page.path())
    }

    // ========================================================================
    // TAGINATOR FILTERING AND REPORTING
    // ========================================================================

    /// On a taginator clone, content that declares the tag list is kept only when the
    /// list contains the active tag.
    fn tag_allows(&mut self, nodes: &[Node]) -> bool {
        let page = self.page;
        let Some(tag) = &page.tag else {
            return true;
        };
        let decl = nodes
            .iter()
            .filter_map(Node::as_declaration)
            .find(|decl| decl.key == tag.list && decl.kind == DeclKind::Value);
        let Some(decl) = decl.cloned() else {
            return true;
        };
        let text = self.render_ast(&decl.children).to_lowercase();
        split_fields(&text).iter().any(|t| *t == tag.tag)
    }

    fn warn(&mut self, kind: ErrorKind, span: Span) {
        self.session.diagnostics.warn(kind, span);
    }

    /// A failure the render recovers from.
    fn report(&mut self, kind: ErrorKind, span: Span) {
        self.session.diagnostics.fail(kind, span);
    }

    fn fail(&mut self, kind: ErrorKind, span: Span) {
        self.session.diagnostics.fail(kind, span);
        self.unwind = true;
    }
}
