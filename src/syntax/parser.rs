//! Backtracking, line-oriented parser.
//!
//! Most decisions are made at the start of a line and only become certain a few tokens in
//! (`word` may open a paragraph, a declaration or a block), so the parser takes a
//! [`Mark`](super::cursor::Mark) at each line start and resets to it whenever a construct
//! turns out not to match. Anything that matches nothing is an ordinary paragraph.
//!
//! Errors go to the diagnostics sink. A failure sets `unwind`, after which every parse
//! function returns what it has so far.

use std::rc::Rc;

use super::{Cursor, Span, Token, TokenKind};
use crate::ast::{
    Block, Builtin, BuiltinKind, Condition, Conditional, DeclKind, Declaration, Finder,
    FinderKind, ImageFormat, ImageSettings, Key, Loop, Modifier, Node, NodeKind, Nodes,
    PathType, ScriptCall, Symbols, TokenLine, VarKind, Variable, DEFAULT_QUALITY,
};
use crate::errors::{Diagnostics, ErrorKind};

/// Which rules apply to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// Site pages.
    Page,
    /// Templates and partials: `%%` and `%N` slots are legal and declarations are soft.
    Support,
}

/// Everything the parser reports into or reads from.
pub struct ParseContext<'a> {
    pub diagnostics: &'a mut Diagnostics,
    pub symbols: &'a mut Symbols,
    /// Applied to every `%{image ...}` finder; zero fields are unset.
    pub image_defaults: ImageSettings,
}

/// Parses a token stream into a node sequence. Never fails: problems are reported into
/// the context's diagnostics and the tree built so far is returned.
pub fn parse(tokens: Vec<Token<'_>>, grammar: Grammar, context: ParseContext<'_>) -> Vec<Node> {
    let mut parser = Parser {
        cursor: Cursor::new(tokens),
        support: grammar == Grammar::Support,
        context,
        depth: 0,
        unwind: false,
    };
    parser.parse_block(false, parser.support)
}

struct Parser<'src, 'ctx> {
    cursor: Cursor<'src>,
    support: bool,
    context: ParseContext<'ctx>,
    /// Nesting of `{ ... }` blocks. Inside one, a `}` ends a line.
    depth: usize,
    unwind: bool,
}

impl<'src, 'ctx> Parser<'src, 'ctx> {
    // ========================================================================
    // LINES
    // ========================================================================

    fn parse_block(&mut self, nested: bool, support: bool) -> Vec<Node> {
        if nested {
            self.depth += 1;
        }
        let mut nodes: Vec<Node> = Vec::new();

        while !self.unwind {
            let line = self.cursor.mark();
            let token = self.cursor.next();

            match token.kind {
                TokenKind::Eof => break,
                TokenKind::BraceClose if nested => break,
                TokenKind::BraceClose => {
                    self.context
                        .diagnostics
                        .warn(ErrorKind::UnbalancedBrace, token.span);
                    continue;
                }
                TokenKind::Newline => {
                    if self
                        .cursor
                        .before_previous()
                        .map_or(false, |t| t.kind == TokenKind::Newline)
                    {
                        nodes.push(Node::new(NodeKind::Blank, token.span));
                    }
                    continue;
                }
                TokenKind::Whitespace => continue,
                _ => {}
            }

            if token.kind.is_token_capable() {
                if let Some(node) = self.parse_token_line(token, support) {
                    nodes.push(node);
                    continue;
                }
                self.cursor.reset(line);
                self.cursor.next();
            }

            let parsed = match token.kind {
                TokenKind::ForwardSlash if self.cursor.peek_kind() == TokenKind::Whitespace => {
                    self.skip_comment();
                    continue;
                }
                TokenKind::Dollar => self.parse_script(token, support),
                TokenKind::Tilde => self.parse_import(token, support),
                TokenKind::Ampersand | TokenKind::AngleClose | TokenKind::Multiply => {
                    self.parse_builtin(token)
                }
                TokenKind::Asterisk
                    if token.text == "*" && self.cursor.peek_kind().is_name() =>
                {
                    self.parse_builtin(token)
                }
                TokenKind::Word | TokenKind::Ident => {
                    self.parse_word_line(token, &nodes, support)
                }
                TokenKind::BraceOpen
                    if matches!(
                        self.cursor.peek_kind(),
                        TokenKind::Whitespace | TokenKind::Newline
                    ) =>
                {
                    let children = self.parse_block(true, support);
                    Some(self.block_node(None, children, token.span))
                }
                TokenKind::BraceOpen | TokenKind::BracketOpen => {
                    self.parse_bracket_declaration(token, support)
                }
                _ => None,
            };

            match parsed {
                Some(node) => nodes.push(node),
                None if self.unwind => break,
                None => {
                    self.cursor.reset(line);
                    nodes.push(self.parse_line(support));
                }
            }
        }

        if nested {
            self.depth -= 1;
        }
        nodes
    }

    fn parse_line(&mut self, support: bool) -> Node {
        let first = self.cursor.peek();
        let children: Nodes = self.parse_paragraph(support, &[]).into();
        let span = self.span_from(first.span);
        if first.kind == TokenKind::AngleOpen {
            Node::new(NodeKind::Html(children), span)
        } else {
            Node::new(NodeKind::Paragraph(children), span)
        }
    }

    /// `## Heading`, `- item`, `. passthrough`: a punctuation run, whitespace, content.
    fn parse_token_line(&mut self, token: Token<'src>, support: bool) -> Option<Node> {
        let text = self.token_run(token);
        if !matches!(
            self.cursor.peek_kind(),
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::Eof
        ) {
            return None;
        }
        self.cursor.skip_whitespace();
        let key = self.context.symbols.intern(&text);
        let children = self.parse_paragraph(support, &[]).into();
        Some(Node::new(
            NodeKind::Token(TokenLine {
                key,
                text: text.into(),
                children,
            }),
            self.span_from(token.span),
        ))
    }

    /// The full punctuation run starting at `token`. Lexer runs arrive whole; single-rune
    /// kinds (`==`, `!!`) are joined here.
    fn token_run(&mut self, token: Token<'src>) -> String {
        let mut text = token.text.to_string();
        if matches!(token.kind, TokenKind::NonWord | TokenKind::Asterisk) {
            return text;
        }
        while self.cursor.peek_kind() == token.kind {
            text.push_str(self.cursor.next().text);
        }
        text
    }

    /// Skips a `/ comment` line, or a whole brace-balanced comment block.
    fn skip_comment(&mut self) {
        self.cursor.skip_whitespace();
        let mut depth = 0i32;
        let mut escaped = false;
        let mut passed_newline = false;

        loop {
            let token = self.cursor.peek();
            match token.kind {
                TokenKind::Eof => return,
                TokenKind::Escape => {
                    escaped = true;
                    self.cursor.next();
                    continue;
                }
                TokenKind::Newline => passed_newline = true,
                TokenKind::BraceOpen if !escaped => depth += 1,
                TokenKind::BraceClose => {
                    if !escaped {
                        depth -= 1;
                    }
                    passed_newline = false;
                }
                _ => {}
            }
            if passed_newline && depth <= 0 {
                return;
            }
            self.cursor.next();
            escaped = false;
        }
    }

    // ========================================================================
    // BUILTINS AND SCRIPTS
    // ========================================================================

    fn parse_script(&mut self, token: Token<'src>, support: bool) -> Option<Node> {
        self.cursor.skip_whitespace();
        let name = self.cursor.next();
        if !name.kind.is_name() {
            self.fail(ErrorKind::MalformedScriptCall, token.span);
            return None;
        }
        self.cursor.skip_whitespace();
        let args = self.parse_paragraph(support, &[]).into();
        Some(Node::new(
            NodeKind::Script(ScriptCall {
                name: name.text.into(),
                args,
            }),
            self.span_from(token.span),
        ))
    }

    /// `~ target [alias]`
    fn parse_import(&mut self, token: Token<'src>, support: bool) -> Option<Node> {
        self.cursor.skip_whitespace();
        let path: Nodes = self
            .parse_paragraph(support, &[TokenKind::Whitespace])
            .into();
        if path.is_empty() {
            self.fail(ErrorKind::MalformedImport, token.span);
            return None;
        }

        let mut alias = String::from("import");
        if !self.paragraph_ended_line() {
            self.cursor.skip_whitespace();
            if self.cursor.peek_kind().is_name() {
                alias = self.parse_name().0;
            }
            self.cursor.skip_whitespace();
            if !self.at_line_end() {
                self.fail(ErrorKind::MalformedImport, token.span);
                return None;
            }
        }

        Some(Node::new(
            NodeKind::Builtin(Builtin {
                kind: BuiltinKind::Import,
                name: self.context.symbols.intern(&alias),
                raw_name: alias.into(),
                path,
            }),
            self.span_from(token.span),
        ))
    }

    /// `& template`, `> partial`, `*name` and `× name`. Must stand alone on their line.
    fn parse_builtin(&mut self, token: Token<'src>) -> Option<Node> {
        let kind = match token.kind {
            TokenKind::Ampersand => BuiltinKind::Template,
            TokenKind::AngleClose => BuiltinKind::Partial,
            _ => BuiltinKind::ScopeUnset,
        };

        self.cursor.skip_whitespace();
        if !self.cursor.peek_kind().is_name() {
            self.ambiguous(token);
            return None;
        }
        let (name, _) = self.parse_name();
        self.cursor.skip_whitespace();
        if !self.at_line_end() {
            self.ambiguous(token);
            return None;
        }

        Some(Node::new(
            NodeKind::Builtin(Builtin {
                kind,
                name: self.context.symbols.intern(&name),
                raw_name: name.into(),
                path: crate::ast::empty_nodes(),
            }),
            self.span_from(token.span),
        ))
    }

    fn ambiguous(&mut self, token: Token<'src>) {
        self.context.diagnostics.warn(
            ErrorKind::AmbiguousToken {
                token: token.text.to_string(),
            },
            token.span,
        );
    }

    // ========================================================================
    // WORD-LED LINES: control flow, declarations, blocks
    // ========================================================================

    fn parse_word_line(
        &mut self,
        token: Token<'src>,
        prior: &[Node],
        support: bool,
    ) -> Option<Node> {
        match token.text {
            "if" => return self.parse_if(token, support),
            "else" => return self.parse_else(token, prior, support),
            "for" => return self.parse_for(token, support),
            _ => {}
        }

        self.cursor.step_back();
        let (name, _) = self.parse_name();
        let key = self.context.symbols.intern(&name);
        let next = self.cursor.peek_past_whitespace();

        match next.kind {
            TokenKind::Word if next.text == "raw" => {
                self.cursor.skip_whitespace();
                self.cursor.next();
                if self.cursor.peek_past_whitespace().kind != TokenKind::BraceOpen {
                    return None;
                }
                self.cursor.skip_whitespace();
                let open = self.cursor.next();
                let raw = self.parse_raw();
                let raw = Node::new(NodeKind::Raw(raw.into()), self.span_from(open.span));
                Some(self.block_node(Some(key), vec![raw], token.span))
            }
            TokenKind::BraceOpen => {
                self.cursor.skip_whitespace();
                self.cursor.next();
                let children = self.parse_block(true, support);
                Some(self.block_node(Some(key), children, token.span))
            }
            TokenKind::Colon => {
                self.cursor.skip_whitespace();
                self.cursor.next();
                self.cursor.skip_whitespace();
                if self.cursor.eat(TokenKind::Equals).is_none() {
                    return None;
                }
                Some(self.finish_declaration(key, DeclKind::Value, true, support, false, token))
            }
            TokenKind::Equals => {
                self.cursor.skip_whitespace();
                self.cursor.next();
                Some(self.finish_declaration(key, DeclKind::Value, false, support, false, token))
            }
            _ => None,
        }
    }

    /// Reads the value after `=` and builds the declaration.
    fn finish_declaration(
        &mut self,
        key: Key,
        kind: DeclKind,
        immediate: bool,
        support: bool,
        bracketed: bool,
        start: Token<'src>,
    ) -> Node {
        self.cursor.skip_whitespace();
        let value_support = support || bracketed;
        let children: Vec<Node> = match self.cursor.peek_kind() {
            k if k.is_name() => {
                let mark = self.cursor.mark();
                let name = self.cursor.next();
                self.cursor.skip_whitespace();
                if self.cursor.peek_kind() == TokenKind::BraceOpen {
                    self.cursor.next();
                    let name_key = self.context.symbols.intern(name.text);
                    let inner = self.parse_block(true, value_support);
                    vec![self.block_node(Some(name_key), inner, name.span)]
                } else {
                    self.cursor.reset(mark);
                    self.parse_paragraph(value_support, &[])
                }
            }
            TokenKind::BraceOpen if bracketed => {
                self.cursor.next();
                self.parse_block(true, value_support)
            }
            _ => self.parse_paragraph(value_support, &[]),
        };

        let span = self.span_from(start.span);
        Node::new(
            NodeKind::Declaration(Rc::new(Declaration {
                key,
                kind,
                soft: support,
                immediate,
                span,
                children: children.into(),
            })),
            span,
        )
    }

    /// `[name] = ...` declares a block template, `[#] = ...` a token template and
    /// `{#} = ...` the group wrapper for consecutive `#` lines.
    fn parse_bracket_declaration(&mut self, token: Token<'src>, support: bool) -> Option<Node> {
        let is_brace = token.kind == TokenKind::BraceOpen;
        let inner = self.cursor.next();

        let declared = if inner.kind.is_token_capable() {
            Some((DeclKind::Token, self.token_run(inner)))
        } else if !is_brace && inner.kind.is_name() {
            self.cursor.step_back();
            Some((DeclKind::Block, self.parse_name().0))
        } else {
            None
        };

        if !matches!(
            self.cursor.next().kind,
            TokenKind::BracketClose | TokenKind::BraceClose
        ) {
            return None;
        }
        self.cursor.skip_whitespace();
        if self.cursor.eat(TokenKind::Equals).is_none() {
            return None;
        }

        let Some((kind, name)) = declared else {
            let expected = if is_brace {
                "token character"
            } else {
                "block template"
            };
            self.fail(
                ErrorKind::BadDeclaration {
                    found: inner.text.to_string(),
                    expected: expected.into(),
                },
                token.span.to(inner.span),
            );
            return None;
        };

        let mut key = self.context.symbols.intern(&name);
        if is_brace {
            key = key.group();
            self.context.symbols.insert(key, &format!("{{{name}}}"));
        }
        Some(self.finish_declaration(key, kind, false, support, true, token))
    }

    fn parse_if(&mut self, token: Token<'src>, support: bool) -> Option<Node> {
        let conditions = self.parse_conditions()?;
        let body = self.parse_control_body(support)?;
        Some(Node::new(
            NodeKind::If(Conditional {
                conditions: conditions.into(),
                negated: false,
                body,
            }),
            self.span_from(token.span),
        ))
    }

    fn parse_else(&mut self, token: Token<'src>, prior: &[Node], support: bool) -> Option<Node> {
        let body = self.parse_control_body(support)?;
        let previous = prior
            .iter()
            .rev()
            .find(|node| !matches!(node.kind, NodeKind::Blank));
        let Some(NodeKind::If(previous)) = previous.map(|node| &node.kind) else {
            self.fail(ErrorKind::ElseWithoutIf, token.span);
            return None;
        };
        Some(Node::new(
            NodeKind::If(Conditional {
                conditions: previous.conditions.clone(),
                negated: true,
                body,
            }),
            self.span_from(token.span),
        ))
    }

    fn parse_for(&mut self, token: Token<'src>, support: bool) -> Option<Node> {
        self.cursor.skip_whitespace();
        let percent = self.cursor.eat(TokenKind::Percent)?;
        let source = if self.cursor.peek_kind() == TokenKind::BraceOpen {
            self.cursor.next();
            self.parse_finder(percent, support)?
        } else {
            let var = self.parse_variable(support)?;
            Node::new(NodeKind::Variable(var), self.span_from(percent.span))
        };
        let body = self.parse_control_body(support)?;
        Some(Node::new(
            NodeKind::For(Loop {
                source: Box::new(source),
                body,
            }),
            self.span_from(token.span),
        ))
    }

    /// `!`, `+`, `|` and `%name` tests, up to the first token that is none of them.
    fn parse_conditions(&mut self) -> Option<Vec<Condition>> {
        let mut conditions = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            let condition = match self.cursor.peek_kind() {
                TokenKind::Bang => Condition::Not,
                TokenKind::Plus => Condition::And,
                TokenKind::Pipe => Condition::Or,
                TokenKind::Percent => {
                    self.cursor.next();
                    match self.parse_variable(false) {
                        Some(Variable {
                            kind: VarKind::Named(key),
                            ..
                        }) => {
                            conditions.push(Condition::Exists(key));
                            continue;
                        }
                        _ => return None,
                    }
                }
                _ => break,
            };
            self.cursor.next();
            conditions.push(condition);
        }

        conditions
            .iter()
            .any(|c| matches!(c, Condition::Exists(_)))
            .then_some(conditions)
    }

    /// `{ ... }` or `name { ... }` after a control keyword.
    fn parse_control_body(&mut self, support: bool) -> Option<Block> {
        self.cursor.skip_whitespace();
        let mut name = None;
        if self.cursor.peek_kind().is_name() {
            let (text, _) = self.parse_name();
            name = Some(self.context.symbols.intern(&text));
            self.cursor.skip_whitespace();
        }
        self.cursor.eat(TokenKind::BraceOpen)?;
        let children = self.parse_block(true, support);
        Some(Block {
            name,
            children: children.into(),
        })
    }

    // ========================================================================
    // PARAGRAPHS AND INLINE CONSTRUCTS
    // ========================================================================

    /// Reads inline content up to the end of the line (consumed) or an exit token (not
    /// consumed). Text is merged into as few nodes as possible.
    fn parse_paragraph(&mut self, support: bool, exits: &[TokenKind]) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut text = TextRun::default();

        while !self.unwind {
            let token = self.cursor.next();
            if token.kind.ends_line() {
                break;
            }
            if exits.contains(&token.kind) || (token.kind == TokenKind::BraceClose && self.depth > 0)
            {
                if token.kind == TokenKind::BraceClose {
                    text.trim_space();
                }
                self.cursor.step_back();
                break;
            }

            match token.kind {
                TokenKind::Whitespace => text.push_space(token.span),
                TokenKind::Escape => {
                    let escaped = self.cursor.peek();
                    if escaped.kind.ends_line() {
                        text.push(token.text, token.span);
                    } else {
                        self.cursor.next();
                        text.push(escaped.text, token.span.to(escaped.span));
                    }
                }
                TokenKind::Percent if self.cursor.peek_kind() == TokenKind::BraceOpen => {
                    self.cursor.next();
                    text.flush(&mut nodes);
                    if let Some(finder) = self.parse_finder(token, support) {
                        nodes.push(finder);
                    }
                }
                TokenKind::Percent => match self.parse_variable(support) {
                    Some(var) => {
                        text.flush(&mut nodes);
                        nodes.push(Node::new(NodeKind::Variable(var), self.span_from(token.span)));
                    }
                    None => text.push(token.text, token.span),
                },
                _ => text.push(token.text, token.span),
            }
        }

        text.flush(&mut nodes);
        nodes
    }

    /// After `%`: `%name[.sub]`, and in support files `%%` and `%N`, each with an
    /// optional `:modifier`.
    fn parse_variable(&mut self, support: bool) -> Option<Variable> {
        let next = self.cursor.peek();
        let kind = match next.kind {
            k if k.is_name() => {
                let (name, _) = self.parse_name();
                VarKind::Named(self.context.symbols.intern(&name))
            }
            TokenKind::Number if support => match next.text.parse::<u32>() {
                Ok(n) => {
                    self.cursor.next();
                    VarKind::Indexed(n)
                }
                Err(_) => {
                    self.context.diagnostics.warn(
                        ErrorKind::InvalidNumber {
                            text: next.text.to_string(),
                        },
                        next.span,
                    );
                    return None;
                }
            },
            TokenKind::Percent if support => {
                self.cursor.next();
                VarKind::Anonymous
            }
            _ => return None,
        };

        let mut modifier = Modifier::None;
        if self.cursor.peek_kind() == TokenKind::Colon {
            let mark = self.cursor.mark();
            self.cursor.next();
            let name = self.cursor.peek();
            if name.kind.is_name() {
                self.cursor.next();
                match Modifier::from_name(&name.text.to_lowercase()) {
                    Some(m) => modifier = m,
                    None => self.context.diagnostics.warn(
                        ErrorKind::UnknownModifier {
                            name: name.text.to_string(),
                        },
                        name.span,
                    ),
                }
            } else {
                self.cursor.reset(mark);
            }
        }

        Some(Variable { kind, modifier })
    }

    /// After `%{`: `[page|image|static] [:path-type] target [image settings] }`.
    fn parse_finder(&mut self, percent: Token<'src>, support: bool) -> Option<Node> {
        let mut kind = FinderKind::Any;
        let mut path_type = None;

        let word = self.cursor.peek();
        if word.kind == TokenKind::Word {
            let found = match word.text.to_lowercase().as_str() {
                "page" => Some(FinderKind::Page),
                "image" => Some(FinderKind::Image),
                "static" => Some(FinderKind::Static),
                _ => None,
            };
            if let Some(found) = found {
                let mark = self.cursor.mark();
                self.cursor.next();
                if matches!(
                    self.cursor.peek_kind(),
                    TokenKind::Whitespace | TokenKind::Colon
                ) {
                    kind = found;
                } else {
                    self.cursor.reset(mark);
                }
            }
        }

        if self.cursor.peek_kind() == TokenKind::Colon {
            let mark = self.cursor.mark();
            self.cursor.next();
            let name = self.cursor.peek();
            if name.kind.is_name() {
                self.cursor.next();
                path_type = PathType::from_name(&name.text.to_lowercase());
                if path_type.is_none() {
                    self.context.diagnostics.warn(
                        ErrorKind::UnknownPathType {
                            name: name.text.to_string(),
                        },
                        name.span,
                    );
                }
            } else {
                self.cursor.reset(mark);
            }
        }

        self.cursor.skip_whitespace();
        let target: Nodes = self
            .parse_paragraph(support, &[TokenKind::Whitespace, TokenKind::BraceClose])
            .into();
        if target.is_empty() {
            self.context
                .diagnostics
                .warn(ErrorKind::EmptyFinder, percent.span);
            self.cursor.eat(TokenKind::BraceClose);
            return None;
        }

        let mut image = None;
        if self.paragraph_ended_line() {
            self.context
                .diagnostics
                .warn(ErrorKind::UnterminatedFinder, percent.span);
        } else {
            self.cursor.skip_whitespace();
            if self.cursor.eat(TokenKind::BraceClose).is_some() {
                if kind == FinderKind::Image {
                    image = self.image_defaults();
                }
            } else {
                if matches!(kind, FinderKind::Image | FinderKind::Any) {
                    image = self.parse_image_settings(kind);
                    if self.unwind {
                        return None;
                    }
                }
                self.cursor.skip_whitespace();
                if self.cursor.eat(TokenKind::BraceClose).is_none() {
                    self.context
                        .diagnostics
                        .warn(ErrorKind::UnterminatedFinder, percent.span);
                }
            }
        }

        Some(Node::new(
            NodeKind::Finder(Finder {
                kind,
                path_type,
                target,
                image,
            }),
            self.span_from(percent.span),
        ))
    }

    fn image_defaults(&self) -> Option<ImageSettings> {
        let defaults = self.context.image_defaults;
        let any = defaults.quality > 0 || defaults.max_size > 0 || defaults.format.is_some();
        any.then(|| ImageSettings {
            quality: if defaults.quality == 0 {
                DEFAULT_QUALITY
            } else {
                defaults.quality
            },
            ..defaults
        })
    }

    /// `1920x` sets the longest edge, a bare number the quality, a word the format.
    fn parse_image_settings(&mut self, kind: FinderKind) -> Option<ImageSettings> {
        let mut settings = self.context.image_defaults;
        let mut any = false;

        loop {
            self.cursor.skip_whitespace();
            let token = self.cursor.peek();
            if matches!(token.kind, TokenKind::Number | TokenKind::Word) {
                self.cursor.next();
            }
            match token.kind {
                TokenKind::Number => {
                    let Ok(n) = token.text.parse::<u32>() else {
                        self.fail(
                            ErrorKind::InvalidNumber {
                                text: token.text.to_string(),
                            },
                            token.span,
                        );
                        return None;
                    };
                    if self.cursor.peek_kind() == TokenKind::Word {
                        settings.max_size = n;
                    } else {
                        settings.quality = n;
                    }
                    any = true;
                }
                TokenKind::Word if token.text.starts_with('x') => any = true,
                TokenKind::Word => match ImageFormat::from_name(token.text) {
                    Some(format) => {
                        settings.format = Some(format);
                        any = true;
                    }
                    None => {
                        self.fail(
                            ErrorKind::UnsupportedImageFormat {
                                format: token.text.to_string(),
                            },
                            token.span,
                        );
                        return None;
                    }
                },
                _ => break,
            }
        }

        if !any {
            return match kind {
                FinderKind::Image => self.image_defaults(),
                _ => None,
            };
        }
        if settings.quality == 0 {
            settings.quality = DEFAULT_QUALITY;
        }
        Some(settings)
    }

    /// The body of `raw { ... }`: HTML-escaped, brace balanced, then re-indented.
    fn parse_raw(&mut self) -> String {
        let mut buffer = String::new();
        let mut balance = 1;
        let mut escaped = false;

        loop {
            let token = self.cursor.next();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Escape if !escaped => {
                    escaped = true;
                    continue;
                }
                TokenKind::AngleOpen => buffer.push_str("&lt;"),
                TokenKind::AngleClose => buffer.push_str("&gt;"),
                TokenKind::Ampersand if self.cursor.peek_kind() != TokenKind::Word => {
                    buffer.push_str("&amp;")
                }
                TokenKind::BraceOpen => {
                    if !escaped {
                        balance += 1;
                    }
                    buffer.push('{');
                }
                TokenKind::BraceClose => {
                    if !escaped {
                        balance -= 1;
                        if balance == 0 {
                            break;
                        }
                    }
                    buffer.push('}');
                }
                _ => buffer.push_str(token.text),
            }
            escaped = false;
        }

        reindent(&buffer)
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// `name` or `name.sub`. The cursor must be on a name token.
    fn parse_name(&mut self) -> (String, Span) {
        let first = self.cursor.next();
        let mut name = first.text.to_string();
        if self.cursor.peek_kind() == TokenKind::Stop {
            let mark = self.cursor.mark();
            self.cursor.next();
            if self.cursor.peek_kind().is_name() {
                name.push('.');
                name.push_str(self.cursor.next().text);
            } else {
                self.cursor.reset(mark);
            }
        }
        (name, self.span_from(first.span))
    }

    fn block_node(&mut self, name: Option<Key>, children: Vec<Node>, start: Span) -> Node {
        Node::new(
            NodeKind::Block(Block {
                name,
                children: children.into(),
            }),
            self.span_from(start),
        )
    }

    /// From `start` to the end of the last consumed token.
    fn span_from(&self, start: Span) -> Span {
        match self.cursor.previous() {
            Some(last) if last.span.end >= start.start => start.to(last.span),
            _ => start,
        }
    }

    /// Whether the last paragraph read consumed its line ending.
    fn paragraph_ended_line(&self) -> bool {
        self.cursor.at_end()
            || self
                .cursor
                .previous()
                .map_or(true, |t| t.kind == TokenKind::Newline)
    }

    /// At a newline, the end of input, or the `}` closing a one-line block.
    fn at_line_end(&self) -> bool {
        let kind = self.cursor.peek_kind();
        kind.ends_line() || (kind == TokenKind::BraceClose && self.depth > 0)
    }

    fn fail(&mut self, kind: ErrorKind, span: Span) {
        self.context.diagnostics.fail(kind, span);
        self.unwind = true;
    }
}

/// Accumulates adjacent text tokens into one `Text` node.
#[derive(Default)]
struct TextRun {
    text: String,
    span: Option<Span>,
    /// Set when the last push was a collapsed whitespace run: the span before it.
    spaced: Option<Span>,
}

impl TextRun {
    fn push(&mut self, text: &str, span: Span) {
        self.text.push_str(text);
        self.spaced = None;
        self.span = Some(match self.span {
            Some(start) => start.to(span),
            None => span,
        });
    }

    fn push_space(&mut self, span: Span) {
        let start = self.span;
        self.push(" ", span);
        self.spaced = start.or(Some(span));
    }

    /// Drops a trailing whitespace run, such as the one before a one-line block's `}`.
    fn trim_space(&mut self) {
        let Some(before) = self.spaced.take() else {
            return;
        };
        self.text.pop();
        self.span = if self.text.is_empty() {
            None
        } else {
            Some(before)
        };
    }

    fn flush(&mut self, nodes: &mut Vec<Node>) {
        self.spaced = None;
        if let Some(span) = self.span.take() {
            nodes.push(Node::text(std::mem::take(&mut self.text), span));
        }
    }
}

/// Converts tabs to four spaces, removes the smallest indent shared by all non-blank
/// lines and trims blank lines from both ends.
pub fn reindent(text: &str) -> String {
    let text = text.replace('\t', "    ");
    let lines: Vec<&str> = text.split('\n').collect();
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);

    let stripped: Vec<&str> = lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[indent..]
            }
        })
        .collect();
    stripped.join("\n").trim_matches('\n').to_string()
}
