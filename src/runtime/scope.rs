//! The scope stack and the anonymous-substitution stack.
//!
//! Scope frames map keys to declarations and are searched innermost first. A `Reject`
//! declaration hides every outer declaration of its key without removing it. Frames are
//! only opened when the content entered can declare something, so callers pass the
//! pre-counted number of declarations and hand the returned [`Frame`] back to `close`.
//!
//! The anonymous stack holds the content that `%%` and `%N` slots resolve against. An
//! entry lives until its wrapper has consumed all of its slots.

use std::cell::Cell;
use std::rc::Rc;

use crate::ast::{DeclKind, Declaration, Key, Nodes};
use crate::syntax::Span;

/// Proof that [`ScopeStack::open`] pushed (or skipped) a frame.
#[must_use]
#[derive(Debug)]
pub struct Frame(bool);

#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<Vec<Rc<Declaration>>>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    /// A stack with a single root frame.
    pub fn new() -> Self {
        Self {
            frames: vec![Vec::with_capacity(16)],
        }
    }

    /// Pushes a frame sized for `capacity` declarations, unless `capacity` is zero.
    pub fn open(&mut self, capacity: usize) -> Frame {
        if capacity == 0 {
            return Frame(false);
        }
        self.frames.push(Vec::with_capacity(capacity));
        Frame(true)
    }

    /// Pushes a frame regardless of any pre-count.
    pub fn open_always(&mut self) -> Frame {
        self.frames.push(Vec::new());
        Frame(true)
    }

    pub fn close(&mut self, frame: Frame) {
        if frame.0 && self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Binds `decl` in the innermost frame, replacing a same-key binding in that frame.
    /// A soft declaration yields to any visible non-soft one.
    pub fn declare(&mut self, decl: Rc<Declaration>) {
        if decl.soft {
            if let Some(existing) = self.lookup(decl.key) {
                if !existing.soft {
                    return;
                }
            }
        }
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        match frame.iter_mut().find(|d| d.key == decl.key) {
            Some(slot) => *slot = decl,
            None => frame.push(decl),
        }
    }

    /// Hides `key` from this point on, for the lifetime of the innermost frame.
    pub fn reject(&mut self, key: Key, span: Span) {
        self.declare(Rc::new(Declaration::reject(key, span)));
    }

    /// The innermost visible declaration of `key`.
    pub fn lookup(&self, key: Key) -> Option<Rc<Declaration>> {
        if key.is_none() {
            return None;
        }
        for frame in self.frames.iter().rev() {
            if let Some(decl) = frame.iter().rev().find(|d| d.key == key) {
                if decl.kind == DeclKind::Reject {
                    return None;
                }
                return Some(Rc::clone(decl));
            }
        }
        None
    }

    /// Like [`lookup`](Self::lookup), restricted to one declaration kind.
    pub fn lookup_kind(&self, key: Key, kind: DeclKind) -> Option<Rc<Declaration>> {
        self.lookup(key).filter(|decl| decl.kind == kind)
    }

    pub fn contains(&self, key: Key) -> bool {
        self.lookup(key).is_some()
    }
}

// ============================================================================
// ANONYMOUS SUBSTITUTION
// ============================================================================

/// What `%%` expands to.
#[derive(Debug, Clone)]
pub enum AnonContent {
    /// Caller content, rendered on every use.
    Nodes(Nodes),
    /// Already rendered text, such as a token group or a loop accumulation.
    Text(Rc<str>),
}

#[derive(Debug)]
pub struct AnonEntry {
    remaining: Cell<usize>,
    pub content: AnonContent,
    pub span: Span,
}

#[derive(Debug, Default)]
pub struct AnonStack {
    entries: Vec<Rc<AnonEntry>>,
}

impl AnonStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes content for a wrapper with `slots` anonymous variables. Returns the stack
    /// depth to [`truncate`](Self::truncate) to once the wrapper is rendered.
    pub fn push(&mut self, slots: usize, content: AnonContent, span: Span) -> usize {
        let depth = self.entries.len();
        self.entries.push(Rc::new(AnonEntry {
            remaining: Cell::new(slots),
            content,
            span,
        }));
        depth
    }

    pub fn top(&self) -> Option<Rc<AnonEntry>> {
        self.entries.last().cloned()
    }

    pub fn truncate(&mut self, depth: usize) {
        self.entries.truncate(depth);
    }

    /// Consumes one slot of `entry`. Returns whether `entry` was on top and has slots
    /// left; in that case it was popped so its content can render against the entries
    /// below it, and the caller must [`restore`](Self::restore) it afterwards.
    pub fn consume(&mut self, entry: &Rc<AnonEntry>) -> bool {
        let on_top = self
            .entries
            .last()
            .map_or(false, |top| Rc::ptr_eq(top, entry));
        if !on_top {
            return false;
        }
        self.entries.pop();
        let remaining = entry.remaining.get().saturating_sub(1);
        entry.remaining.set(remaining);
        remaining > 0
    }

    pub fn restore(&mut self, entry: Rc<AnonEntry>) {
        self.entries.push(entry);
    }
}

#[cfg(test)]
mod scope_tests {
    use super::*;
    use crate::ast::{Declaration, NodeKind};

    fn value(key: &str, soft: bool) -> Rc<Declaration> {
        let mut decl = Declaration::text(Key::of(key), key, Span::default());
        decl.soft = soft;
        Rc::new(decl)
    }

    #[test]
    fn inner_frames_shadow_and_close() {
        let mut scope = ScopeStack::new();
        scope.declare(value("a", false));
        let frame = scope.open(1);
        scope.declare(Rc::new(Declaration::text(Key::of("a"), "inner", Span::default())));
        let inner = scope.lookup(Key::of("a")).unwrap();
        assert!(matches!(&inner.children[0].kind, NodeKind::Text(t) if &**t == "inner"));
        scope.close(frame);
        assert!(scope.contains(Key::of("a")));
        assert_eq!(scope.frames.len(), 1);
    }

    #[test]
    fn reject_hides_outer_declarations() {
        let mut scope = ScopeStack::new();
        scope.declare(value("a", false));
        let frame = scope.open(2);
        scope.reject(Key::of("a"), Span::default());
        assert!(!scope.contains(Key::of("a")));
        scope.close(frame);
        assert!(scope.contains(Key::of("a")));
    }

    #[test]
    fn soft_declarations_yield() {
        let mut scope = ScopeStack::new();
        scope.declare(value("a", false));
        scope.declare(value("a", true));
        assert!(!scope.lookup(Key::of("a")).unwrap().soft);
    }

    #[test]
    fn zero_capacity_frames_are_skipped() {
        let mut scope = ScopeStack::new();
        let frame = scope.open(0);
        assert_eq!(scope.frames.len(), 1);
        scope.close(frame);
        assert_eq!(scope.frames.len(), 1);
    }

    #[test]
    fn anon_entries_pop_when_exhausted() {
        let mut anon = AnonStack::new();
        let depth = anon.push(2, AnonContent::Text("x".into()), Span::default());
        let entry = anon.top().unwrap();

        assert!(anon.consume(&entry));
        anon.restore(Rc::clone(&entry));
        assert!(!anon.consume(&entry));
        assert!(anon.top().is_none());
        assert!(!anon.consume(&entry));
        anon.truncate(depth);
    }
}
