//! Term/Slice Bridge Storage.
//!
//! Derived expressions (extractions of variables, concatenations of terms)
//! are hash-consed here so that syntactically identical terms share one
//! [`TermId`], and resolution of a term to its slice node is memoized so
//! repeated resolution yields the same slice. The actual resolution logic
//! lives on the engine; this module only owns the tables.

use crate::ids::{SliceId, TermId, VarId};
use rustc_hash::FxHashMap;

/// Structure of a derived term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TermKind {
    /// Bits `[hi:lo]` of a declared variable.
    Extract { var: VarId, hi: u32, lo: u32 },
    /// Concatenation of two terms, most significant first.
    Concat { hi: TermId, lo: TermId },
}

#[derive(Debug, Clone)]
pub(crate) struct TermNode {
    pub width: u32,
    pub kind: TermKind,
}

/// Hash-consed term arena plus the term-to-slice memo.
#[derive(Debug, Default)]
pub(crate) struct TermTable {
    nodes: Vec<TermNode>,
    cache: FxHashMap<TermKind, TermId>,
    slice_memo: FxHashMap<TermId, SliceId>,
}

impl TermTable {
    /// Intern a term; returns the id and whether it was freshly created.
    pub fn intern(&mut self, width: u32, kind: TermKind) -> (TermId, bool) {
        if let Some(&t) = self.cache.get(&kind) {
            return (t, false);
        }
        let t = TermId::new(self.nodes.len() as u32);
        self.nodes.push(TermNode { width, kind });
        self.cache.insert(kind, t);
        (t, true)
    }

    pub fn node(&self, t: TermId) -> &TermNode {
        &self.nodes[t.index()]
    }

    pub fn resolved(&self, t: TermId) -> Option<SliceId> {
        self.slice_memo.get(&t).copied()
    }

    pub fn memoize(&mut self, t: TermId, s: SliceId) {
        let prev = self.slice_memo.insert(t, s);
        debug_assert!(prev.is_none(), "term resolved twice");
    }

    pub fn forget(&mut self, t: TermId) {
        self.slice_memo.remove(&t);
    }

    /// Drop the most recently interned term (rollback only).
    pub fn pop(&mut self) {
        let node = self.nodes.pop().expect("term trail out of sync");
        self.cache.remove(&node.kind);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}
