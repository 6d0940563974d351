//! Justification Forest and Equality Explanations.
//!
//! The forest is a parent-labelled structure kept strictly apart from the
//! compressed union-find: each merge adds exactly one edge (re-orienting one
//! endpoint's path so the forest stays a forest), and path compression never
//! touches it. Explaining an equality walks both endpoints to their common
//! forest ancestor, collecting edge labels:
//!
//! - `Asserted` edges contribute their caller-supplied reason,
//! - `Definition` edges (internal extraction/term bindings) contribute
//!   nothing,
//! - `ParentsEqual(a, b)` edges are expanded recursively into the reasons
//!   for the equality of the two wider slices `a` and `b` that induced the
//!   merge. The referenced slices are strictly wider than the edge's own
//!   endpoints, so the expansion terminates.

use crate::engine::SliceEngine;
use crate::ids::{Reason, SliceId};
use crate::node::{Justification, ProofEdge};
use crate::trail::UndoOp;
use rustc_hash::FxHashSet;

impl SliceEngine {
    /// Install the forest edge for a merge of `x` and `y`.
    ///
    /// `x`'s path to its forest root is reversed (every relabelled node is
    /// logged for rollback), then `x` is hung below `y` under `just`.
    pub(crate) fn add_proof_edge(&mut self, x: SliceId, y: SliceId, just: Justification) {
        let mut node = x;
        let mut edge = ProofEdge {
            to: y,
            justification: just,
        };
        loop {
            let old = self.node(node).proof;
            self.trail.push(UndoOp::Relabel { slice: node, prev: old });
            self.node_mut(node).proof = Some(edge);
            match old {
                None => break,
                Some(prev) => {
                    edge = ProofEdge {
                        to: node,
                        justification: prev.justification,
                    };
                    node = prev.to;
                }
            }
        }
    }

    /// Reason tokens sufficient to derive `is_equal(x, y)`, sorted and
    /// deduplicated. The set contains no reasons unrelated to the queried
    /// pair; it is not guaranteed to be globally minimal.
    ///
    /// # Panics
    ///
    /// Panics if the two slices are not currently equal.
    #[must_use]
    pub fn explain_equal(&self, x: SliceId, y: SliceId) -> Vec<Reason> {
        assert!(self.is_equal(x, y), "explain_equal on unequal slices");
        let mut out = Vec::new();
        self.explain_pair(x, y, &mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn explain_pair(&self, x: SliceId, y: SliceId, out: &mut Vec<Reason>) {
        if x == y {
            return;
        }
        // a redundant caller merge of exactly this pair is the shortest
        // available derivation
        let key = if x <= y { (x, y) } else { (y, x) };
        if let Some(&r) = self.shortcuts.get(&key) {
            out.push(r);
            return;
        }
        if self.find(x) == self.find(y) {
            self.explain_forest_path(x, y, out);
            return;
        }
        // structurally equal: corresponding base slices are pairwise equal
        let bx = self.base_slices(x);
        let by = self.base_slices(y);
        debug_assert_eq!(bx.len(), by.len());
        for (&a, &b) in bx.iter().zip(by.iter()) {
            self.explain_pair(a, b, out);
        }
    }

    fn explain_forest_path(&self, x: SliceId, y: SliceId, out: &mut Vec<Reason>) {
        let mut on_x_path = FxHashSet::default();
        let mut cur = x;
        on_x_path.insert(cur);
        while let Some(edge) = self.node(cur).proof {
            cur = edge.to;
            on_x_path.insert(cur);
        }
        let mut common = y;
        while !on_x_path.contains(&common) {
            let edge = self
                .node(common)
                .proof
                .expect("equal slices share a forest tree");
            common = edge.to;
        }
        let mut cur = x;
        while cur != common {
            let edge = self.node(cur).proof.expect("common lies on x's path");
            self.explain_edge(edge.justification, out);
            cur = edge.to;
        }
        let mut cur = y;
        while cur != common {
            let edge = self.node(cur).proof.expect("common lies on y's path");
            self.explain_edge(edge.justification, out);
            cur = edge.to;
        }
    }

    fn explain_edge(&self, just: Justification, out: &mut Vec<Reason>) {
        match just {
            Justification::Asserted(r) => out.push(r),
            Justification::Definition => {}
            Justification::ParentsEqual(a, b) => self.explain_pair(a, b, out),
        }
    }
}
