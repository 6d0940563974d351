//! Slicing Engine.
//!
//! Core implementation of the bit-range equality engine:
//! - lazy slice tree: variables decompose into aligned sub-ranges on demand
//! - equivalence closure: union-by-rank with logged path compression
//! - congruence propagation: merges cascade into aligned base slices, and
//!   splits are applied symmetrically across an equivalence class
//! - term bridge: extractions and concatenations as first-class handles
//! - undo trail: checkpoint/rollback for the enclosing backtracking search
//!
//! The engine is single-threaded and synchronous; callers hold opaque ids
//! only. Contract violations (malformed ranges, zero widths, foreign ids)
//! panic before any mutation; the only expected-false outcome is a `merge`
//! whose sides differ in total width.

use crate::ids::{Mark, Reason, SliceId, TermId, VarId};
use crate::node::{Cut, Justification, SliceKind, SliceNode};
use crate::term::{TermKind, TermTable};
use crate::trail::{Trail, UndoOp};
use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::trace;

/// Operation counters, diagnostics only (not restored by rollback).
#[derive(Debug, Clone, Default)]
pub struct SliceStats {
    /// Class unions performed, including cascaded congruence merges.
    pub merges: usize,
    /// Merge requests whose sides were already equal.
    pub redundant_merges: usize,
    /// Merge requests rejected for mismatched total width.
    pub rejected_merges: usize,
    /// Leaf splits performed, including class-symmetric ones.
    pub splits: usize,
    /// Rollbacks executed.
    pub rollbacks: usize,
}

/// The bit-vector slicing engine.
///
/// See the crate-level documentation for an overview and an example.
#[derive(Debug, Default)]
pub struct SliceEngine {
    pub(crate) slices: Vec<SliceNode>,
    pub(crate) var_slices: Vec<SliceId>,
    pub(crate) terms: TermTable,
    pub(crate) extract_vars: FxHashMap<(VarId, u32, u32), VarId>,
    pub(crate) shortcuts: FxHashMap<(SliceId, SliceId), Reason>,
    pub(crate) trail: Trail,
    pub(crate) scopes: Vec<Mark>,
    pub(crate) stats: SliceStats,
}

impl SliceEngine {
    /// Create an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn node(&self, s: SliceId) -> &SliceNode {
        &self.slices[s.index()]
    }

    pub(crate) fn node_mut(&mut self, s: SliceId) -> &mut SliceNode {
        &mut self.slices[s.index()]
    }

    fn new_slice(&mut self, width: u32, kind: SliceKind) -> SliceId {
        let id = SliceId::new(self.slices.len() as u32);
        self.slices.push(SliceNode::new(id, width, kind));
        self.trail.push(UndoOp::NewSlice);
        id
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Declare a fresh bit-vector variable and its root slice.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero.
    pub fn add_var(&mut self, width: u32) -> VarId {
        assert!(width > 0, "zero-width variable");
        let var = VarId::new(self.var_slices.len() as u32);
        let slice = self.new_slice(width, SliceKind::Var(var));
        self.var_slices.push(slice);
        self.trail.push(UndoOp::NewVar);
        var
    }

    /// Root slice of a declared variable.
    #[must_use]
    pub fn var_slice(&self, var: VarId) -> SliceId {
        self.var_slices[var.index()]
    }

    /// Bit-width of a slice.
    #[must_use]
    pub fn width(&self, s: SliceId) -> u32 {
        self.node(s).width
    }

    /// Number of declared variables.
    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.var_slices.len()
    }

    /// Number of slice nodes allocated.
    #[must_use]
    pub fn num_slices(&self) -> usize {
        self.slices.len()
    }

    /// Number of interned terms.
    #[must_use]
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Operation counters.
    #[must_use]
    pub fn stats(&self) -> &SliceStats {
        &self.stats
    }

    // ------------------------------------------------------------------
    // Equivalence closure
    // ------------------------------------------------------------------

    /// Read-only root walk; queries never mutate the union-find.
    pub(crate) fn find(&self, s: SliceId) -> SliceId {
        let mut cur = s;
        loop {
            let p = self.node(cur).parent;
            if p == cur {
                return cur;
            }
            cur = p;
        }
    }

    /// Compressing find used on mutating paths; every redirected pointer is
    /// logged so rollback restores the exact pre-merge shape.
    fn find_compress(&mut self, s: SliceId) -> SliceId {
        let root = self.find(s);
        let mut cur = s;
        while cur != root {
            let p = self.node(cur).parent;
            if p != root {
                self.trail.push(UndoOp::Redirect { slice: cur, prev: p });
                self.node_mut(cur).parent = root;
            }
            cur = p;
        }
        root
    }

    /// Current representative of the slice's equivalence class.
    #[must_use]
    pub fn root_id(&self, s: SliceId) -> SliceId {
        self.find(s)
    }

    /// Are the two slices provably equal?
    ///
    /// True when they share a union-find root, or when they have equal width
    /// and their base decompositions coincide root-wise (congruence
    /// recognized structurally, without an explicit merge request).
    #[must_use]
    pub fn is_equal(&self, x: SliceId, y: SliceId) -> bool {
        if self.find(x) == self.find(y) {
            return true;
        }
        if self.node(x).width != self.node(y).width {
            return false;
        }
        let bx = self.base_slices(x);
        let by = self.base_slices(y);
        bx.len() == by.len()
            && bx
                .iter()
                .zip(by.iter())
                .all(|(&a, &b)| self.find(a) == self.find(b))
    }

    fn union(&mut self, rx: SliceId, ry: SliceId) {
        debug_assert_ne!(rx, ry);
        debug_assert_eq!(self.node(rx).parent, rx);
        debug_assert_eq!(self.node(ry).parent, ry);
        let (kept, absorbed, bump) = match self.node(rx).rank.cmp(&self.node(ry).rank) {
            Ordering::Less => (ry, rx, false),
            Ordering::Greater => (rx, ry, false),
            Ordering::Equal => (rx, ry, true),
        };
        self.node_mut(absorbed).parent = kept;
        if bump {
            self.node_mut(kept).rank += 1;
        }
        // splice the two class rings; the same swap undoes it
        let na = self.node(absorbed).next;
        let nk = self.node(kept).next;
        self.node_mut(absorbed).next = nk;
        self.node_mut(kept).next = na;
        self.trail.push(UndoOp::Union {
            absorbed,
            kept,
            rank_bumped: bump,
        });
        self.stats.merges += 1;
    }

    /// All members of the slice's equivalence class, starting at `s`.
    fn class_members(&self, s: SliceId) -> SmallVec<[SliceId; 8]> {
        let mut out = SmallVec::new();
        let mut cur = s;
        loop {
            out.push(cur);
            cur = self.node(cur).next;
            if cur == s {
                break;
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Slice tree
    // ------------------------------------------------------------------

    /// Finest current partition of the slice, most significant first.
    #[must_use]
    pub fn base_slices(&self, s: SliceId) -> SmallVec<[SliceId; 8]> {
        let mut out = SmallVec::new();
        self.collect_base(s, &mut out);
        out
    }

    fn collect_base(&self, s: SliceId, out: &mut SmallVec<[SliceId; 8]>) {
        match self.node(s).cut {
            Some(cut) => {
                self.collect_base(cut.hi, out);
                self.collect_base(cut.lo, out);
            }
            None => out.push(s),
        }
    }

    /// Decompose bits `[hi:lo]` of a slice, introducing boundaries at `lo`
    /// and `hi+1` as needed. Returns the coarsest existing nodes exactly
    /// tiling the range, most significant first; the full range returns the
    /// slice itself. Boundaries already present elsewhere are preserved.
    ///
    /// # Panics
    ///
    /// Panics if `hi < lo` or `hi >= width(s)`.
    pub fn mk_slice(&mut self, s: SliceId, hi: u32, lo: u32) -> SmallVec<[SliceId; 4]> {
        let w = self.width(s);
        assert!(
            hi >= lo && hi < w,
            "invalid range [{hi}:{lo}] of a {w}-bit slice"
        );
        let mut out = SmallVec::new();
        self.slice_range(s, hi, lo, &mut out);
        out
    }

    fn slice_range(&mut self, s: SliceId, hi: u32, lo: u32, out: &mut SmallVec<[SliceId; 4]>) {
        let w = self.width(s);
        debug_assert!(hi >= lo && hi < w);
        if hi == w - 1 && lo == 0 {
            out.push(s);
            return;
        }
        if self.node(s).is_leaf() {
            // one boundary per split; the recursion introduces the other
            let at = if lo > 0 { lo } else { hi + 1 };
            self.split_class(s, at);
        }
        let cut = self.node(s).cut.expect("split installed a cut");
        if lo >= cut.at {
            self.slice_range(cut.hi, hi - cut.at, lo - cut.at, out);
        } else if hi < cut.at {
            self.slice_range(cut.lo, hi, lo, out);
        } else {
            self.slice_range(cut.hi, hi - cut.at, 0, out);
            self.slice_range(cut.lo, cut.at - 1, lo, out);
        }
    }

    fn raw_split(&mut self, s: SliceId, at: u32) {
        debug_assert!(self.node(s).is_leaf());
        debug_assert!(at > 0 && at < self.width(s));
        let w = self.width(s);
        let hi = self.new_slice(w - at, SliceKind::SubHi(s));
        let lo = self.new_slice(at, SliceKind::SubLo(s));
        self.node_mut(s).cut = Some(Cut { at, hi, lo });
        self.trail.push(UndoOp::SetCut { slice: s });
        self.stats.splits += 1;
    }

    /// Split a leaf at `at`, applying the split symmetrically to every slice
    /// already known equal to it and merging the corresponding pieces, so
    /// that equal slices stay decomposable at the same boundaries.
    fn split_class(&mut self, s: SliceId, at: u32) {
        trace!(slice = %s, at, "split");
        let members = self.class_members(s);
        for &t in &members {
            if self.node(t).is_leaf() {
                self.raw_split(t, at);
            }
        }
        let s_cut = self.node(s).cut.expect("leaf was split");
        for &t in &members {
            if t == s {
                continue;
            }
            let just = Justification::ParentsEqual(s, t);
            let t_cut = self.node(t).cut.expect("class member was split");
            if t_cut.at == at {
                self.merge_internal(s_cut.hi, t_cut.hi, just);
                self.merge_internal(s_cut.lo, t_cut.lo, just);
            } else {
                // member already decomposed at other boundaries; align its
                // segments on either side of the new boundary
                let w = self.width(t);
                let mut hi_tiles = SmallVec::new();
                self.slice_range(t, w - 1, at, &mut hi_tiles);
                let mut lo_tiles = SmallVec::new();
                self.slice_range(t, at - 1, 0, &mut lo_tiles);
                self.merge_seq_internal(&[s_cut.hi], &hi_tiles, just);
                self.merge_seq_internal(&[s_cut.lo], &lo_tiles, just);
            }
        }
    }

    // ------------------------------------------------------------------
    // Merging
    // ------------------------------------------------------------------

    /// Assert that the concatenation of `xs` equals the concatenation of
    /// `ys` (both most significant first), justified by `reason`.
    ///
    /// Returns `false` without mutating anything if the total widths differ.
    /// A merge whose two sides are already equal is short-circuited, keeping
    /// the reason available as a shortcut justification.
    pub fn merge(&mut self, xs: &[SliceId], ys: &[SliceId], reason: Reason) -> bool {
        assert!(!xs.is_empty() && !ys.is_empty(), "empty merge operand");
        let wx: u64 = xs.iter().map(|&s| u64::from(self.width(s))).sum();
        let wy: u64 = ys.iter().map(|&s| u64::from(self.width(s))).sum();
        if wx != wy {
            self.stats.rejected_merges += 1;
            return false;
        }
        if self.seq_equal(xs, ys) {
            self.stats.redundant_merges += 1;
            if let ([x], [y]) = (xs, ys) {
                self.record_shortcut(*x, *y, reason);
            }
            return true;
        }
        trace!(reason = %reason, "merge");
        self.merge_seq_internal(xs, ys, Justification::Asserted(reason));
        true
    }

    /// Assert equality of two single slices. See [`merge`](Self::merge).
    pub fn merge_pair(&mut self, x: SliceId, y: SliceId, reason: Reason) -> bool {
        self.merge(&[x], &[y], reason)
    }

    /// Do the concatenated base decompositions already coincide root-wise?
    fn seq_equal(&self, xs: &[SliceId], ys: &[SliceId]) -> bool {
        let mut bx: SmallVec<[SliceId; 8]> = SmallVec::new();
        for &x in xs {
            self.collect_base(x, &mut bx);
        }
        let mut by: SmallVec<[SliceId; 8]> = SmallVec::new();
        for &y in ys {
            self.collect_base(y, &mut by);
        }
        bx.len() == by.len()
            && bx
                .iter()
                .zip(by.iter())
                .all(|(&a, &b)| self.find(a) == self.find(b))
    }

    /// Align the two sequences segment by segment, splitting at sequence
    /// boundaries as needed, and union each aligned pair under `just`.
    fn merge_seq_internal(&mut self, xs: &[SliceId], ys: &[SliceId], just: Justification) {
        debug_assert_eq!(
            xs.iter().map(|&s| u64::from(self.width(s))).sum::<u64>(),
            ys.iter().map(|&s| u64::from(self.width(s))).sum::<u64>(),
        );
        let mut qx: VecDeque<SliceId> = xs.iter().copied().collect();
        let mut qy: VecDeque<SliceId> = ys.iter().copied().collect();
        while let (Some(&a), Some(&b)) = (qx.front(), qy.front()) {
            let wa = self.width(a);
            let wb = self.width(b);
            match wa.cmp(&wb) {
                Ordering::Equal => {
                    qx.pop_front();
                    qy.pop_front();
                    self.merge_internal(a, b, just);
                }
                Ordering::Greater => {
                    qx.pop_front();
                    if self.node(a).is_leaf() {
                        self.split_class(a, wa - wb);
                    }
                    let cut = self.node(a).cut.expect("wider side is decomposed");
                    qx.push_front(cut.lo);
                    qx.push_front(cut.hi);
                }
                Ordering::Less => {
                    qy.pop_front();
                    if self.node(b).is_leaf() {
                        self.split_class(b, wb - wa);
                    }
                    let cut = self.node(b).cut.expect("wider side is decomposed");
                    qy.push_front(cut.lo);
                    qy.push_front(cut.hi);
                }
            }
        }
        debug_assert!(qx.is_empty() && qy.is_empty());
    }

    /// Union two equal-width slices and cascade into their decompositions.
    fn merge_internal(&mut self, x: SliceId, y: SliceId, just: Justification) {
        debug_assert_eq!(self.node(x).width, self.node(y).width);
        let rx = self.find_compress(x);
        let ry = self.find_compress(y);
        if rx == ry {
            self.stats.redundant_merges += 1;
            if let Justification::Asserted(r) = just {
                self.record_shortcut(x, y, r);
            }
            return;
        }
        self.union(rx, ry);
        self.add_proof_edge(x, y, just);
        // downward congruence: corresponding pieces of the two
        // decompositions are equal because x and y are
        let xc = self.node(x).cut;
        let yc = self.node(y).cut;
        if xc.is_some() || yc.is_some() {
            let xs: SmallVec<[SliceId; 2]> = match xc {
                Some(c) => smallvec![c.hi, c.lo],
                None => smallvec![x],
            };
            let ys: SmallVec<[SliceId; 2]> = match yc {
                Some(c) => smallvec![c.hi, c.lo],
                None => smallvec![y],
            };
            self.merge_seq_internal(&xs, &ys, Justification::ParentsEqual(x, y));
        }
    }

    fn record_shortcut(&mut self, x: SliceId, y: SliceId, reason: Reason) {
        if x == y {
            return;
        }
        let key = if x <= y { (x, y) } else { (y, x) };
        if let std::collections::hash_map::Entry::Vacant(e) = self.shortcuts.entry(key) {
            e.insert(reason);
            self.trail.push(UndoOp::Shortcut { a: key.0, b: key.1 });
        }
    }

    // ------------------------------------------------------------------
    // Term bridge
    // ------------------------------------------------------------------

    /// Bind bits `[hi:lo]` of `var` to a fresh variable and return it.
    ///
    /// The binding is an internal definitional merge; it never shows up in
    /// explanations. Repeated calls with the same arguments return the same
    /// variable.
    ///
    /// # Panics
    ///
    /// Panics if the range is malformed for `var`'s width.
    pub fn mk_extract_var(&mut self, var: VarId, hi: u32, lo: u32) -> VarId {
        if let Some(&v) = self.extract_vars.get(&(var, hi, lo)) {
            return v;
        }
        let base = self.var_slice(var);
        let tiles = self.mk_slice(base, hi, lo);
        let fresh = self.add_var(hi - lo + 1);
        let root = self.var_slice(fresh);
        self.merge_seq_internal(&[root], &tiles, Justification::Definition);
        self.extract_vars.insert((var, hi, lo), fresh);
        self.trail.push(UndoOp::ExtractVarMemo { var, hi, lo });
        fresh
    }

    /// Intern the term `var[hi:lo]` without allocating a variable.
    ///
    /// # Panics
    ///
    /// Panics if the range is malformed for `var`'s width.
    pub fn mk_extract_term(&mut self, var: VarId, hi: u32, lo: u32) -> TermId {
        let w = self.width(self.var_slice(var));
        assert!(
            hi >= lo && hi < w,
            "invalid range [{hi}:{lo}] of a {w}-bit variable"
        );
        let (t, fresh) = self.terms.intern(hi - lo + 1, TermKind::Extract { var, hi, lo });
        if fresh {
            self.trail.push(UndoOp::NewTerm);
        }
        t
    }

    /// Intern the concatenation `hi ++ lo` of two terms.
    pub fn mk_concat_term(&mut self, hi: TermId, lo: TermId) -> TermId {
        let w = self.terms.node(hi).width + self.terms.node(lo).width;
        let (t, fresh) = self.terms.intern(w, TermKind::Concat { hi, lo });
        if fresh {
            self.trail.push(UndoOp::NewTerm);
        }
        t
    }

    /// Bit-width of an interned term.
    #[must_use]
    pub fn term_width(&self, t: TermId) -> u32 {
        self.terms.node(t).width
    }

    /// Resolve a term to its slice node, memoized: repeated resolution of
    /// the same term yields the same slice id.
    pub fn term_slice(&mut self, t: TermId) -> SliceId {
        if let Some(s) = self.terms.resolved(t) {
            return s;
        }
        let kind = self.terms.node(t).kind;
        let s = match kind {
            TermKind::Extract { var, hi, lo } => {
                let base = self.var_slice(var);
                let tiles = self.mk_slice(base, hi, lo);
                self.concat_slices(&tiles)
            }
            TermKind::Concat { hi, lo } => {
                let sh = self.term_slice(hi);
                let sl = self.term_slice(lo);
                self.concat_slices(&[sh, sl])
            }
        };
        self.terms.memoize(t, s);
        self.trail.push(UndoOp::TermMemo { term: t });
        s
    }

    /// Chain existing slices into concatenation nodes, most significant
    /// first; a single slice is returned as-is.
    fn concat_slices(&mut self, parts: &[SliceId]) -> SliceId {
        debug_assert!(!parts.is_empty());
        let mut acc = *parts.last().expect("nonempty tile sequence");
        for &p in parts[..parts.len() - 1].iter().rev() {
            let at = self.width(acc);
            let w = self.width(p) + at;
            let id = self.new_slice(w, SliceKind::Concat(p, acc));
            self.node_mut(id).cut = Some(Cut { at, hi: p, lo: acc });
            acc = id;
        }
        acc
    }

    // ------------------------------------------------------------------
    // Checkpoint / rollback
    // ------------------------------------------------------------------

    /// Record the current state for a later [`rollback`](Self::rollback).
    #[must_use]
    pub fn checkpoint(&self) -> Mark {
        self.trail.mark()
    }

    /// Restore the engine to the state recorded at `mark`, undoing every
    /// split, merge, declaration, and memoized resolution since.
    ///
    /// # Panics
    ///
    /// Panics if `mark` does not come from this engine's current history.
    pub fn rollback(&mut self, mark: Mark) {
        assert!(mark.0 <= self.trail.len(), "mark from a rolled-back state");
        trace!(undo = self.trail.len() - mark.0, "rollback");
        while self.trail.len() > mark.0 {
            let op = self.trail.pop().expect("trail length checked");
            self.undo(op);
        }
        self.stats.rollbacks += 1;
    }

    fn undo(&mut self, op: UndoOp) {
        match op {
            UndoOp::NewSlice => {
                self.slices.pop();
            }
            UndoOp::NewVar => {
                self.var_slices.pop();
            }
            UndoOp::NewTerm => {
                self.terms.pop();
            }
            UndoOp::SetCut { slice } => {
                self.node_mut(slice).cut = None;
            }
            UndoOp::Union {
                absorbed,
                kept,
                rank_bumped,
            } => {
                self.node_mut(absorbed).parent = absorbed;
                if rank_bumped {
                    self.node_mut(kept).rank -= 1;
                }
                let na = self.node(absorbed).next;
                let nk = self.node(kept).next;
                self.node_mut(absorbed).next = nk;
                self.node_mut(kept).next = na;
            }
            UndoOp::Redirect { slice, prev } => {
                self.node_mut(slice).parent = prev;
            }
            UndoOp::Relabel { slice, prev } => {
                self.node_mut(slice).proof = prev;
            }
            UndoOp::TermMemo { term } => {
                self.terms.forget(term);
            }
            UndoOp::ExtractVarMemo { var, hi, lo } => {
                self.extract_vars.remove(&(var, hi, lo));
            }
            UndoOp::Shortcut { a, b } => {
                self.shortcuts.remove(&(a, b));
            }
        }
    }

    /// Open a scope; a convenience layer over [`checkpoint`](Self::checkpoint)
    /// matching the enclosing solver's decision-level stack.
    pub fn push_scope(&mut self) {
        let mark = self.checkpoint();
        self.scopes.push(mark);
    }

    /// Close the innermost scope, rolling back everything done inside it.
    ///
    /// # Panics
    ///
    /// Panics if no scope is open.
    pub fn pop_scope(&mut self) {
        let mark = self.scopes.pop().expect("pop_scope without push_scope");
        self.rollback(mark);
    }
}
