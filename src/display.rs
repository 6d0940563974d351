//! Diagnostic dump of the slice forest and equivalence classes.
//!
//! Not part of the functional contract; the format is for human eyes during
//! debugging and may change freely.

use crate::engine::SliceEngine;
use crate::ids::SliceId;
use crate::node::SliceKind;
use std::fmt;

impl SliceEngine {
    fn fmt_subtree(
        &self,
        f: &mut fmt::Formatter<'_>,
        s: SliceId,
        hi: u32,
        lo: u32,
        depth: usize,
    ) -> fmt::Result {
        let node = self.node(s);
        let label = match node.kind {
            SliceKind::Var(v) => format!("{v}"),
            SliceKind::SubHi(p) => format!("hi of {p}"),
            SliceKind::SubLo(p) => format!("lo of {p}"),
            SliceKind::Concat(h, l) => format!("{h} ++ {l}"),
        };
        writeln!(
            f,
            "{:indent$}{s} [{hi}:{lo}] {label} root={}",
            "",
            self.root_id(s),
            indent = depth * 2
        )?;
        if let Some(cut) = node.cut {
            self.fmt_subtree(f, cut.hi, hi, lo + cut.at, depth + 1)?;
            self.fmt_subtree(f, cut.lo, lo + cut.at - 1, lo, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for SliceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for v in 0..self.num_vars() {
            let var = crate::ids::VarId::new(v as u32);
            let s = self.var_slice(var);
            self.fmt_subtree(f, s, self.width(s) - 1, 0, 0)?;
        }
        let stats = self.stats();
        writeln!(
            f,
            "{} vars, {} slices, {} terms; {} merges ({} redundant, {} rejected), {} splits",
            self.num_vars(),
            self.num_slices(),
            self.num_terms(),
            stats.merges,
            stats.redundant_merges,
            stats.rejected_merges,
            stats.splits,
        )
    }
}
