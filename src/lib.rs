//! Bit-range equality tracking for a bit-vector theory solver.
//!
//! This crate implements the "slicing" engine used by a word-level bit-vector
//! theory: it maintains an equivalence relation over contiguous bit-ranges
//! ("slices") of bit-vector variables, decomposing variables lazily as
//! extraction operations are requested, and propagating equalities between
//! aligned sub-ranges in both directions:
//!
//! - merging two variables silently implies equality of all previously
//!   registered extractions of them (downward congruence), and
//! - two slices whose base decompositions already coincide are recognized as
//!   equal without an explicit merge (upward congruence).
//!
//! Every merge carries an opaque [`Reason`] token supplied by the caller.
//! [`SliceEngine::explain_equal`] walks the justification forest to recover
//! a sufficient set of those tokens for any derived equality, which the
//! enclosing solver turns into conflict-clause or lemma literals.
//!
//! The engine runs under a backtracking search procedure: every structural
//! mutation is recorded on an undo trail, and [`SliceEngine::checkpoint`] /
//! [`SliceEngine::rollback`] restore any earlier state exactly.
//!
//! # Examples
//!
//! ```
//! use bv_slicing::{Reason, SliceEngine};
//!
//! let mut engine = SliceEngine::new();
//! let x = engine.add_var(8);
//! let y = engine.add_var(8);
//!
//! // Register an extraction of x before anything is known about x and y.
//! let a = engine.mk_extract_var(x, 7, 3);
//!
//! // Asserting x = y makes the extraction equal to y[7:3] as well.
//! let sx = engine.var_slice(x);
//! let sy = engine.var_slice(y);
//! assert!(engine.merge_pair(sx, sy, Reason::new(1)));
//!
//! let y_7_3 = engine.mk_slice(sy, 7, 3);
//! let sa = engine.var_slice(a);
//! assert!(engine.is_equal(sa, y_7_3[0]));
//! assert_eq!(engine.explain_equal(sa, y_7_3[0]), vec![Reason::new(1)]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod display;
mod engine;
mod explain;
mod ids;
mod node;
mod term;
mod trail;

pub use engine::{SliceEngine, SliceStats};
pub use ids::{Mark, Reason, SliceId, TermId, VarId};
