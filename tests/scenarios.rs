//! End-to-end scenarios for the slicing engine.
//!
//! These scripts drive the engine the way the enclosing theory solver does:
//! declare variables, register extractions, assert equalities under reason
//! tokens, and read equalities and explanations back out.

use bv_slicing::{Reason, SliceEngine};

/// x[7:3] = a, y[5:0] = b, then merge the base decompositions of x and y.
#[test]
fn merge_base_decompositions() {
    let mut engine = SliceEngine::new();
    let x = engine.add_var(8);
    let y = engine.add_var(8);
    let a = engine.add_var(5);
    let b = engine.add_var(6);

    let sx = engine.var_slice(x);
    let sy = engine.var_slice(y);
    let sa = engine.var_slice(a);
    let sb = engine.var_slice(b);

    let x_7_3 = engine.mk_slice(sx, 7, 3);
    let a_4_0 = engine.mk_slice(sa, 4, 0);
    assert!(engine.merge(&x_7_3, &a_4_0, Reason::new(1)));

    let y_5_0 = engine.mk_slice(sy, 5, 0);
    assert!(engine.merge(&y_5_0, &[sb], Reason::new(2)));

    let x_base = engine.base_slices(sx);
    let y_base = engine.base_slices(sy);
    assert!(engine.merge(&x_base, &y_base, Reason::new(3)));

    // x and y were never merged directly, but their bases coincide now
    assert!(engine.is_equal(sx, sy));

    // width preservation over everything that was created
    let x_base = engine.base_slices(sx);
    let total: u32 = x_base.iter().map(|&s| engine.width(s)).sum();
    assert_eq!(total, 8);
    let b_base = engine.base_slices(sb);
    let total: u32 = b_base.iter().map(|&s| engine.width(s)).sum();
    assert_eq!(total, 6);
}

/// Extraction registered before the merge: x[7:3] = a, x = y, y[5:0] = b.
#[test]
fn extraction_survives_merge() {
    let mut engine = SliceEngine::new();
    let x = engine.add_var(8);
    let y = engine.add_var(8);

    let a = engine.mk_extract_var(x, 7, 3);

    let sx = engine.var_slice(x);
    let sy = engine.var_slice(y);
    assert!(engine.merge_pair(sx, sy, Reason::new(1)));

    let b = engine.mk_extract_var(y, 5, 0);

    // a = x[7:3] = y[7:3] without any merge on the extracted slices
    let y_7_3 = engine.mk_slice(sy, 7, 3);
    let sa = engine.var_slice(a);
    assert!(engine.is_equal(sa, y_7_3[0]));
    assert_eq!(engine.explain_equal(sa, y_7_3[0]), vec![Reason::new(1)]);

    // b = y[5:0] = x[5:0]
    let x_5_0 = engine.mk_extract_term(x, 5, 0);
    let sx50 = engine.term_slice(x_5_0);
    let sb = engine.var_slice(b);
    assert!(engine.is_equal(sb, sx50));
    assert_eq!(engine.explain_equal(sb, sx50), vec![Reason::new(1)]);
}

/// x[7:3] = a, y[5:0] = b, x[5:0] = c, x[5:4] ++ y[3:0] = d, then x = y.
/// The merge must make b = c and b = d discoverable.
#[test]
fn concat_term_congruence() {
    let mut engine = SliceEngine::new();
    let x = engine.add_var(8);
    let y = engine.add_var(8);

    let a = engine.mk_extract_var(x, 7, 3);
    let b = engine.mk_extract_var(y, 5, 0);
    let c = engine.mk_extract_var(x, 5, 0);
    let d_hi = engine.mk_extract_term(x, 5, 4);
    let d_lo = engine.mk_extract_term(y, 3, 0);
    let d = engine.mk_concat_term(d_hi, d_lo);
    let sd = engine.term_slice(d);

    let sb = engine.var_slice(b);
    let sc = engine.var_slice(c);
    assert!(!engine.is_equal(sb, sc));
    assert!(!engine.is_equal(sb, sd));

    let sx = engine.var_slice(x);
    let sy = engine.var_slice(y);
    assert!(engine.merge_pair(sx, sy, Reason::new(123)));

    assert!(engine.is_equal(sb, sc));
    assert_eq!(engine.explain_equal(sb, sc), vec![Reason::new(123)]);

    assert!(engine.is_equal(sb, sd));
    assert_eq!(engine.explain_equal(sb, sd), vec![Reason::new(123)]);

    let _ = a;
}

/// a = b, d = c[1:0], c = b[3:0], e = a[1:0] under reasons 1..4.
/// Explaining d = e must produce exactly {1, 2, 3, 4}.
#[test]
fn explain_chain_is_complete() {
    let mut engine = SliceEngine::new();
    let a = engine.add_var(8);
    let b = engine.add_var(8);
    let c = engine.add_var(4);
    let d = engine.add_var(2);
    let e = engine.add_var(2);

    let sa = engine.var_slice(a);
    let sb = engine.var_slice(b);
    let sc = engine.var_slice(c);
    let sd = engine.var_slice(d);
    let se = engine.var_slice(e);

    assert!(engine.merge_pair(sa, sb, Reason::new(1)));
    let c_1_0 = engine.mk_extract_var(c, 1, 0);
    assert!(engine.merge_pair(sd, engine.var_slice(c_1_0), Reason::new(2)));
    let b_3_0 = engine.mk_extract_var(b, 3, 0);
    assert!(engine.merge_pair(sc, engine.var_slice(b_3_0), Reason::new(3)));
    let a_1_0 = engine.mk_extract_var(a, 1, 0);
    assert!(engine.merge_pair(se, engine.var_slice(a_1_0), Reason::new(4)));

    assert!(engine.is_equal(sd, se));
    assert_eq!(
        engine.explain_equal(sd, se),
        vec![Reason::new(1), Reason::new(2), Reason::new(3), Reason::new(4)]
    );
}

/// Explanations contain no reasons unrelated to the queried pair, and
/// replaying only the returned reasons reproduces the equality.
#[test]
fn explain_replay_soundness() {
    let run = |merges: &[u32]| -> (SliceEngine, Vec<Reason>) {
        let mut engine = SliceEngine::new();
        let a = engine.add_var(8);
        let b = engine.add_var(8);
        let c = engine.add_var(4);
        let d = engine.add_var(2);
        let e = engine.add_var(2);
        // unrelated pair, merged under a distractor reason
        let u = engine.add_var(8);
        let v = engine.add_var(8);

        let sa = engine.var_slice(a);
        let sb = engine.var_slice(b);
        let sc = engine.var_slice(c);
        let sd = engine.var_slice(d);
        let se = engine.var_slice(e);
        let su = engine.var_slice(u);
        let sv = engine.var_slice(v);

        let c_1_0 = engine.mk_extract_var(c, 1, 0);
        let b_3_0 = engine.mk_extract_var(b, 3, 0);
        let a_1_0 = engine.mk_extract_var(a, 1, 0);
        let sc10 = engine.var_slice(c_1_0);
        let sb30 = engine.var_slice(b_3_0);
        let sa10 = engine.var_slice(a_1_0);

        for &r in merges {
            let ok = match r {
                1 => engine.merge_pair(sa, sb, Reason::new(1)),
                2 => engine.merge_pair(sd, sc10, Reason::new(2)),
                3 => engine.merge_pair(sc, sb30, Reason::new(3)),
                4 => engine.merge_pair(se, sa10, Reason::new(4)),
                50 => engine.merge_pair(su, sv, Reason::new(50)),
                _ => unreachable!(),
            };
            assert!(ok);
        }
        let reasons = if engine.is_equal(sd, se) {
            engine.explain_equal(sd, se)
        } else {
            Vec::new()
        };
        (engine, reasons)
    };

    let (_, reasons) = run(&[50, 1, 2, 3, 4]);
    assert!(!reasons.is_empty());
    // the distractor merge is not part of the derivation
    assert!(!reasons.contains(&Reason::new(50)));

    // replay only the returned reasons from a fresh engine
    let replay: Vec<u32> = reasons.iter().map(|r| r.get()).collect();
    let (engine, replay_reasons) = run(&replay);
    assert!(!replay_reasons.is_empty());
    drop(engine);
}

/// The 8-bit/6-bit scenario: x[7:3] = a under 1, y[5:0] = b under 2, then
/// base(x) = base(y) under 3; all merges succeed and widths are preserved.
#[test]
fn scenario_three_merges() {
    let mut engine = SliceEngine::new();
    let x = engine.add_var(8);
    let a = engine.add_var(6);
    let y = engine.add_var(8);
    let b = engine.add_var(6);

    let sx = engine.var_slice(x);
    let sy = engine.var_slice(y);
    let sa = engine.var_slice(a);
    let sb = engine.var_slice(b);

    let x_7_3 = engine.mk_slice(sx, 7, 3);
    let a_4_0 = engine.mk_slice(sa, 4, 0);
    assert!(engine.merge(&x_7_3, &a_4_0, Reason::new(1)));

    let y_5_0 = engine.mk_slice(sy, 5, 0);
    assert!(engine.merge(&y_5_0, &[sb], Reason::new(2)));

    let x_base = engine.base_slices(sx);
    let y_base = engine.base_slices(sy);
    assert!(engine.merge(&x_base, &y_base, Reason::new(3)));

    // widths: every variable's base still tiles it exactly
    for (var, width) in [(x, 8), (a, 6), (y, 8), (b, 6)] {
        let s = engine.var_slice(var);
        let base = engine.base_slices(s);
        let total: u32 = base.iter().map(|&t| engine.width(t)).sum();
        assert_eq!(total, width);
    }

    // congruence: the same range of x and y resolves to equal slices
    let tx = engine.mk_extract_term(x, 5, 0);
    let ty = engine.mk_extract_term(y, 5, 0);
    let px = engine.term_slice(tx);
    let py = engine.term_slice(ty);
    assert!(engine.is_equal(px, py));
    // both ranges sit inside the base merge, so reason 3 suffices alone
    assert_eq!(engine.explain_equal(px, py), vec![Reason::new(3)]);
}

/// Rollback restores equalities, tree shape, and id allocation exactly.
#[test]
fn rollback_is_observationally_exact() {
    let mut engine = SliceEngine::new();
    let x = engine.add_var(8);
    let y = engine.add_var(8);
    let z = engine.add_var(8);
    let sx = engine.var_slice(x);
    let sy = engine.var_slice(y);
    let sz = engine.var_slice(z);

    let a = engine.mk_extract_var(x, 7, 4);
    let sa = engine.var_slice(a);
    assert!(engine.merge_pair(sx, sy, Reason::new(1)));

    let vars_before = engine.num_vars();
    let slices_before = engine.num_slices();
    let terms_before = engine.num_terms();
    let probe = [sx, sy, sz, sa];
    let matrix_before: Vec<bool> = probe
        .iter()
        .flat_map(|&p| probe.iter().map(move |&q| (p, q)))
        .map(|(p, q)| engine.is_equal(p, q))
        .collect();
    let bases_before: Vec<usize> = probe.iter().map(|&p| engine.base_slices(p).len()).collect();

    let mark = engine.checkpoint();

    // a branch the search later abandons
    let w = engine.add_var(8);
    let sw = engine.var_slice(w);
    assert!(engine.merge_pair(sz, sw, Reason::new(2)));
    let _ = engine.mk_extract_var(z, 5, 2);
    let t = engine.mk_extract_term(y, 3, 0);
    let _ = engine.term_slice(t);
    assert!(engine.merge_pair(sy, sz, Reason::new(3)));
    assert!(engine.is_equal(sx, sz));

    engine.rollback(mark);

    assert_eq!(engine.num_vars(), vars_before);
    assert_eq!(engine.num_slices(), slices_before);
    assert_eq!(engine.num_terms(), terms_before);
    let matrix_after: Vec<bool> = probe
        .iter()
        .flat_map(|&p| probe.iter().map(move |&q| (p, q)))
        .map(|(p, q)| engine.is_equal(p, q))
        .collect();
    assert_eq!(matrix_before, matrix_after);
    let bases_after: Vec<usize> = probe.iter().map(|&p| engine.base_slices(p).len()).collect();
    assert_eq!(bases_before, bases_after);

    // allocation state is restored: the same declarations replay identically
    let w2 = engine.add_var(8);
    assert_eq!(engine.var_slice(w2), sw);
}

/// Nested scopes unwind in order.
#[test]
fn nested_scopes() {
    let mut engine = SliceEngine::new();
    let x = engine.add_var(8);
    let y = engine.add_var(8);
    let sx = engine.var_slice(x);
    let sy = engine.var_slice(y);

    engine.push_scope();
    assert!(engine.merge_pair(sx, sy, Reason::new(1)));
    engine.push_scope();
    let z = engine.add_var(8);
    let sz = engine.var_slice(z);
    assert!(engine.merge_pair(sy, sz, Reason::new(2)));
    assert!(engine.is_equal(sx, sz));

    engine.pop_scope();
    assert!(engine.is_equal(sx, sy));
    assert_eq!(engine.num_vars(), 2);

    engine.pop_scope();
    assert!(!engine.is_equal(sx, sy));
}

/// Resolving the same extraction term twice yields the same slice id.
#[test]
fn extraction_term_idempotence() {
    let mut engine = SliceEngine::new();
    let x = engine.add_var(8);

    let t1 = engine.mk_extract_term(x, 6, 1);
    let t2 = engine.mk_extract_term(x, 6, 1);
    assert_eq!(t1, t2);

    let s1 = engine.term_slice(t1);
    let s2 = engine.term_slice(t2);
    assert_eq!(s1, s2);

    // still the same slice after unrelated decomposition refines the range
    let sx = engine.var_slice(x);
    let _ = engine.mk_slice(sx, 4, 3);
    assert_eq!(engine.term_slice(t1), s1);
}
