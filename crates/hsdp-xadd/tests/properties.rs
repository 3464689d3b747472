//! Property-based tests for the diagram algebra.

#![allow(clippy::float_cmp)]

use std::collections::HashMap;

use proptest::prelude::*;

use hsdp_core::expr::{parse_decision, parse_expr};
use hsdp_core::DiagramSpec;
use hsdp_xadd::{Forest, Op, Polynomial};

fn leaf(src: &str) -> DiagramSpec {
    DiagramSpec::Leaf(parse_expr(src, 1).unwrap())
}

fn branch(test: &str, high: DiagramSpec, low: DiagramSpec) -> DiagramSpec {
    DiagramSpec::branch(parse_decision(test, 1).unwrap(), high, low)
}

fn point(x: f64) -> HashMap<String, f64> {
    [("x".to_string(), x)].into_iter().collect()
}

fn flag(s: bool) -> HashMap<String, bool> {
    [("s".to_string(), s)].into_iter().collect()
}

/// `s ? (x > t ? a*x : b) : c`
fn sample(forest: &mut Forest, t: i32, a: i32, b: i32, c: i32) -> hsdp_xadd::DiagramId {
    let spec = branch(
        "s",
        branch(&format!("x > {t}"), leaf(&format!("{a} * x")), leaf(&b.to_string())),
        leaf(&c.to_string()),
    );
    forest.build_canonical(&spec).unwrap()
}

proptest! {
    // 1. Summing out a boolean equals summing the two point evaluations
    #[test]
    fn restrict_sum_identity(
        t in -5..5i32, a in -4..4i32, b in -9..9i32, c in -9..9i32, x in -10.0..10.0f64,
    ) {
        let mut f = Forest::new();
        f.register_bool_var("s");
        let dd = sample(&mut f, t, a, b, c);
        let hi = f.restrict(dd, "s", true).unwrap();
        let lo = f.restrict(dd, "s", false).unwrap();
        let summed = f.apply(hi, lo, Op::Sum).unwrap();

        let expected = f.evaluate(dd, &flag(true), &point(x)).unwrap()
            + f.evaluate(dd, &flag(false), &point(x)).unwrap();
        let got = f.evaluate(summed, &HashMap::new(), &point(x)).unwrap();
        prop_assert!((got - expected).abs() < 1e-9, "got={got} expected={expected}");
    }

    // 2. Canonicalisation after substitution is idempotent and value preserving
    #[test]
    fn canonical_idempotent(
        t in -5..5i32, a in -4..4i32, b in -9..9i32, shift in -3..3i32, x in -10.0..10.0f64,
    ) {
        let mut f = Forest::new();
        f.register_bool_var("s");
        let dd = sample(&mut f, t, a, b, 0);
        let mut subs = HashMap::new();
        subs.insert(
            "x".to_string(),
            Polynomial::var("x").add(&Polynomial::constant(f64::from(shift))),
        );
        let raw = f.substitute(dd, &subs).unwrap();
        let once = f.make_canonical(raw).unwrap();
        let twice = f.make_canonical(once).unwrap();
        prop_assert_eq!(once, twice);

        let shifted = f.evaluate(dd, &flag(true), &point(x + f64::from(shift))).unwrap();
        let got = f.evaluate(once, &flag(true), &point(x)).unwrap();
        prop_assert!((got - shifted).abs() < 1e-9);
    }

    // 3. Max and Min agree with pointwise evaluation
    #[test]
    fn max_min_pointwise(a in -4..4i32, b in -9..9i32, c in -4..4i32, d in -9..9i32, x in -10.0..10.0f64) {
        let mut f = Forest::new();
        let p = f.build_canonical(&leaf(&format!("{a} * x + {b}"))).unwrap();
        let q = f.build_canonical(&leaf(&format!("{c} * x + {d}"))).unwrap();
        let hi = f.apply(p, q, Op::Max).unwrap();
        let lo = f.apply(p, q, Op::Min).unwrap();

        let pv = f.evaluate(p, &HashMap::new(), &point(x)).unwrap();
        let qv = f.evaluate(q, &HashMap::new(), &point(x)).unwrap();
        let hv = f.evaluate(hi, &HashMap::new(), &point(x)).unwrap();
        let lv = f.evaluate(lo, &HashMap::new(), &point(x)).unwrap();
        prop_assert!((hv - pv.max(qv)).abs() < 1e-9);
        prop_assert!((lv - pv.min(qv)).abs() < 1e-9);
    }

    // 4. Flushing with a root marked live never changes its value
    #[test]
    fn flush_preserves_live_roots(t in -5..5i32, a in -4..4i32, b in -9..9i32, x in -10.0..10.0f64) {
        let mut f = Forest::new();
        f.register_bool_var("s");
        let keep = sample(&mut f, t, a, b, 1);
        let _garbage = sample(&mut f, t + 1, a + 1, b, 2);
        let before = f.evaluate(keep, &flag(true), &point(x)).unwrap();

        f.clear_special_nodes();
        f.add_special_node(keep);
        f.flush_caches();

        prop_assert_eq!(f.evaluate(keep, &flag(true), &point(x)).unwrap(), before);
    }
}
