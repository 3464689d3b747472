//! Property-based tests for observation isolation and case estimates.

use std::collections::HashMap;

use proptest::prelude::*;

use hsdp_core::parse_problem;
use hsdp_solver::{isolate, BranchEstimate, SolverContext};

/// Context with a single affine observation model `o = a*x + b`
fn affine_context(a: i32, b: i32) -> SolverContext {
    let src = format!(
        r"
        cvariables (x) min-values (-100) max-values (100)
        bvariables () ivariables () ovariables (o)
        action look x' ([x]) observation o ([{a} * x + {b}]) reward ([0]) endaction
        discount 0.9 iterations 1
    "
    );
    SolverContext::from_spec(&parse_problem(&src).unwrap()).unwrap()
}

/// Strategy: non-zero slope
fn slope_strategy() -> impl Strategy<Value = i32> {
    prop_oneof![-9..=-1i32, 1..=9i32]
}

proptest! {
    // 1. Isolating o = a*x + b and feeding back an observation recovers x
    #[test]
    fn observation_round_trip(a in slope_strategy(), b in -20..20i32, x0 in -50.0..50.0f64) {
        let mut ctx = affine_context(a, b);
        let (forest, model) = ctx.parts();
        let model_dd = model.actions[0].observations["o"];
        let iso = isolate(forest, model, "o", model_dd).unwrap();

        let obs = f64::from(a) * x0 + f64::from(b);
        let conts: HashMap<String, f64> = [("o".to_string(), obs)].into_iter().collect();
        let x = forest.evaluate(iso.mappings["x"], &HashMap::new(), &conts).unwrap();
        prop_assert!((x - x0).abs() < 1e-6, "a={a} b={b} x0={x0} got {x}");
    }

    // 2. The case estimate equals the exact product until it clamps
    #[test]
    fn estimate_clamps_instead_of_wrapping(factors in prop::collection::vec(1..1_000_000u64, 0..8)) {
        let mut estimate = BranchEstimate::one();
        let mut exact: Option<u128> = Some(1);
        for f in &factors {
            estimate = estimate.times(Some(*f));
            exact = exact
                .and_then(|e| e.checked_mul(u128::from(*f)))
                .filter(|e| *e < u128::from(BranchEstimate::SENTINEL));
        }
        match exact {
            Some(e) => prop_assert_eq!(u128::from(estimate.get()), e),
            None => prop_assert!(estimate.is_saturated()),
        }
        prop_assert!(estimate.get() >= 1);
    }

    // 3. Halving never drops below one and never leaves saturation
    #[test]
    fn halving_is_bounded(start in 1..u64::MAX, halvings in 0..70usize) {
        let mut estimate = BranchEstimate::one().times(Some(start));
        let saturated = estimate.is_saturated();
        for _ in 0..halvings {
            estimate = estimate.halved();
        }
        prop_assert!(estimate.get() >= 1);
        prop_assert_eq!(estimate.is_saturated(), saturated);
    }
}
