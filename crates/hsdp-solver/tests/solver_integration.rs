//! Integration tests for the value-iteration driver
//!
//! These tests run whole problems through parsing, regression and value
//! iteration and check the resulting value functions.

#![allow(clippy::float_cmp)]

use std::collections::HashMap;

use hsdp_core::{parse_file, parse_problem, HsdpError};
use hsdp_solver::{
    CacheManager, GridSpec, MemoryProbe, RegressionEngine, SolverContext, SolverOptions,
    ValueIteration,
};
use hsdp_xadd::{Forest, Op};

const KEEP_BIT: &str = include_str!("../../../problems/keep_bit.hsdp");
const ROVER: &str = include_str!("../../../problems/rover.hsdp");

/// Helper to build a driver straight from problem text
fn driver(src: &str, options: SolverOptions) -> ValueIteration {
    let ctx = SolverContext::from_spec(&parse_problem(src).unwrap()).unwrap();
    ValueIteration::new(ctx, options)
}

fn bools(pairs: &[(&str, bool)]) -> HashMap<String, bool> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

fn conts(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

fn rover_state(pos: f64, energy: f64, done: bool) -> (HashMap<String, bool>, HashMap<String, f64>) {
    (
        bools(&[("done", done)]),
        conts(&[("pos", pos), ("energy", energy)]),
    )
}

struct Starved;

impl MemoryProbe for Starved {
    fn free_fraction(&self, _forest: &Forest) -> f64 {
        0.0
    }
}

#[test]
fn test_keep_bit_end_to_end() {
    let mut vi = driver(KEEP_BIT, SolverOptions::default());
    let report = vi.solve(None).unwrap();
    assert_eq!(report.iterations, 3);
    assert_eq!(report.stats.len(), 3);

    let on = vi.evaluate(&bools(&[("s", true)]), &HashMap::new()).unwrap();
    let off = vi.evaluate(&bools(&[("s", false)]), &HashMap::new()).unwrap();
    assert!((on - 2.71).abs() < 1e-9, "V(s=true) = {on}");
    assert_eq!(off, 0.0);

    // per horizon: 4 CPT branches, halved for s, times 2 reward branches
    let cases: Vec<u64> = report.stats.iter().map(|s| s.cases.get()).collect();
    assert_eq!(cases, vec![4, 16, 64]);
}

#[test]
fn test_horizon_map_grows_by_one_per_iteration() {
    let mut vi = driver(KEEP_BIT, SolverOptions::default());
    vi.solve(Some(3)).unwrap();

    let horizons = vi.horizons();
    assert_eq!(horizons.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

    let forest = &vi.context().forest;
    let expected = [0.0, 1.0, 1.9, 2.71];
    for (h, entry) in horizons {
        let v = forest.evaluate(entry.value, &bools(&[("s", true)]), &HashMap::new()).unwrap();
        assert!((v - expected[*h]).abs() < 1e-9, "horizon {h}: {v}");
        let expected_alphas = usize::from(*h > 0);
        assert_eq!(entry.alphas.len(), expected_alphas);
    }
}

#[test]
fn test_explicit_iteration_count_overrides_file() {
    let mut vi = driver(KEEP_BIT, SolverOptions::default());
    let report = vi.solve(Some(1)).unwrap();
    assert_eq!(report.iterations, 1);
    let on = vi.evaluate(&bools(&[("s", true)]), &HashMap::new()).unwrap();
    assert_eq!(on, 1.0);
}

#[test]
fn test_regress_zero_is_masked_reward() {
    let mut ctx = SolverContext::from_spec(&parse_problem(ROVER).unwrap()).unwrap();
    let mut engine = RegressionEngine::new();
    let (forest, model) = ctx.parts();
    let zero = forest.zero();

    for action in &model.actions {
        let q = engine.regress(forest, model, zero, action).unwrap().q;
        let mut expected = action.reward;
        for &c in &model.constraints {
            expected = forest.apply(expected, c, Op::Prod).unwrap();
        }
        assert_eq!(q, expected, "action {}", action.name);
    }
}

#[test]
fn test_rover_first_horizon_values() {
    let mut vi = driver(ROVER, SolverOptions::default());
    vi.solve(Some(1)).unwrap();

    // drive pays 10 past the goal, survey only 5
    let (b, c) = rover_state(9.0, 5.0, false);
    assert_eq!(vi.evaluate(&b, &c).unwrap(), 10.0);
    // survey's -1 loses to drive's 0 before the goal
    let (b, c) = rover_state(2.0, 5.0, false);
    assert_eq!(vi.evaluate(&b, &c).unwrap(), 0.0);
    // finished rovers earn nothing
    let (b, c) = rover_state(9.0, 5.0, true);
    assert_eq!(vi.evaluate(&b, &c).unwrap(), 0.0);
}

#[test]
fn test_rover_values_grow_with_horizon() {
    let mut vi = driver(ROVER, SolverOptions::default());
    vi.solve(Some(2)).unwrap();

    // two drives reach the goal from pos 6: 0 + 0.9 * 10
    let (b, c) = rover_state(6.5, 5.0, false);
    let v = vi.evaluate(&b, &c).unwrap();
    assert!((v - 9.0).abs() < 1e-9, "V = {v}");

    let (b, c) = rover_state(9.0, 5.0, true);
    assert_eq!(vi.evaluate(&b, &c).unwrap(), 0.0);
    assert_eq!(vi.isolations().len(), 1);
}

#[test]
fn test_forced_flushes_do_not_change_values() {
    let mut relaxed = driver(ROVER, SolverOptions::default());
    relaxed.solve(Some(3)).unwrap();

    let options = SolverOptions {
        always_flush: true,
        ..SolverOptions::default()
    };
    let mut flushed = driver(ROVER, options.clone())
        .with_cache_manager(CacheManager::new(&options).with_probe(Box::new(Starved)));
    let report = flushed.solve(Some(3)).unwrap();
    assert!(report.flushes >= 3);

    for (pos, energy, done) in [(0.0, 0.5, false), (6.5, 5.0, false), (9.5, 9.0, true), (4.0, 2.5, false)] {
        let (b, c) = rover_state(pos, energy, done);
        let expected = relaxed.evaluate(&b, &c).unwrap();
        let got = flushed.evaluate(&b, &c).unwrap();
        assert!(
            (expected - got).abs() < 1e-9,
            "state pos={pos} energy={energy} done={done}: {expected} vs {got}"
        );
    }
    // every horizon survives
    for entry in flushed.horizons().values() {
        assert!(flushed.context().forest.node(entry.value).is_ok());
    }
}

#[test]
fn test_missing_transition_aborts_solve() {
    let src = r"
        cvariables (x) min-values (0) max-values (10)
        bvariables () ivariables () ovariables ()
        action idle observation reward ([x]) endaction
        discount 0.9 iterations 3
    ";
    let mut vi = driver(src, SolverOptions::default());
    let err = vi.solve(None).unwrap_err();
    assert!(matches!(
        err,
        HsdpError::MissingActionVariable { ref action, ref variable }
            if action == "idle" && variable == "x'"
    ));
}

#[test]
fn test_nonlinear_observation_is_reported() {
    let src = r"
        cvariables (x) min-values (0) max-values (10)
        bvariables () ivariables () ovariables (o)
        action look x' ([x]) observation o ([x * x]) reward ([1]) endaction
        discount 0.9 iterations 1
    ";
    let mut vi = driver(src, SolverOptions::default());
    assert!(matches!(
        vi.solve(None).unwrap_err(),
        HsdpError::UnsupportedObservationModel { .. }
    ));
}

#[test]
fn test_non_strict_comparisons_include_boundary() {
    let src = r"
        cvariables (x) min-values (0) max-values (10)
        bvariables () ivariables () ovariables ()
        action high x' ([x]) observation reward ([x >= 5] ([1]) ([0])) endaction
        action low x' ([x]) observation reward ([x <= 5] ([2]) ([0])) endaction
        constraint ([x >= 0] ([1]) ([0])) endconstraint
        discount 0.9 iterations 1
    ";
    for reduce_lp in [true, false] {
        let mut vi = driver(
            src,
            SolverOptions {
                reduce_lp,
                ..SolverOptions::default()
            },
        );
        vi.solve(None).unwrap();
        let at = |x: f64| vi.evaluate(&HashMap::new(), &conts(&[("x", x)])).unwrap();
        // the lower bound is feasible and both boundaries sit at x = 5
        assert_eq!(at(0.0), 2.0, "reduce_lp = {reduce_lp}");
        assert_eq!(at(5.0), 2.0, "reduce_lp = {reduce_lp}");
        assert_eq!(at(6.0), 1.0, "reduce_lp = {reduce_lp}");
    }
}

#[test]
fn test_belief_scoring_needs_bounds() {
    let mut bounded = driver(ROVER, SolverOptions::default());
    let report = bounded.solve(Some(1)).unwrap();
    // lower corner: drive 0, survey -1; upper corner: done, so 0 for both
    assert_eq!(report.stats[0].belief_value, Some(0.0));

    // energy 0 satisfies energy >= 0, so survey's -1 is not masked away
    let (b, c) = rover_state(0.0, 0.0, false);
    let alphas = &bounded.horizons()[&1].alphas;
    let (_, survey) = alphas.iter().find(|(name, _)| name == "survey").unwrap();
    assert_eq!(bounded.context().forest.evaluate(*survey, &b, &c).unwrap(), -1.0);

    let unbounded_src = ROVER.replace("min-values (0 0)", "min-values (0 x)");
    let mut unbounded = driver(&unbounded_src, SolverOptions::default());
    let report = unbounded.solve(Some(1)).unwrap();
    assert_eq!(report.stats[0].belief_value, None);
}

#[test]
fn test_report_serializes() {
    let mut vi = driver(KEEP_BIT, SolverOptions::default());
    let report = vi.solve(None).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["iterations"], 3);
    assert_eq!(json["stats"].as_array().unwrap().len(), 3);
    assert!(report.summary().starts_with("Iteration Results summary"));
}

#[test]
fn test_problem_file_and_grid_roundtrip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let problem = dir.path().join("rover.hsdp");
    std::fs::write(&problem, ROVER).unwrap();

    let ctx = SolverContext::from_spec(&parse_file(&problem).unwrap()).unwrap();
    let mut vi = ValueIteration::new(ctx, SolverOptions::default());
    vi.solve(Some(2)).unwrap();

    let grid = vi
        .grid(&GridSpec {
            x_var: "pos".into(),
            y_var: "energy".into(),
            resolution: 5,
        })
        .unwrap();
    let out = dir.path().join("grid.dat");
    grid.write_file(&out).unwrap();

    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(text.lines().count(), 5);
    for line in text.lines() {
        assert_eq!(line.split_whitespace().count(), 2 + 5);
    }
}
