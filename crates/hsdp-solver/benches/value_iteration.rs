//! Value Iteration Benchmarks
//!
//! Benchmarks for the symbolic dynamic programming hot paths:
//! - Full value-iteration runs over the bundled problems
//! - Single regressions of a value function through an action
//! - Diagram construction from parsed problem files
//!
//! ## Hot Paths Identified
//! 1. RegressionEngine::regress() - Called once per action per horizon
//! 2. Forest::apply() with MAX - Combines every Q-value
//! 3. Forest::make_canonical() - Runs after every composition

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use hsdp_core::parse_problem;
use hsdp_solver::{RegressionEngine, SolverContext, SolverOptions, ValueIteration};

const KEEP_BIT: &str = include_str!("../../../problems/keep_bit.hsdp");
const ROVER: &str = include_str!("../../../problems/rover.hsdp");

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");
    let rover = parse_problem(ROVER).expect("rover problem parses");

    for horizons in [1usize, 2, 3] {
        group.bench_with_input(BenchmarkId::new("rover", horizons), &horizons, |b, &h| {
            b.iter(|| {
                let ctx = SolverContext::from_spec(&rover).expect("rover builds");
                let mut vi = ValueIteration::new(ctx, SolverOptions::default());
                black_box(vi.solve(Some(h)).expect("solve succeeds"))
            });
        });
    }

    let keep_bit = parse_problem(KEEP_BIT).expect("keep-bit problem parses");
    group.bench_function("keep_bit_10", |b| {
        b.iter(|| {
            let ctx = SolverContext::from_spec(&keep_bit).expect("keep-bit builds");
            let mut vi = ValueIteration::new(ctx, SolverOptions::default());
            black_box(vi.solve(Some(10)).expect("solve succeeds"))
        });
    });

    group.finish();
}

fn bench_regress(c: &mut Criterion) {
    let spec = parse_problem(ROVER).expect("rover problem parses");

    c.bench_function("regress_zero_all_actions", |b| {
        b.iter(|| {
            let mut ctx = SolverContext::from_spec(&spec).expect("rover builds");
            let mut engine = RegressionEngine::new();
            let (forest, model) = ctx.parts();
            let zero = forest.zero();
            for action in &model.actions {
                black_box(engine.regress(forest, model, zero, action).expect("regress"));
            }
        });
    });
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("parse_and_build_rover", |b| {
        b.iter(|| {
            let spec = parse_problem(black_box(ROVER)).expect("rover problem parses");
            black_box(SolverContext::from_spec(&spec).expect("rover builds"))
        });
    });
}

criterion_group!(benches, bench_solve, bench_regress, bench_build);
criterion_main!(benches);
