//! HSDP Solver - Symbolic dynamic programming for hybrid-state problems
//!
//! This crate regresses piecewise value functions through actions, combines
//! the per-action results by maximum over a fixed number of horizons, and
//! keeps the shared diagram forest bounded with liveness-marked flushes.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::float_cmp)]

pub mod action;
pub mod belief;
pub mod cache;
pub mod context;
pub mod grid;
pub mod observation;
pub mod options;
pub mod regression;
pub mod value_iteration;

pub use action::Action;
pub use belief::{Belief, BeliefTracker};
pub use cache::{CacheManager, MemoryProbe, NodeBudget, RegressionCache, RegressionKey};
pub use context::{Model, SolverContext};
pub use grid::{evaluate_grid, Grid, GridSpec};
pub use observation::{isolate, Isolation};
pub use options::SolverOptions;
pub use regression::{compose, Regression, RegressionEngine};
pub use value_iteration::{BranchEstimate, HorizonEntry, IterationStats, SolveReport, ValueIteration};
