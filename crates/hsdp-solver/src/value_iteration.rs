//! Fixed-horizon value iteration over the action set

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use hsdp_core::{Result, VariableKind};
use hsdp_xadd::{DiagramId, Op};

use crate::action::unprimed;
use crate::belief::BeliefTracker;
use crate::cache::CacheManager;
use crate::context::SolverContext;
use crate::grid::{evaluate_grid, Grid, GridSpec};
use crate::observation::Isolation;
use crate::options::SolverOptions;
use crate::regression::RegressionEngine;

/// Analytic upper bound on the number of cases of a value function.
/// Saturates at [`BranchEstimate::SENTINEL`] instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct BranchEstimate(u64);

impl BranchEstimate {
    pub const SENTINEL: u64 = u64::MAX;

    pub fn one() -> Self {
        Self(1)
    }

    /// Multiply by a branch count; `None` means the count itself overflowed
    pub fn times(self, factor: Option<u64>) -> Self {
        match factor.and_then(|f| self.0.checked_mul(f)) {
            Some(v) if v != Self::SENTINEL => Self(v),
            _ => {
                if !self.is_saturated() {
                    warn!("Case estimate overflowed, clamping to sentinel");
                }
                Self(Self::SENTINEL)
            }
        }
    }

    /// One boolean variable summed out
    pub fn halved(self) -> Self {
        if self.is_saturated() || self.0 <= 1 {
            self
        } else {
            Self(self.0 / 2)
        }
    }

    pub fn is_saturated(self) -> bool {
        self.0 == Self::SENTINEL
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BranchEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_saturated() {
            write!(f, "> MAX")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// One completed horizon
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonEntry {
    /// Maximum over the alphas
    pub value: DiagramId,
    /// Action name -> Q diagram
    pub alphas: Vec<(String, DiagramId)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationStats {
    pub iteration: usize,
    pub nodes: usize,
    /// `None` once the branch count exceeds the representable maximum
    pub branches: Option<u64>,
    pub cases: BranchEstimate,
    pub elapsed_ms: u64,
    pub belief_value: Option<f64>,
    pub forest_nodes: usize,
}

/// Summary of a full run
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub iterations: usize,
    pub discount: f64,
    /// Handle of the final value function
    pub value: DiagramId,
    pub stats: Vec<IterationStats>,
    pub flushes: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl SolveReport {
    /// Plain-text results table
    pub fn summary(&self) -> String {
        let mut out = String::from("Iteration Results summary\n");
        for s in &self.stats {
            let branches = s
                .branches
                .map_or_else(|| format!("> {}", hsdp_xadd::MAX_BRANCH_COUNT), |b| b.to_string());
            out.push_str(&format!(
                "Iter {}: nodes = {}\tbranches = {}\tcases = {}\ttime = {} ms\n",
                s.iteration, s.nodes, branches, s.cases, s.elapsed_ms
            ));
        }
        out
    }
}

/// Value-iteration driver
pub struct ValueIteration {
    ctx: SolverContext,
    options: SolverOptions,
    engine: RegressionEngine,
    cache_manager: CacheManager,
    belief: BeliefTracker,
    horizons: BTreeMap<usize, HorizonEntry>,
    isolations: BTreeMap<String, Isolation>,
    value: DiagramId,
    cases: BranchEstimate,
}

impl ValueIteration {
    /// Start at horizon 0 with the zero value function
    pub fn new(ctx: SolverContext, options: SolverOptions) -> Self {
        let value = ctx.forest.zero();
        let belief = BeliefTracker::new(&ctx.model);
        let cache_manager = CacheManager::new(&options);
        let mut horizons = BTreeMap::new();
        horizons.insert(
            0,
            HorizonEntry {
                value,
                alphas: Vec::new(),
            },
        );
        Self {
            ctx,
            options,
            engine: RegressionEngine::new(),
            cache_manager,
            belief,
            horizons,
            isolations: BTreeMap::new(),
            value,
            cases: BranchEstimate::one(),
        }
    }

    pub fn with_cache_manager(mut self, cache_manager: CacheManager) -> Self {
        self.cache_manager = cache_manager;
        self
    }

    pub fn context(&self) -> &SolverContext {
        &self.ctx
    }

    pub fn value(&self) -> DiagramId {
        self.value
    }

    pub fn horizons(&self) -> &BTreeMap<usize, HorizonEntry> {
        &self.horizons
    }

    pub fn isolations(&self) -> &BTreeMap<String, Isolation> {
        &self.isolations
    }

    pub fn belief(&self) -> &BeliefTracker {
        &self.belief
    }

    /// Run `max_iterations` horizons, or the problem's own count if `None`
    pub fn solve(&mut self, max_iterations: Option<usize>) -> Result<SolveReport> {
        let iterations = max_iterations.unwrap_or(self.ctx.model.iterations);
        let start = Instant::now();
        info!("Starting value iteration: {} horizons", iterations);

        let mut stats = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            stats.push(self.step()?);
        }

        let live = self.live_set(&[]);
        self.cache_manager
            .maybe_flush(&mut self.ctx.forest, &live, self.engine.cache_mut());

        let total_ms = start.elapsed().as_millis() as u64;
        info!("Value iteration complete: {} iterations took {} ms", iterations, total_ms);

        Ok(SolveReport {
            iterations,
            discount: self.ctx.model.discount,
            value: self.value,
            stats,
            flushes: self.cache_manager.flush_count(),
            cache_hits: self.engine.cache().hits(),
            cache_misses: self.engine.cache().misses(),
            total_ms,
            finished_at: Utc::now(),
        })
    }

    /// Complete one horizon
    pub fn step(&mut self) -> Result<IterationStats> {
        let iteration = self.horizons.keys().next_back().map_or(1, |h| h + 1);
        let start = Instant::now();
        let prev = self.value;
        let continuous = self.ctx.model.continuous_names();

        let mut max_dd: Option<DiagramId> = None;
        let mut alphas: Vec<(String, DiagramId)> = Vec::new();
        let mut cases = BranchEstimate::one();

        for index in 0..self.ctx.model.actions.len() {
            let (forest, model) = self.ctx.parts();
            let action = &model.actions[index];

            let regression = self.engine.regress(forest, model, prev, action)?;
            let mut q = regression.q;
            if self.options.reduce_lp {
                q = forest.reduce_lp(q, &continuous)?;
            }

            let mut estimate = self.cases;
            for (var, &transition) in &action.transitions {
                estimate = estimate.times(forest.branch_count(transition)?);
                let base = unprimed(var).unwrap_or(var);
                if model.kind_of(base) == Some(VariableKind::Boolean) {
                    estimate = estimate.halved();
                }
            }
            estimate = estimate.times(forest.branch_count(action.reward)?);
            cases = cases.times(Some(estimate.get()).filter(|_| !estimate.is_saturated()));

            debug!(
                "Q^{}({}): {} nodes, case estimate {}",
                iteration,
                action.name,
                forest.node_count(q)?,
                estimate
            );

            max_dd = Some(match max_dd {
                None => q,
                Some(m) => forest.apply(m, q, Op::Max)?,
            });
            alphas.push((action.name.clone(), q));
            self.isolations.extend(regression.isolations);

            let mut extra: Vec<DiagramId> = alphas.iter().map(|(_, a)| *a).collect();
            extra.push(prev);
            extra.extend(max_dd);
            let live = self.live_set(&extra);
            self.cache_manager
                .maybe_flush(&mut self.ctx.forest, &live, self.engine.cache_mut());
        }

        let forest = &mut self.ctx.forest;
        let mut value = max_dd.unwrap_or_else(|| forest.zero());
        if self.options.reduce_lp {
            value = forest.reduce_lp(value, &continuous)?;
        }

        self.value = value;
        self.cases = cases;
        let belief_value = self.belief.score(&self.ctx.forest, &alphas)?;
        self.horizons.insert(iteration, HorizonEntry { value, alphas });

        let stats = IterationStats {
            iteration,
            nodes: self.ctx.forest.node_count(value)?,
            branches: self.ctx.forest.branch_count(value)?,
            cases,
            elapsed_ms: start.elapsed().as_millis() as u64,
            belief_value,
            forest_nodes: self.ctx.forest.len(),
        };
        info!(
            "Value function size @ end of iteration {}: {} nodes = {} cases in {} ms",
            iteration,
            stats.nodes,
            stats
                .branches
                .map_or_else(|| "> MAX".to_string(), |b| b.to_string()),
            stats.elapsed_ms
        );
        Ok(stats)
    }

    /// Roots that must survive a flush, plus `extra`
    fn live_set(&self, extra: &[DiagramId]) -> Vec<DiagramId> {
        let mut live: Vec<DiagramId> = self.ctx.model.handles().collect();
        live.push(self.value);
        for entry in self.horizons.values() {
            live.push(entry.value);
            live.extend(entry.alphas.iter().map(|(_, a)| *a));
        }
        for isolation in self.isolations.values() {
            live.extend(isolation.handles());
        }
        live.extend_from_slice(extra);
        live
    }

    /// Evaluate the current value function at a state
    pub fn evaluate(
        &self,
        bools: &std::collections::HashMap<String, bool>,
        conts: &std::collections::HashMap<String, f64>,
    ) -> Result<f64> {
        self.ctx.forest.evaluate(self.value, bools, conts)
    }

    /// Sample the current value function for plotting
    pub fn grid(&self, spec: &GridSpec) -> Result<Grid> {
        evaluate_grid(&self.ctx.forest, &self.ctx.model, self.value, spec)
    }
}
