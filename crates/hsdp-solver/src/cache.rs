//! Regression memo table and pressure-triggered forest eviction

use std::collections::HashMap;

use tracing::{debug, info};

use hsdp_xadd::{DiagramId, Forest};

use crate::options::SolverOptions;

/// Source of the free-memory fraction checked before each flush
pub trait MemoryProbe: Send + Sync {
    /// Fraction of capacity still available, in `[0, 1]`
    fn free_fraction(&self, forest: &Forest) -> f64;
}

/// Treats a fixed number of forest nodes as the available memory
#[derive(Debug, Clone, Copy)]
pub struct NodeBudget {
    capacity: usize,
}

impl NodeBudget {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }
}

impl MemoryProbe for NodeBudget {
    fn free_fraction(&self, forest: &Forest) -> f64 {
        let used = forest.len() as f64 / self.capacity as f64;
        (1.0 - used).clamp(0.0, 1.0)
    }
}

/// Key of one composition result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegressionKey {
    pub value: DiagramId,
    pub transition: DiagramId,
    pub variable: String,
}

/// Memo of deterministic regression results. Never survives a flush.
#[derive(Debug, Default)]
pub struct RegressionCache {
    entries: HashMap<RegressionKey, DiagramId>,
    hits: u64,
    misses: u64,
}

impl RegressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &RegressionKey) -> Option<DiagramId> {
        let found = self.entries.get(key).copied();
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn insert(&mut self, key: RegressionKey, result: DiagramId) {
        self.entries.insert(key, result);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Decides when to flush and performs the liveness-marked eviction
pub struct CacheManager {
    flush_percent_minimum: f64,
    always_flush: bool,
    probe: Box<dyn MemoryProbe>,
    flushes: usize,
}

impl CacheManager {
    pub fn new(options: &SolverOptions) -> Self {
        Self {
            flush_percent_minimum: options.flush_percent_minimum,
            always_flush: options.always_flush,
            probe: Box::new(NodeBudget::new(options.node_budget)),
            flushes: 0,
        }
    }

    /// Replace the default node-budget probe
    pub fn with_probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn needs_flush(&self, forest: &Forest) -> bool {
        self.always_flush || self.probe.free_fraction(forest) <= self.flush_percent_minimum
    }

    /// Flush if memory is under pressure; returns whether a flush ran
    pub fn maybe_flush(
        &mut self,
        forest: &mut Forest,
        live: &[DiagramId],
        cache: &mut RegressionCache,
    ) -> bool {
        if !self.needs_flush(forest) {
            debug!("No need to flush caches");
            return false;
        }
        self.flush(forest, live, cache);
        true
    }

    /// Mark `live` as the only roots, reclaim everything else and drop the
    /// regression memo. Returns the number of nodes reclaimed.
    pub fn flush(
        &mut self,
        forest: &mut Forest,
        live: &[DiagramId],
        cache: &mut RegressionCache,
    ) -> usize {
        info!(
            "Before flush: {} nodes in use, {:.1}% of budget free",
            forest.len(),
            100.0 * self.probe.free_fraction(forest)
        );

        forest.clear_special_nodes();
        for &id in live {
            forest.add_special_node(id);
        }
        let reclaimed = forest.flush_caches();
        cache.clear();
        self.flushes += 1;

        info!(
            "After flush: {} nodes in use, {} reclaimed",
            forest.len(),
            reclaimed
        );
        reclaimed
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}
