//! Solver tuning knobs

use serde::{Deserialize, Serialize};

/// Options shared by the driver and the cache manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Prune infeasible branches of every Q-value and of the combined maximum
    pub reduce_lp: bool,
    /// Flush once the free fraction of the node budget drops to this value
    pub flush_percent_minimum: f64,
    /// Flush after every action regardless of pressure
    pub always_flush: bool,
    /// Arena capacity used to derive the free fraction
    pub node_budget: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            reduce_lp: true,
            flush_percent_minimum: 0.3,
            always_flush: false,
            node_budget: 2_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SolverOptions::default();
        assert!(options.reduce_lp);
        assert_eq!(options.flush_percent_minimum, 0.3);
        assert_eq!(options.node_budget, 2_000_000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: SolverOptions = serde_json::from_str(r#"{"always_flush": true}"#).unwrap();
        assert!(options.always_flush);
        assert_eq!(options.node_budget, 2_000_000);
    }
}
