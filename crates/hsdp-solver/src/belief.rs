//! Belief over a fixed pair of state hypotheses
//!
//! Hypothesis 0 stands for the lower corner of the state space (booleans
//! false, continuous variables at their minimum) and hypothesis 1 for the
//! upper corner. A horizon's alpha diagrams are scored against the belief as
//! `max_alpha sum_i p_i * alpha(point_i)`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use hsdp_core::Result;
use hsdp_xadd::{DiagramId, Forest};

use crate::context::Model;

/// Probability per hypothesis index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    probabilities: BTreeMap<usize, f64>,
}

impl Belief {
    /// Two hypotheses at 50/50
    pub fn uniform_pair() -> Self {
        Self {
            probabilities: [(0, 0.5), (1, 0.5)].into_iter().collect(),
        }
    }

    pub fn probability(&self, hypothesis: usize) -> f64 {
        self.probabilities.get(&hypothesis).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.probabilities.iter().map(|(h, p)| (*h, *p))
    }

    pub fn total(&self) -> f64 {
        self.probabilities.values().sum()
    }
}

#[derive(Debug, Clone)]
struct StatePoint {
    bools: HashMap<String, bool>,
    conts: HashMap<String, f64>,
}

impl StatePoint {
    fn corner(model: &Model, upper: bool) -> Option<Self> {
        let mut conts = HashMap::new();
        for v in &model.continuous {
            let bound = if upper { v.max } else { v.min };
            conts.insert(v.name.clone(), bound?);
        }
        let bools = model.boolean.iter().map(|b| (b.clone(), upper)).collect();
        Some(Self { bools, conts })
    }
}

/// Scores horizons against the belief
#[derive(Debug, Clone)]
pub struct BeliefTracker {
    belief: Belief,
    /// One point per hypothesis; `None` when some continuous variable is unbounded
    points: Option<Vec<StatePoint>>,
}

impl BeliefTracker {
    pub fn new(model: &Model) -> Self {
        let points = StatePoint::corner(model, false)
            .zip(StatePoint::corner(model, true))
            .map(|(lower, upper)| vec![lower, upper]);
        Self {
            belief: Belief::uniform_pair(),
            points,
        }
    }

    pub fn belief(&self) -> &Belief {
        &self.belief
    }

    pub fn can_score(&self) -> bool {
        self.points.is_some()
    }

    /// `V(b)` over the given alphas; `None` if there are no alphas or the
    /// hypotheses have no representative points
    pub fn score(&self, forest: &Forest, alphas: &[(String, DiagramId)]) -> Result<Option<f64>> {
        let Some(points) = &self.points else {
            return Ok(None);
        };
        let mut best: Option<f64> = None;
        for (_, alpha) in alphas {
            let mut inner = 0.0;
            for (hypothesis, p) in self.belief.iter() {
                if let Some(point) = points.get(hypothesis) {
                    inner += p * forest.evaluate(*alpha, &point.bools, &point.conts)?;
                }
            }
            best = Some(best.map_or(inner, |b: f64| b.max(inner)));
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsdp_core::expr::parse_expr;
    use hsdp_core::{parse_problem, DiagramSpec};

    use crate::context::SolverContext;

    fn context(bounds: &str) -> SolverContext {
        let src = format!(
            r"
            cvariables (x) {bounds}
            bvariables () ivariables () ovariables ()
            action a x' ([x]) observation reward ([0]) endaction
            discount 0.9 iterations 1
        "
        );
        SolverContext::from_spec(&parse_problem(&src).unwrap()).unwrap()
    }

    #[test]
    fn test_uniform_pair_sums_to_one() {
        let b = Belief::uniform_pair();
        assert_eq!(b.total(), 1.0);
        assert_eq!(b.probability(1), 0.5);
        assert_eq!(b.probability(7), 0.0);
    }

    #[test]
    fn test_score_takes_best_alpha() {
        let mut ctx = context("min-values (0) max-values (10)");
        let tracker = BeliefTracker::new(&ctx.model);
        let up = ctx
            .forest
            .build_canonical(&DiagramSpec::Leaf(parse_expr("x", 1).unwrap()))
            .unwrap();
        let flat = ctx.forest.constant(4.0);
        let alphas = vec![("up".to_string(), up), ("flat".to_string(), flat)];
        // up: 0.5*0 + 0.5*10 = 5 beats flat: 4
        assert_eq!(tracker.score(&ctx.forest, &alphas).unwrap(), Some(5.0));
        assert_eq!(tracker.score(&ctx.forest, &[]).unwrap(), None);
    }

    #[test]
    fn test_unbounded_cannot_score() {
        let ctx = context("min-values (x) max-values (10)");
        let tracker = BeliefTracker::new(&ctx.model);
        assert!(!tracker.can_score());
        let zero = ctx.forest.zero();
        assert_eq!(
            tracker.score(&ctx.forest, &[("a".into(), zero)]).unwrap(),
            None
        );
    }
}
