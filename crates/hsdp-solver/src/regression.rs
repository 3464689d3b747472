//! Decision-theoretic regression of a value function through one action

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use hsdp_core::{HsdpError, Result, VariableKind};
use hsdp_xadd::{DiagramId, Forest, Node, Op, Polynomial};

use crate::action::{primed, Action};
use crate::cache::{RegressionCache, RegressionKey};
use crate::context::Model;
use crate::observation::{isolate, Isolation};

/// Everything one call to [`RegressionEngine::regress`] produced
#[derive(Debug, Clone)]
pub struct Regression {
    /// Action value
    pub q: DiagramId,
    /// Observation variable -> isolated state mapping
    pub isolations: BTreeMap<String, Isolation>,
    /// Primed boolean variables that were summed out
    pub summed_out: Vec<String>,
}

/// Regresses value functions; owns the composition memo
#[derive(Debug, Default)]
pub struct RegressionEngine {
    cache: RegressionCache,
}

impl RegressionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &RegressionCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut RegressionCache {
        &mut self.cache
    }

    /// `Q = reward + discount * E[V(s')]`, masked by every constraint
    pub fn regress(
        &mut self,
        forest: &mut Forest,
        model: &Model,
        vfun: DiagramId,
        action: &Action,
    ) -> Result<Regression> {
        let mut isolations = BTreeMap::new();
        for obs in &model.observation {
            match action.observations.get(obs) {
                Some(&dd) => {
                    isolations.insert(obs.clone(), isolate(forest, model, obs, dd)?);
                }
                None => debug!("Action {} has no model for observation {}", action.name, obs),
            }
        }

        // Partition the value function's variables and check transitions
        let mut prime_subs = HashMap::new();
        let mut continuous = Vec::new();
        let mut boolean = Vec::new();
        for var in forest.collect_vars(vfun)? {
            let var_prime = primed(&var);
            match model.kind_of(&var) {
                Some(VariableKind::Continuous) => continuous.push(var_prime.clone()),
                Some(VariableKind::Boolean) => boolean.push(var_prime.clone()),
                Some(kind) => {
                    return Err(HsdpError::UnknownVariable(format!(
                        "{var} ({kind:?} variable in a value function)"
                    )))
                }
                None => return Err(HsdpError::UnknownVariable(var)),
            }
            if !action.transitions.contains_key(&var_prime) {
                return Err(HsdpError::MissingActionVariable {
                    action: action.name.clone(),
                    variable: var_prime,
                });
            }
            prime_subs.insert(var, Polynomial::var(var_prime));
        }

        debug!(
            "Regressing through {}: continuous {:?}, boolean {:?}",
            action.name, continuous, boolean
        );

        let primed_dd = forest.substitute(vfun, &prime_subs)?;
        let mut q = forest.make_canonical(primed_dd)?;

        // Deterministic regression, one continuous variable at a time
        for var_prime in &continuous {
            let transition = action.transitions[var_prime];
            let key = RegressionKey {
                value: q,
                transition,
                variable: var_prime.clone(),
            };
            if let Some(cached) = self.cache.get(&key) {
                q = cached;
                continue;
            }
            let before = forest.node_count(q)?;
            let composed = compose(forest, q, &[(var_prime.clone(), transition)])?;
            q = forest.make_canonical(composed)?;
            debug!(
                "Regressed {}: {} -> {} nodes",
                var_prime,
                before,
                forest.node_count(q)?
            );
            self.cache.insert(key, q);
        }

        // Multiply in each CPT and marginalise its variable
        for var_prime in &boolean {
            let cpt = action.transitions[var_prime];
            q = forest.apply(q, cpt, Op::Prod)?;
            let high = forest.restrict(q, var_prime, true)?;
            let low = forest.restrict(q, var_prime, false)?;
            q = forest.apply(high, low, Op::Sum)?;
        }

        let discounted = forest.scalar_op(q, model.discount, Op::Prod)?;
        q = forest.apply(action.reward, discounted, Op::Sum)?;

        for &constraint in &model.constraints {
            q = forest.apply(q, constraint, Op::Prod)?;
        }

        Ok(Regression {
            q,
            isolations,
            summed_out: boolean,
        })
    }
}

/// Substitute each variable's transition into `vfun`.
///
/// Walks the transition diagrams in order; every leaf reached fixes the
/// pending expression for its variable, and once all variables are fixed a
/// single substitution is made. Branch nodes of the transitions are rebuilt
/// around the results, so the output may need canonicalising.
pub fn compose(
    forest: &mut Forest,
    vfun: DiagramId,
    pairs: &[(String, DiagramId)],
) -> Result<DiagramId> {
    let mut pending: Vec<Option<Polynomial>> = vec![None; pairs.len()];
    compose_from(forest, vfun, pairs, 0, &mut pending)
}

fn compose_from(
    forest: &mut Forest,
    vfun: DiagramId,
    pairs: &[(String, DiagramId)],
    index: usize,
    pending: &mut Vec<Option<Polynomial>>,
) -> Result<DiagramId> {
    match pairs.get(index) {
        Some(&(_, transition)) => descend(forest, vfun, pairs, index, transition, pending),
        None => {
            let subs: HashMap<String, Polynomial> = pairs
                .iter()
                .zip(pending.iter())
                .filter_map(|((var, _), expr)| expr.clone().map(|e| (var.clone(), e)))
                .collect();
            forest.substitute(vfun, &subs)
        }
    }
}

fn descend(
    forest: &mut Forest,
    vfun: DiagramId,
    pairs: &[(String, DiagramId)],
    index: usize,
    cur: DiagramId,
    pending: &mut Vec<Option<Polynomial>>,
) -> Result<DiagramId> {
    match forest.node(cur)?.clone() {
        Node::Internal {
            decision,
            low,
            high,
        } => {
            let l = descend(forest, vfun, pairs, index, low, pending)?;
            let h = descend(forest, vfun, pairs, index, high, pending)?;
            Ok(forest.internal_node(decision, l, h))
        }
        Node::Terminal(expr) => {
            pending[index] = Some(expr);
            let result = compose_from(forest, vfun, pairs, index + 1, pending);
            pending[index] = None;
            result
        }
    }
}
