//! Action descriptors over built diagrams

use std::collections::BTreeMap;

use tracing::debug;

use hsdp_core::{ActionSpec, DecisionExpr, DiagramSpec, HsdpError, Result, VariableKind};
use hsdp_xadd::{DiagramId, Forest, Op};

/// An action whose transition, observation and reward functions live in the
/// shared forest
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub name: String,
    /// Primed state variable -> transition diagram. For a boolean variable
    /// this is the full CPT over `v'`.
    pub transitions: BTreeMap<String, DiagramId>,
    /// Observation variable -> generative diagram
    pub observations: BTreeMap<String, DiagramId>,
    pub reward: DiagramId,
}

/// Strip the trailing prime of a next-state variable name
pub fn unprimed(name: &str) -> Option<&str> {
    name.strip_suffix('\'')
}

pub fn primed(name: &str) -> String {
    format!("{name}'")
}

impl Action {
    /// Build every diagram of `spec`. `kind_of` resolves declared variables.
    pub fn build(
        forest: &mut Forest,
        spec: &ActionSpec,
        kind_of: impl Fn(&str) -> Option<VariableKind>,
    ) -> Result<Self> {
        let mut transitions = BTreeMap::new();
        for (var, dd) in &spec.transitions {
            let base = unprimed(var).ok_or_else(|| HsdpError::Diagram(format!(
                "transition target '{var}' in action {} is not a primed variable",
                spec.name
            )))?;
            let built = forest.build_canonical(dd)?;
            let id = match kind_of(base) {
                Some(VariableKind::Continuous) => built,
                Some(VariableKind::Boolean) => bool_cpt(forest, var, built)?,
                _ => return Err(HsdpError::UnknownVariable(format!(
                    "{base} (transition in action {})",
                    spec.name
                ))),
            };
            transitions.insert(var.clone(), id);
        }

        let mut observations = BTreeMap::new();
        for (obs, dd) in &spec.observations {
            if kind_of(obs) != Some(VariableKind::Observation) {
                return Err(HsdpError::UnknownVariable(format!(
                    "{obs} (observation in action {})",
                    spec.name
                )));
            }
            observations.insert(obs.clone(), forest.build_canonical(dd)?);
        }

        let reward = forest.build_canonical(&spec.reward)?;
        debug!(
            "Built action {}: {} transitions, {} observations",
            spec.name,
            transitions.len(),
            observations.len()
        );

        Ok(Self {
            name: spec.name.clone(),
            transitions,
            observations,
            reward,
        })
    }

    /// Every diagram this action owns
    pub fn handles(&self) -> impl Iterator<Item = DiagramId> + '_ {
        self.transitions
            .values()
            .chain(self.observations.values())
            .copied()
            .chain(std::iter::once(self.reward))
    }
}

/// `ite(v', P, 1 - P)` from the probability that `v'` is true
fn bool_cpt(forest: &mut Forest, var_prime: &str, p_true: DiagramId) -> Result<DiagramId> {
    let indicator = forest.build_canonical(&DiagramSpec::branch(
        DecisionExpr::Bool(var_prime.to_string()),
        DiagramSpec::constant(1.0),
        DiagramSpec::constant(0.0),
    ))?;
    let one = forest.one();
    let complement = forest.apply(one, indicator, Op::Minus)?;
    let p_false = forest.apply(one, p_true, Op::Minus)?;
    let high = forest.apply(indicator, p_true, Op::Prod)?;
    let low = forest.apply(complement, p_false, Op::Prod)?;
    forest.apply(high, low, Op::Sum)
}
