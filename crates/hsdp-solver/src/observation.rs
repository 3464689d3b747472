//! Observation isolation
//!
//! Inverts an observation model `o = f(state)` into `state = g(o)` for every
//! leaf where `f` is affine in a single continuous state variable.

use std::collections::BTreeMap;

use tracing::debug;

use hsdp_core::{ArithExpr, HsdpError, Result};
use hsdp_xadd::{DiagramId, Forest, Node, Polynomial};

use crate::action::unprimed;
use crate::context::Model;

/// Result of isolating one observation model
#[derive(Debug, Clone, PartialEq)]
pub struct Isolation {
    /// State variable -> diagram of its expression in the observation
    pub mappings: BTreeMap<String, DiagramId>,
    /// Branch structure of the model with zero leaves
    pub structure: DiagramId,
}

impl Isolation {
    pub fn handles(&self) -> impl Iterator<Item = DiagramId> + '_ {
        self.mappings
            .values()
            .copied()
            .chain(std::iter::once(self.structure))
    }
}

/// `(variable, a, c)` for a leaf of the form `c + a*variable`
fn affine_parts(expr: &ArithExpr) -> Option<(String, f64, f64)> {
    let linear = |term: &ArithExpr| match term {
        ArithExpr::Var(v) => Some((v.clone(), 1.0)),
        ArithExpr::Prod(factors) => match factors.as_slice() {
            [ArithExpr::Const(a), ArithExpr::Var(v)] | [ArithExpr::Var(v), ArithExpr::Const(a)] => {
                Some((v.clone(), *a))
            }
            _ => None,
        },
        _ => None,
    };

    match expr {
        ArithExpr::Sum(terms) => match terms.as_slice() {
            [ArithExpr::Const(c), term] | [term, ArithExpr::Const(c)] => {
                linear(term).map(|(v, a)| (v, a, *c))
            }
            _ => None,
        },
        other => linear(other).map(|(v, a)| (v, a, 0.0)),
    }
}

fn is_continuous_state(model: &Model, name: &str) -> bool {
    let base = unprimed(name).unwrap_or(name);
    model.variable(base).is_some()
}

/// Rewrite `obs_var = model_dd` into per-state-variable inverse expressions
pub fn isolate(
    forest: &mut Forest,
    model: &Model,
    obs_var: &str,
    model_dd: DiagramId,
) -> Result<Isolation> {
    let mut mappings = BTreeMap::new();
    let structure = isolate_rec(forest, model, obs_var, model_dd, &mut mappings)?;
    debug!(
        "Isolated observation {}: {} state mappings",
        obs_var,
        mappings.len()
    );
    Ok(Isolation {
        mappings,
        structure,
    })
}

fn isolate_rec(
    forest: &mut Forest,
    model: &Model,
    obs_var: &str,
    id: DiagramId,
    mappings: &mut BTreeMap<String, DiagramId>,
) -> Result<DiagramId> {
    let leaf = match forest.node(id)?.clone() {
        Node::Internal {
            decision,
            low,
            high,
        } => {
            let l = isolate_rec(forest, model, obs_var, low, mappings)?;
            let h = isolate_rec(forest, model, obs_var, high, mappings)?;
            return Ok(forest.internal_node(decision, l, h));
        }
        Node::Terminal(p) => p,
    };

    let state_vars: Vec<String> = leaf
        .vars()
        .into_iter()
        .filter(|v| is_continuous_state(model, v))
        .collect();
    let unsupported = || HsdpError::UnsupportedObservationModel {
        variable: obs_var.to_string(),
        expression: leaf.to_string(),
    };

    match state_vars.as_slice() {
        [] => {}
        [var] => {
            let (x, a, c) = affine_parts(&leaf.to_expr()).ok_or_else(unsupported)?;
            if x != *var || a == 0.0 {
                return Err(unsupported());
            }
            // x = (o - c) / a
            let inverse = Polynomial::var(obs_var)
                .scale(1.0 / a)
                .add(&Polynomial::constant(-c / a));
            let mapped = forest.terminal(inverse);
            mappings.insert(var.clone(), mapped);
        }
        _ => return Err(unsupported()),
    }

    Ok(forest.zero())
}
