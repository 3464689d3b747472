//! Solving context: the forest plus everything built into it

use std::collections::HashMap;

use tracing::info;

use hsdp_core::{ProblemSpec, Result, Variable, VariableKind};
use hsdp_xadd::{DiagramId, Forest};

use crate::action::{primed, Action};

/// Problem data whose diagrams live in the context's forest
#[derive(Debug, Clone)]
pub struct Model {
    pub continuous: Vec<Variable>,
    pub boolean: Vec<String>,
    pub intermediate: Vec<String>,
    pub observation: Vec<String>,
    /// Sorted by name; this is the enumeration order of the driver
    pub actions: Vec<Action>,
    pub constraints: Vec<DiagramId>,
    pub discount: f64,
    pub iterations: usize,
    kinds: HashMap<String, VariableKind>,
}

impl Model {
    pub fn kind_of(&self, name: &str) -> Option<VariableKind> {
        self.kinds.get(name).copied()
    }

    pub fn continuous_names(&self) -> Vec<String> {
        self.continuous.iter().map(|v| v.name.clone()).collect()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.continuous.iter().find(|v| v.name == name)
    }

    /// True if every continuous variable has both bounds
    pub fn fully_bounded(&self) -> bool {
        self.continuous.iter().all(|v| v.min.is_some() && v.max.is_some())
    }

    /// Diagrams that must survive every flush
    pub fn handles(&self) -> impl Iterator<Item = DiagramId> + '_ {
        self.actions
            .iter()
            .flat_map(Action::handles)
            .chain(self.constraints.iter().copied())
    }
}

/// Exclusive owner of the diagram forest for one run
pub struct SolverContext {
    pub forest: Forest,
    pub model: Model,
}

impl SolverContext {
    /// Register variables and build every action and constraint diagram
    pub fn from_spec(spec: &ProblemSpec) -> Result<Self> {
        let mut forest = Forest::new();
        let mut kinds = HashMap::new();

        for v in &spec.continuous {
            kinds.insert(v.name.clone(), VariableKind::Continuous);
            forest.set_bounds(&v.name, v.min, v.max);
        }
        for b in &spec.boolean {
            kinds.insert(b.clone(), VariableKind::Boolean);
            forest.register_bool_var(b);
            forest.register_bool_var(&primed(b));
        }
        for i in &spec.intermediate {
            kinds.insert(i.clone(), VariableKind::Intermediate);
        }
        for o in &spec.observation {
            kinds.insert(o.clone(), VariableKind::Observation);
        }

        let mut actions = spec
            .actions
            .iter()
            .map(|a| Action::build(&mut forest, a, |v| kinds.get(v).copied()))
            .collect::<Result<Vec<_>>>()?;
        actions.sort_by(|a, b| a.name.cmp(&b.name));

        let constraints = spec
            .constraints
            .iter()
            .map(|c| forest.build_canonical(c))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Loaded problem: {} actions, {} constraints, {} forest nodes",
            actions.len(),
            constraints.len(),
            forest.len()
        );

        Ok(Self {
            forest,
            model: Model {
                continuous: spec.continuous.clone(),
                boolean: spec.boolean.clone(),
                intermediate: spec.intermediate.clone(),
                observation: spec.observation.clone(),
                actions,
                constraints,
                discount: spec.discount,
                iterations: spec.iterations,
                kinds,
            },
        })
    }

    /// Split borrow of the forest and the model
    pub fn parts(&mut self) -> (&mut Forest, &Model) {
        (&mut self.forest, &self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsdp_core::parse_problem;

    const TWO_ACTIONS: &str = r"
        cvariables (x) min-values (0) max-values (10)
        bvariables (s) ivariables () ovariables ()
        action zeta s' ([s]) x' ([x]) observation reward ([1]) endaction
        action alpha s' ([s]) x' ([x + 1]) observation reward ([x]) endaction
        constraint ([x < 10] ([1]) ([0])) endconstraint
        discount 0.5 iterations 2
    ";

    #[test]
    fn test_actions_sorted_by_name() {
        let ctx = SolverContext::from_spec(&parse_problem(TWO_ACTIONS).unwrap()).unwrap();
        let names: Vec<&str> = ctx.model.actions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(ctx.model.constraints.len(), 1);
    }

    #[test]
    fn test_kinds_and_bounds() {
        let ctx = SolverContext::from_spec(&parse_problem(TWO_ACTIONS).unwrap()).unwrap();
        assert_eq!(ctx.model.kind_of("x"), Some(VariableKind::Continuous));
        assert_eq!(ctx.model.kind_of("s"), Some(VariableKind::Boolean));
        assert_eq!(ctx.model.kind_of("nope"), None);
        assert!(ctx.model.fully_bounded());
        assert_eq!(ctx.forest.bounds("x"), (Some(0.0), Some(10.0)));
        assert!(ctx.forest.is_bool_var("s'"));
    }
}
