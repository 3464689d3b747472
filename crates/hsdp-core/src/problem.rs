//! Problem definition handed from the parser to the solver

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{ArithExpr, DecisionExpr};

/// Kind of a declared variable; fixed at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Continuous,
    Boolean,
    Intermediate,
    Observation,
}

/// Declared variable with optional bounds (continuous variables only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            min: None,
            max: None,
        }
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// Piecewise function as written in the problem file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagramSpec {
    Leaf(ArithExpr),
    Branch {
        test: DecisionExpr,
        high: Box<DiagramSpec>,
        low: Box<DiagramSpec>,
    },
}

impl DiagramSpec {
    pub fn leaf(expr: ArithExpr) -> Self {
        DiagramSpec::Leaf(expr)
    }

    pub fn constant(value: f64) -> Self {
        DiagramSpec::Leaf(ArithExpr::Const(value))
    }

    pub fn branch(test: DecisionExpr, high: DiagramSpec, low: DiagramSpec) -> Self {
        DiagramSpec::Branch {
            test,
            high: Box::new(high),
            low: Box::new(low),
        }
    }
}

impl fmt::Display for DiagramSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagramSpec::Leaf(e) => write!(f, "([{e}])"),
            DiagramSpec::Branch { test, high, low } => write!(f, "([{test}] {high} {low})"),
        }
    }
}

/// Action descriptor before diagrams are built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    /// Primed state variable -> transition function
    pub transitions: BTreeMap<String, DiagramSpec>,
    /// Observation variable -> generative function
    pub observations: BTreeMap<String, DiagramSpec>,
    pub reward: DiagramSpec,
}

/// Fully parsed problem file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemSpec {
    pub continuous: Vec<Variable>,
    pub boolean: Vec<String>,
    pub intermediate: Vec<String>,
    pub observation: Vec<String>,
    pub actions: Vec<ActionSpec>,
    pub constraints: Vec<DiagramSpec>,
    pub discount: f64,
    pub iterations: usize,
}

impl ProblemSpec {
    pub fn kind_of(&self, name: &str) -> Option<VariableKind> {
        if self.continuous.iter().any(|v| v.name == name) {
            Some(VariableKind::Continuous)
        } else if self.boolean.iter().any(|v| v == name) {
            Some(VariableKind::Boolean)
        } else if self.intermediate.iter().any(|v| v == name) {
            Some(VariableKind::Intermediate)
        } else if self.observation.iter().any(|v| v == name) {
            Some(VariableKind::Observation)
        } else {
            None
        }
    }
}

impl fmt::Display for ProblemSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |vars: &[String]| vars.join(", ");
        let bound = |b: Option<f64>| b.map_or_else(|| "x".to_string(), |v| v.to_string());

        writeln!(f, "Problem Definition:")?;
        writeln!(f, "===================")?;
        let cvars: Vec<String> = self.continuous.iter().map(|v| v.name.clone()).collect();
        writeln!(f, "CVars:       [{}]", names(&cvars))?;
        let mins: Vec<String> = self.continuous.iter().map(|v| bound(v.min)).collect();
        writeln!(f, "Min-values:  [{}]", mins.join(", "))?;
        let maxs: Vec<String> = self.continuous.iter().map(|v| bound(v.max)).collect();
        writeln!(f, "Max-values:  [{}]", maxs.join(", "))?;
        writeln!(f, "BVars:       [{}]", names(&self.boolean))?;
        writeln!(f, "IVars:       [{}]", names(&self.intermediate))?;
        writeln!(f, "OVars:       [{}]", names(&self.observation))?;
        writeln!(f, "Discount:    {}", self.discount)?;
        writeln!(f, "Iterations:  {}", self.iterations)?;
        writeln!(f, "Constraints ({}):", self.constraints.len())?;
        for c in &self.constraints {
            writeln!(f, "- {c}")?;
        }
        writeln!(f, "Actions ({}):", self.actions.len())?;
        for a in &self.actions {
            writeln!(f, "\n==> {}", a.name)?;
            for (var, dd) in &a.transitions {
                writeln!(f, "  {var} {dd}")?;
            }
            for (obs, dd) in &a.observations {
                writeln!(f, "  obs {obs} {dd}")?;
            }
            writeln!(f, "  reward {}", a.reward)?;
        }
        Ok(())
    }
}
