//! Branch decisions of internal nodes

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use hsdp_core::{HsdpError, Result};

use crate::polynomial::Polynomial;

/// Test carried by an internal node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Boolean variable is true
    Bool(String),
    /// Polynomial is strictly positive; leading coefficient is always +1
    Positive(Polynomial),
    /// Polynomial is zero or positive; leading coefficient is always +1
    NonNegative(Polynomial),
}

/// Result of normalising an inequality test
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Constant(bool),
    Test { decision: Decision, flipped: bool },
}

impl Decision {
    /// Normalise `p > 0`
    pub fn positive(p: &Polynomial) -> Normalized {
        Self::inequality(p, true)
    }

    /// Normalise `p >= 0`
    pub fn non_negative(p: &Polynomial) -> Normalized {
        Self::inequality(p, false)
    }

    /// Normalise `p > 0` (`strict`) or `p >= 0`. A negative leading
    /// coefficient negates the test: `-q > 0` is `!(q >= 0)` and `-q >= 0` is
    /// `!(q > 0)`. The caller must then swap the branches.
    pub fn inequality(p: &Polynomial, strict: bool) -> Normalized {
        if let Some(c) = p.as_constant() {
            return Normalized::Constant(if strict { c > 0.0 } else { c >= 0.0 });
        }
        let (normalized, flipped) = p.normalize_leading();
        let decision = if strict != flipped {
            Decision::Positive(normalized)
        } else {
            Decision::NonNegative(normalized)
        };
        Normalized::Test { decision, flipped }
    }

    /// Tested polynomial and strictness of an inequality
    pub fn as_inequality(&self) -> Option<(&Polynomial, bool)> {
        match self {
            Decision::Bool(_) => None,
            Decision::Positive(p) => Some((p, true)),
            Decision::NonNegative(p) => Some((p, false)),
        }
    }

    pub fn vars(&self) -> BTreeSet<String> {
        match self {
            Decision::Bool(v) => std::iter::once(v.clone()).collect(),
            Decision::Positive(p) | Decision::NonNegative(p) => p.vars(),
        }
    }

    pub fn evaluate(
        &self,
        bools: &HashMap<String, bool>,
        conts: &HashMap<String, f64>,
    ) -> Result<bool> {
        match self {
            Decision::Bool(v) => bools
                .get(v)
                .copied()
                .ok_or_else(|| HsdpError::UnknownVariable(v.clone())),
            Decision::Positive(p) => Ok(p.evaluate(conts)? > 0.0),
            Decision::NonNegative(p) => Ok(p.evaluate(conts)? >= 0.0),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Bool(v) => write!(f, "{v}"),
            Decision::Positive(p) => write!(f, "{p} > 0"),
            Decision::NonNegative(p) => write!(f, "{p} >= 0"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_test_resolves() {
        assert_eq!(
            Decision::positive(&Polynomial::constant(2.0)),
            Normalized::Constant(true)
        );
        assert_eq!(
            Decision::positive(&Polynomial::constant(0.0)),
            Normalized::Constant(false)
        );
    }

    #[test]
    fn test_negative_lead_flips() {
        // 5 - x > 0  ==  not (x - 5 >= 0)
        let p = Polynomial::constant(5.0).sub(&Polynomial::var("x"));
        let x_minus_5 = Polynomial::var("x").add(&Polynomial::constant(-5.0));
        match Decision::positive(&p) {
            Normalized::Test { decision, flipped } => {
                assert!(flipped);
                assert_eq!(decision, Decision::NonNegative(x_minus_5.clone()));
            }
            other => panic!("unexpected {other:?}"),
        }
        // 5 - x >= 0  ==  not (x - 5 > 0)
        match Decision::non_negative(&p) {
            Normalized::Test { decision, flipped } => {
                assert!(flipped);
                assert_eq!(decision, Decision::Positive(x_minus_5));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_flipped_test_keeps_boundary() {
        let p = Polynomial::constant(5.0).sub(&Polynomial::var("x"));
        let bools = HashMap::new();
        for (x, strict) in [(4.0, true), (5.0, true), (6.0, true), (4.0, false), (5.0, false), (6.0, false)] {
            let conts: HashMap<String, f64> = [("x".to_string(), x)].into_iter().collect();
            let expected = if strict { 5.0 - x > 0.0 } else { 5.0 - x >= 0.0 };
            let Normalized::Test { decision, flipped } = Decision::inequality(&p, strict) else {
                panic!("expected a test");
            };
            assert_eq!(decision.evaluate(&bools, &conts).unwrap() != flipped, expected);
        }
    }

    #[test]
    fn test_constant_non_negative() {
        assert_eq!(
            Decision::non_negative(&Polynomial::constant(0.0)),
            Normalized::Constant(true)
        );
    }
}
