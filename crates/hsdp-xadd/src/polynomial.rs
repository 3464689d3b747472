//! Canonical polynomial leaves
//!
//! A [`Polynomial`] is a map from monomial to coefficient with zero
//! coefficients removed, so two equal polynomials have equal maps and hash
//! identically. Coefficients are snapped to a fixed number of significant
//! digits to keep leaves produced by different arithmetic orders identical.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

use hsdp_core::{ArithExpr, HsdpError, Result};

/// Coefficients below this magnitude are treated as zero
const ZERO_TOLERANCE: f64 = 1e-12;
const SIGNIFICANT_DIGITS: i32 = 12;

fn snap(c: f64) -> f64 {
    if c.abs() < ZERO_TOLERANCE || !c.is_finite() {
        return if c.is_finite() { 0.0 } else { c };
    }
    let magnitude = c.abs().log10().ceil() as i32;
    let scale = 10f64.powi(SIGNIFICANT_DIGITS - magnitude);
    let snapped = (c * scale).round() / scale;
    // normalise negative zero
    snapped + 0.0
}

/// Product of variables raised to positive integer powers, sorted by name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Monomial(Vec<(String, u32)>);

impl Monomial {
    pub fn one() -> Self {
        Self::default()
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self(vec![(name.into(), 1)])
    }

    pub fn is_one(&self) -> bool {
        self.0.is_empty()
    }

    pub fn degree(&self) -> u32 {
        self.0.iter().map(|(_, e)| e).sum()
    }

    pub fn factors(&self) -> &[(String, u32)] {
        &self.0
    }

    fn mul(&self, other: &Monomial) -> Monomial {
        let mut merged: BTreeMap<&str, u32> = BTreeMap::new();
        for (v, e) in self.0.iter().chain(other.0.iter()) {
            *merged.entry(v.as_str()).or_insert(0) += e;
        }
        Monomial(merged.into_iter().map(|(v, e)| (v.to_string(), e)).collect())
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (v, e)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "*")?;
            }
            if *e == 1 {
                write!(f, "{v}")?;
            } else {
                write!(f, "{v}^{e}")?;
            }
        }
        Ok(())
    }
}

/// Canonical multivariate polynomial
#[derive(Debug, Clone, Default)]
pub struct Polynomial {
    terms: BTreeMap<Monomial, f64>,
}

impl PartialEq for Polynomial {
    fn eq(&self, other: &Self) -> bool {
        self.terms.len() == other.terms.len()
            && self
                .terms
                .iter()
                .zip(other.terms.iter())
                .all(|((m1, c1), (m2, c2))| m1 == m2 && c1.to_bits() == c2.to_bits())
    }
}

impl Eq for Polynomial {}

impl Hash for Polynomial {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (m, c) in &self.terms {
            m.hash(state);
            c.to_bits().hash(state);
        }
    }
}

impl Polynomial {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(c: f64) -> Self {
        let mut p = Self::default();
        p.add_term(Monomial::one(), c);
        p
    }

    pub fn var(name: impl Into<String>) -> Self {
        let mut p = Self::default();
        p.add_term(Monomial::var(name), 1.0);
        p
    }

    fn add_term(&mut self, m: Monomial, c: f64) {
        let entry = self.terms.entry(m.clone()).or_insert(0.0);
        let sum = snap(*entry + c);
        if sum == 0.0 {
            self.terms.remove(&m);
        } else {
            *entry = sum;
        }
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, f64)> {
        self.terms.iter().map(|(m, c)| (m, *c))
    }

    pub fn from_expr(expr: &ArithExpr) -> Self {
        match expr {
            ArithExpr::Const(c) => Self::constant(*c),
            ArithExpr::Var(v) => Self::var(v.clone()),
            ArithExpr::Sum(terms) => terms
                .iter()
                .fold(Self::zero(), |acc, t| acc.add(&Self::from_expr(t))),
            ArithExpr::Prod(terms) => terms
                .iter()
                .fold(Self::constant(1.0), |acc, t| acc.mul(&Self::from_expr(t))),
        }
    }

    /// Normal-form expression: constant term first, then one term per
    /// monomial; a unit coefficient is omitted
    pub fn to_expr(&self) -> ArithExpr {
        let mut parts: Vec<ArithExpr> = self
            .terms
            .iter()
            .map(|(m, c)| {
                if m.is_one() {
                    return ArithExpr::Const(*c);
                }
                let mut factors: Vec<ArithExpr> = Vec::new();
                if *c != 1.0 {
                    factors.push(ArithExpr::Const(*c));
                }
                for (v, e) in m.factors() {
                    for _ in 0..*e {
                        factors.push(ArithExpr::Var(v.clone()));
                    }
                }
                if factors.len() == 1 {
                    factors.remove(0)
                } else {
                    ArithExpr::Prod(factors)
                }
            })
            .collect();

        match parts.len() {
            0 => ArithExpr::Const(0.0),
            1 => parts.remove(0),
            _ => ArithExpr::Sum(parts),
        }
    }

    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_term(m.clone(), *c);
        }
        out
    }

    pub fn sub(&self, other: &Polynomial) -> Polynomial {
        self.add(&other.scale(-1.0))
    }

    pub fn mul(&self, other: &Polynomial) -> Polynomial {
        let mut out = Polynomial::zero();
        for (m1, c1) in &self.terms {
            for (m2, c2) in &other.terms {
                out.add_term(m1.mul(m2), c1 * c2);
            }
        }
        out
    }

    pub fn scale(&self, factor: f64) -> Polynomial {
        let mut out = Polynomial::zero();
        for (m, c) in &self.terms {
            out.add_term(m.clone(), c * factor);
        }
        out
    }

    /// Replace each variable found in `subs` by its polynomial
    pub fn substitute(&self, subs: &HashMap<String, Polynomial>) -> Polynomial {
        let mut out = Polynomial::zero();
        for (m, c) in &self.terms {
            let mut term = Polynomial::constant(*c);
            for (v, e) in m.factors() {
                let base = subs.get(v).cloned().unwrap_or_else(|| Polynomial::var(v.clone()));
                for _ in 0..*e {
                    term = term.mul(&base);
                }
            }
            out = out.add(&term);
        }
        out
    }

    pub fn evaluate(&self, assign: &HashMap<String, f64>) -> Result<f64> {
        let mut total = 0.0;
        for (m, c) in &self.terms {
            let mut value = *c;
            for (v, e) in m.factors() {
                let x = assign
                    .get(v)
                    .ok_or_else(|| HsdpError::UnknownVariable(v.clone()))?;
                value *= x.powi(*e as i32);
            }
            total += value;
        }
        Ok(total)
    }

    pub fn vars(&self) -> BTreeSet<String> {
        self.terms
            .keys()
            .flat_map(|m| m.factors().iter().map(|(v, _)| v.clone()))
            .collect()
    }

    pub fn as_constant(&self) -> Option<f64> {
        match self.terms.len() {
            0 => Some(0.0),
            1 => self.terms.get(&Monomial::one()).copied(),
            _ => None,
        }
    }

    pub fn degree(&self) -> u32 {
        self.terms.keys().map(Monomial::degree).max().unwrap_or(0)
    }

    /// Coefficient of the constant monomial
    pub fn constant_term(&self) -> f64 {
        self.terms.get(&Monomial::one()).copied().unwrap_or(0.0)
    }

    /// `Some(name)` if this is exactly one variable with unit coefficient
    pub fn as_single_var(&self) -> Option<&str> {
        if self.terms.len() != 1 {
            return None;
        }
        let (m, c) = self.terms.iter().next()?;
        match m.factors() {
            [(v, 1)] if *c == 1.0 => Some(v.as_str()),
            _ => None,
        }
    }

    /// Scale so the first non-constant monomial has coefficient +1.
    /// Returns the scaled polynomial and whether the sign flipped.
    pub fn normalize_leading(&self) -> (Polynomial, bool) {
        let lead = self
            .terms
            .iter()
            .find(|(m, _)| !m.is_one())
            .map(|(_, c)| *c);
        match lead {
            Some(a) => (self.scale(1.0 / a), a < 0.0),
            None => (self.clone(), false),
        }
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, (m, c)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            if m.is_one() {
                write!(f, "{c}")?;
            } else if *c == 1.0 {
                write!(f, "{m}")?;
            } else {
                write!(f, "{c}*{m}")?;
            }
        }
        Ok(())
    }
}
