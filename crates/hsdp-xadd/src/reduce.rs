//! Infeasible-branch pruning
//!
//! Walks a diagram carrying an interval box over the continuous variables.
//! The box starts at the registered bounds and narrows along each path as
//! single-variable tests are passed. A linear test whose sign is fixed over
//! the current box keeps only its feasible branch.

use std::collections::HashMap;

use hsdp_core::Result;

use crate::decision::Decision;
use crate::forest::{DiagramId, Forest};
use crate::polynomial::Polynomial;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Interval {
    lo: f64,
    hi: f64,
}

impl Interval {
    const UNBOUNDED: Interval = Interval {
        lo: f64::NEG_INFINITY,
        hi: f64::INFINITY,
    };

    fn scaled(self, c: f64) -> Interval {
        if c >= 0.0 {
            Interval {
                lo: self.lo * c,
                hi: self.hi * c,
            }
        } else {
            Interval {
                lo: self.hi * c,
                hi: self.lo * c,
            }
        }
    }

    /// `p > 0` (`strict`) or `p >= 0` for every p in the range
    fn always_holds(self, strict: bool) -> bool {
        if strict {
            self.lo > 0.0
        } else {
            self.lo >= 0.0
        }
    }

    /// `p > 0` (`strict`) or `p >= 0` for no p in the range
    fn never_holds(self, strict: bool) -> bool {
        if strict {
            self.hi <= 0.0
        } else {
            self.hi < 0.0
        }
    }
}

type IntervalBox = Vec<(String, Interval)>;

fn fingerprint(boxed: &IntervalBox) -> Vec<(u64, u64)> {
    boxed
        .iter()
        .map(|(_, iv)| (iv.lo.to_bits(), iv.hi.to_bits()))
        .collect()
}

/// Range of a linear polynomial over the box; `None` if non-linear or if it
/// mentions a variable outside the box
fn linear_range(p: &Polynomial, boxed: &IntervalBox) -> Option<Interval> {
    if p.degree() > 1 {
        return None;
    }
    let mut total = Interval { lo: 0.0, hi: 0.0 };
    for (m, c) in p.terms() {
        let term = match m.factors() {
            [] => Interval { lo: c, hi: c },
            [(v, 1)] => {
                let (_, iv) = boxed.iter().find(|(name, _)| name == v)?;
                iv.scaled(c)
            }
            _ => return None,
        };
        total.lo += term.lo;
        total.hi += term.hi;
    }
    Some(total)
}

/// `x - c > 0` with unit coefficient, as (x, c)
fn single_var_threshold(p: &Polynomial) -> Option<(String, f64)> {
    if p.degree() != 1 {
        return None;
    }
    let mut var = None;
    for (m, c) in p.terms() {
        match m.factors() {
            [] => {}
            [(v, 1)] if var.is_none() && c == 1.0 => var = Some(v.clone()),
            _ => return None,
        }
    }
    var.map(|v| (v, -p.constant_term()))
}

impl Forest {
    /// Remove branches that cannot be reached given the variable bounds and
    /// the tests above them. Only linear tests are examined.
    pub fn reduce_lp(&mut self, id: DiagramId, vars: &[String]) -> Result<DiagramId> {
        let boxed: IntervalBox = vars
            .iter()
            .map(|v| {
                let (min, max) = self.bounds(v);
                let iv = Interval {
                    lo: min.unwrap_or(Interval::UNBOUNDED.lo),
                    hi: max.unwrap_or(Interval::UNBOUNDED.hi),
                };
                (v.clone(), iv)
            })
            .collect();
        let mut memo = HashMap::new();
        self.reduce_rec(id, &boxed, &mut memo)
    }

    fn reduce_rec(
        &mut self,
        id: DiagramId,
        boxed: &IntervalBox,
        memo: &mut HashMap<(DiagramId, Vec<(u64, u64)>), DiagramId>,
    ) -> Result<DiagramId> {
        let key = (id, fingerprint(boxed));
        if let Some(&r) = memo.get(&key) {
            return Ok(r);
        }

        let result = match self.node(id)?.clone() {
            crate::forest::Node::Terminal(_) => id,
            crate::forest::Node::Internal {
                decision,
                low,
                high,
            } => {
                let test = self.decision(decision).cloned();
                match test.as_ref().and_then(Decision::as_inequality) {
                    Some((p, strict)) => match linear_range(p, boxed) {
                        Some(range) if range.always_holds(strict) => {
                            self.reduce_rec(high, boxed, memo)?
                        }
                        Some(range) if range.never_holds(strict) => {
                            self.reduce_rec(low, boxed, memo)?
                        }
                        _ => {
                            let (high_box, low_box) = split_box(p, boxed);
                            let h = self.reduce_rec(high, &high_box, memo)?;
                            let l = self.reduce_rec(low, &low_box, memo)?;
                            self.rebuild(decision, l, h)?
                        }
                    },
                    None => {
                        let h = self.reduce_rec(high, boxed, memo)?;
                        let l = self.reduce_rec(low, boxed, memo)?;
                        self.rebuild(decision, l, h)?
                    }
                }
            }
        };

        memo.insert(key, result);
        Ok(result)
    }

    fn rebuild(&mut self, decision: usize, low: DiagramId, high: DiagramId) -> Result<DiagramId> {
        let raw = self.internal_node(decision, low, high);
        self.make_canonical(raw)
    }
}

/// Narrow the box for both outcomes of a single-variable threshold test.
/// Intervals stay closed, so the boundary is kept on both sides.
fn split_box(p: &Polynomial, boxed: &IntervalBox) -> (IntervalBox, IntervalBox) {
    let Some((var, threshold)) = single_var_threshold(p) else {
        return (boxed.clone(), boxed.clone());
    };
    let mut high = boxed.clone();
    let mut low = boxed.clone();
    if let Some((_, iv)) = high.iter_mut().find(|(name, _)| *name == var) {
        iv.lo = iv.lo.max(threshold);
    }
    if let Some((_, iv)) = low.iter_mut().find(|(name, _)| *name == var) {
        iv.hi = iv.hi.min(threshold);
    }
    (high, low)
}
