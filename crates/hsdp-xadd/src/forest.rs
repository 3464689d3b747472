//! Shared canonical diagram forest
//!
//! Every diagram lives in one hash-consed arena owned by a [`Forest`] and is
//! addressed by a [`DiagramId`]. Nodes are immutable once interned. Handles
//! stay valid until [`Forest::flush_caches`] reclaims nodes that are not
//! reachable from the special (live) roots; using a reclaimed handle yields
//! [`HsdpError::StaleHandle`].
//!
//! Decisions are ordered by their registration index. A diagram is canonical
//! when decision indices strictly increase along every path and no node has
//! identical children.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};
use tracing::debug;

use hsdp_core::{CmpOp, DecisionExpr, DiagramSpec, HsdpError, Result};

use crate::decision::{Decision, Normalized};
use crate::polynomial::Polynomial;

/// Branch counts above this are reported as overflow
pub const MAX_BRANCH_COUNT: u64 = 10_000_000;

/// Stable handle to a node in the forest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiagramId(pub u32);

impl fmt::Display for DiagramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Closed node variant set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Terminal(Polynomial),
    Internal {
        decision: usize,
        low: DiagramId,
        high: DiagramId,
    },
}

/// Binary operators accepted by [`Forest::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    Sum,
    Minus,
    Prod,
    Max,
    Min,
}

pub struct Forest {
    nodes: HashMap<DiagramId, Node>,
    unique: HashMap<Node, DiagramId>,
    next_id: u32,
    decisions: Vec<Decision>,
    decision_index: HashMap<Decision, usize>,
    bool_vars: HashSet<String>,
    bounds: HashMap<String, (Option<f64>, Option<f64>)>,
    special: HashSet<DiagramId>,
    apply_cache: HashMap<(Op, DiagramId, DiagramId), DiagramId>,
    canonical_cache: HashMap<DiagramId, DiagramId>,
    zero: DiagramId,
    one: DiagramId,
}

impl Forest {
    pub fn new() -> Self {
        let mut forest = Self {
            nodes: HashMap::new(),
            unique: HashMap::new(),
            next_id: 0,
            decisions: Vec::new(),
            decision_index: HashMap::new(),
            bool_vars: HashSet::new(),
            bounds: HashMap::new(),
            special: HashSet::new(),
            apply_cache: HashMap::new(),
            canonical_cache: HashMap::new(),
            zero: DiagramId(0),
            one: DiagramId(0),
        };
        forest.zero = forest.terminal(Polynomial::zero());
        forest.one = forest.terminal(Polynomial::constant(1.0));
        forest
    }

    /// Number of nodes currently held by the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn zero(&self) -> DiagramId {
        self.zero
    }

    pub fn one(&self) -> DiagramId {
        self.one
    }

    // ------------------------------------------------------------------
    // Variables and decisions
    // ------------------------------------------------------------------

    /// Register a boolean variable; its decision takes the next order slot
    pub fn register_bool_var(&mut self, name: &str) -> usize {
        self.bool_vars.insert(name.to_string());
        self.decision_id(Decision::Bool(name.to_string()))
    }

    pub fn is_bool_var(&self, name: &str) -> bool {
        self.bool_vars.contains(name)
    }

    pub fn set_bounds(&mut self, var: &str, min: Option<f64>, max: Option<f64>) {
        self.bounds.insert(var.to_string(), (min, max));
    }

    pub fn bounds(&self, var: &str) -> (Option<f64>, Option<f64>) {
        self.bounds.get(var).copied().unwrap_or((None, None))
    }

    pub fn decision(&self, index: usize) -> Option<&Decision> {
        self.decisions.get(index)
    }

    fn decision_id(&mut self, decision: Decision) -> usize {
        if let Some(&idx) = self.decision_index.get(&decision) {
            return idx;
        }
        let idx = self.decisions.len();
        self.decisions.push(decision.clone());
        self.decision_index.insert(decision, idx);
        idx
    }

    fn bool_decision(&self, var: &str) -> Option<usize> {
        self.decision_index.get(&Decision::Bool(var.to_string())).copied()
    }

    // ------------------------------------------------------------------
    // Node access and construction
    // ------------------------------------------------------------------

    pub fn node(&self, id: DiagramId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(HsdpError::StaleHandle(id.0))
    }

    fn children(&self, id: DiagramId) -> Result<Option<(usize, DiagramId, DiagramId)>> {
        Ok(match self.node(id)? {
            Node::Terminal(_) => None,
            Node::Internal {
                decision,
                low,
                high,
            } => Some((*decision, *low, *high)),
        })
    }

    fn top(&self, id: DiagramId) -> Result<usize> {
        Ok(self.children(id)?.map_or(usize::MAX, |(d, _, _)| d))
    }

    fn intern(&mut self, node: Node) -> DiagramId {
        if let Some(&id) = self.unique.get(&node) {
            return id;
        }
        let id = DiagramId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node.clone());
        self.unique.insert(node, id);
        id
    }

    pub fn terminal(&mut self, p: Polynomial) -> DiagramId {
        self.intern(Node::Terminal(p))
    }

    pub fn constant(&mut self, c: f64) -> DiagramId {
        self.terminal(Polynomial::constant(c))
    }

    /// Intern a branch node as given. The result may violate the decision
    /// order; pass it through [`Forest::make_canonical`] before relying on it.
    pub fn internal_node(&mut self, decision: usize, low: DiagramId, high: DiagramId) -> DiagramId {
        if low == high {
            return low;
        }
        self.intern(Node::Internal {
            decision,
            low,
            high,
        })
    }

    /// Canonical if-then-else on `decision` over canonical children
    fn make_node(&mut self, decision: usize, low: DiagramId, high: DiagramId) -> Result<DiagramId> {
        if low == high {
            return Ok(low);
        }
        if self.top(low)? > decision && self.top(high)? > decision {
            return Ok(self.internal_node(decision, low, high));
        }
        let (zero, one) = (self.zero, self.one);
        let indicator = self.internal_node(decision, zero, one);
        let complement = self.internal_node(decision, one, zero);
        let h = self.apply(indicator, high, Op::Prod)?;
        let l = self.apply(complement, low, Op::Prod)?;
        self.apply(h, l, Op::Sum)
    }

    /// Branch on `p > 0` (`strict`) or `p >= 0`, folding constant tests and
    /// flipped normal forms
    fn branch_inequality(
        &mut self,
        p: &Polynomial,
        strict: bool,
        high: DiagramId,
        low: DiagramId,
    ) -> Result<DiagramId> {
        match Decision::inequality(p, strict) {
            Normalized::Constant(true) => Ok(high),
            Normalized::Constant(false) => Ok(low),
            Normalized::Test { decision, flipped } => {
                let idx = self.decision_id(decision);
                if flipped {
                    self.make_node(idx, high, low)
                } else {
                    self.make_node(idx, low, high)
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Building from a piecewise specification
    // ------------------------------------------------------------------

    /// Build a canonical diagram from a parsed piecewise function
    pub fn build_canonical(&mut self, spec: &DiagramSpec) -> Result<DiagramId> {
        match spec {
            DiagramSpec::Leaf(expr) => self.build_leaf(Polynomial::from_expr(expr)),
            DiagramSpec::Branch { test, high, low } => {
                let h = self.build_canonical(high)?;
                let l = self.build_canonical(low)?;
                self.build_test(test, h, l)
            }
        }
    }

    /// Boolean variables inside a leaf become branches on that variable
    fn build_leaf(&mut self, p: Polynomial) -> Result<DiagramId> {
        let bool_var = p.vars().into_iter().find(|v| self.is_bool_var(v));
        let Some(b) = bool_var else {
            return Ok(self.terminal(p));
        };
        let idx = self.register_bool_var(&b);
        let fix = |value: f64| {
            let mut subs = HashMap::new();
            subs.insert(b.clone(), Polynomial::constant(value));
            p.substitute(&subs)
        };
        let (p_high, p_low) = (fix(1.0), fix(0.0));
        let high = self.build_leaf(p_high)?;
        let low = self.build_leaf(p_low)?;
        self.make_node(idx, low, high)
    }

    fn build_test(&mut self, test: &DecisionExpr, high: DiagramId, low: DiagramId) -> Result<DiagramId> {
        match test {
            DecisionExpr::Bool(v) => {
                if !self.is_bool_var(v) {
                    return Err(HsdpError::UnknownVariable(format!(
                        "{v} (used as a boolean test)"
                    )));
                }
                let idx = self.register_bool_var(v);
                self.make_node(idx, low, high)
            }
            DecisionExpr::Compare { lhs, op, rhs } => {
                let l = Polynomial::from_expr(lhs);
                let r = Polynomial::from_expr(rhs);
                if *op == CmpOp::Eq {
                    return self.build_equality(&l, &r, high, low);
                }
                let diff = match op {
                    CmpOp::Gt | CmpOp::Ge => l.sub(&r),
                    _ => r.sub(&l),
                };
                if let Some(b) = diff.vars().into_iter().find(|v| self.is_bool_var(v)) {
                    return Err(HsdpError::Diagram(format!(
                        "boolean variable {b} used in an inequality: {test}"
                    )));
                }
                let strict = matches!(op, CmpOp::Gt | CmpOp::Lt);
                self.branch_inequality(&diff, strict, high, low)
            }
            DecisionExpr::And(parts) => {
                let mut current = high;
                for part in parts.iter().rev() {
                    current = self.build_test(part, current, low)?;
                }
                Ok(current)
            }
        }
    }

    /// `b == 1` / `b == 0` on a boolean variable
    fn build_equality(
        &mut self,
        l: &Polynomial,
        r: &Polynomial,
        high: DiagramId,
        low: DiagramId,
    ) -> Result<DiagramId> {
        let (var, value) = match (l.as_single_var(), r.as_constant(), r.as_single_var(), l.as_constant()) {
            (Some(v), Some(c), _, _) | (_, _, Some(v), Some(c)) => (v.to_string(), c),
            _ => {
                return Err(HsdpError::Diagram(format!(
                    "equality is only supported between a boolean variable and 0/1: {l} == {r}"
                )))
            }
        };
        if !self.is_bool_var(&var) {
            return Err(HsdpError::UnknownVariable(format!("{var} (compared with ==)")));
        }
        let idx = self.register_bool_var(&var);
        if value == 1.0 {
            self.make_node(idx, low, high)
        } else if value == 0.0 {
            self.make_node(idx, high, low)
        } else {
            Err(HsdpError::Diagram(format!(
                "boolean variable {var} compared with {value}"
            )))
        }
    }

    // ------------------------------------------------------------------
    // Algebra
    // ------------------------------------------------------------------

    fn shortcut(&self, a: DiagramId, b: DiagramId, op: Op) -> Option<DiagramId> {
        match op {
            Op::Prod if a == self.zero || b == self.zero => Some(self.zero),
            Op::Prod if a == self.one => Some(b),
            Op::Prod if b == self.one => Some(a),
            Op::Sum if a == self.zero => Some(b),
            Op::Sum if b == self.zero => Some(a),
            Op::Minus if b == self.zero => Some(a),
            Op::Minus if a == b => Some(self.zero),
            Op::Max | Op::Min if a == b => Some(a),
            _ => None,
        }
    }

    /// Combine two diagrams pointwise
    pub fn apply(&mut self, a: DiagramId, b: DiagramId, op: Op) -> Result<DiagramId> {
        if let Some(r) = self.shortcut(a, b, op) {
            // still surface stale handles
            self.node(a)?;
            self.node(b)?;
            return Ok(r);
        }
        if let Some(&r) = self.apply_cache.get(&(op, a, b)) {
            return Ok(r);
        }

        let ca = self.children(a)?;
        let cb = self.children(b)?;
        let result = if ca.is_none() && cb.is_none() {
            let p = self.terminal_poly(a)?.clone();
            let q = self.terminal_poly(b)?.clone();
            self.apply_terminals(&p, &q, op)?
        } else {
            let da = ca.map_or(usize::MAX, |(d, _, _)| d);
            let db = cb.map_or(usize::MAX, |(d, _, _)| d);
            let d = da.min(db);
            let (a_low, a_high) = match ca {
                Some((dd, lo, hi)) if dd == d => (lo, hi),
                _ => (a, a),
            };
            let (b_low, b_high) = match cb {
                Some((dd, lo, hi)) if dd == d => (lo, hi),
                _ => (b, b),
            };
            let low = self.apply(a_low, b_low, op)?;
            let high = self.apply(a_high, b_high, op)?;
            self.make_node(d, low, high)?
        };

        self.apply_cache.insert((op, a, b), result);
        Ok(result)
    }

    fn terminal_poly(&self, id: DiagramId) -> Result<&Polynomial> {
        match self.node(id)? {
            Node::Terminal(p) => Ok(p),
            Node::Internal { .. } => Err(HsdpError::Diagram(format!("{id} is not a terminal"))),
        }
    }

    fn apply_terminals(&mut self, p: &Polynomial, q: &Polynomial, op: Op) -> Result<DiagramId> {
        match op {
            Op::Sum => Ok(self.terminal(p.add(q))),
            Op::Minus => Ok(self.terminal(p.sub(q))),
            Op::Prod => Ok(self.terminal(p.mul(q))),
            Op::Max | Op::Min => {
                // p - q > 0 selects p for max, q for min
                let diff = p.sub(q);
                let (when_pos, otherwise) = if op == Op::Max { (p, q) } else { (q, p) };
                let high = self.terminal(when_pos.clone());
                let low = self.terminal(otherwise.clone());
                self.branch_inequality(&diff, true, high, low)
            }
        }
    }

    /// Combine a diagram with a scalar
    pub fn scalar_op(&mut self, id: DiagramId, value: f64, op: Op) -> Result<DiagramId> {
        let c = self.constant(value);
        self.apply(id, c, op)
    }

    /// Fix a boolean variable to true (`high`) or false and drop its tests
    pub fn restrict(&mut self, id: DiagramId, var: &str, high: bool) -> Result<DiagramId> {
        let Some(idx) = self.bool_decision(var) else {
            self.node(id)?;
            return Ok(id);
        };
        let mut memo = HashMap::new();
        self.restrict_rec(id, idx, high, &mut memo)
    }

    fn restrict_rec(
        &mut self,
        id: DiagramId,
        idx: usize,
        high: bool,
        memo: &mut HashMap<DiagramId, DiagramId>,
    ) -> Result<DiagramId> {
        if let Some(&r) = memo.get(&id) {
            return Ok(r);
        }
        let result = match self.children(id)? {
            None => id,
            Some((d, lo, hi)) if d == idx => {
                let next = if high { hi } else { lo };
                self.restrict_rec(next, idx, high, memo)?
            }
            Some((d, lo, hi)) => {
                let l = self.restrict_rec(lo, idx, high, memo)?;
                let h = self.restrict_rec(hi, idx, high, memo)?;
                self.make_node(d, l, h)?
            }
        };
        memo.insert(id, result);
        Ok(result)
    }

    /// Substitute variables by polynomials in every decision and leaf.
    ///
    /// A boolean variable may be renamed (bare variable) or fixed (0 or 1).
    /// The result is not necessarily canonical.
    pub fn substitute(&mut self, id: DiagramId, subs: &HashMap<String, Polynomial>) -> Result<DiagramId> {
        let mut memo = HashMap::new();
        self.substitute_rec(id, subs, &mut memo)
    }

    fn substitute_rec(
        &mut self,
        id: DiagramId,
        subs: &HashMap<String, Polynomial>,
        memo: &mut HashMap<DiagramId, DiagramId>,
    ) -> Result<DiagramId> {
        if let Some(&r) = memo.get(&id) {
            return Ok(r);
        }
        let result = match self.node(id)?.clone() {
            Node::Terminal(p) => self.terminal(p.substitute(subs)),
            Node::Internal {
                decision,
                low,
                high,
            } => {
                let l = self.substitute_rec(low, subs, memo)?;
                let h = self.substitute_rec(high, subs, memo)?;
                let dec = self.decisions[decision].clone();
                match dec {
                    Decision::Bool(v) => match subs.get(&v) {
                        None => self.internal_node(decision, l, h),
                        Some(p) => {
                            if let Some(renamed) = p.as_single_var() {
                                let renamed = renamed.to_string();
                                let idx = self.register_bool_var(&renamed);
                                self.internal_node(idx, l, h)
                            } else {
                                match p.as_constant() {
                                    Some(c) if c == 1.0 => h,
                                    Some(c) if c == 0.0 => l,
                                    _ => {
                                        return Err(HsdpError::Diagram(format!(
                                            "cannot substitute {p} for boolean variable {v}"
                                        )))
                                    }
                                }
                            }
                        }
                    },
                    Decision::Positive(ref p) | Decision::NonNegative(ref p) => {
                        let strict = matches!(dec, Decision::Positive(_));
                        match Decision::inequality(&p.substitute(subs), strict) {
                            Normalized::Constant(true) => h,
                            Normalized::Constant(false) => l,
                            Normalized::Test { decision, flipped } => {
                                let idx = self.decision_id(decision);
                                if flipped {
                                    self.internal_node(idx, h, l)
                                } else {
                                    self.internal_node(idx, l, h)
                                }
                            }
                        }
                    }
                }
            }
        };
        memo.insert(id, result);
        Ok(result)
    }

    /// Restore decision order and reduction after a raw rebuild
    pub fn make_canonical(&mut self, id: DiagramId) -> Result<DiagramId> {
        if let Some(&c) = self.canonical_cache.get(&id) {
            return Ok(c);
        }
        let result = match self.children(id)? {
            None => id,
            Some((d, lo, hi)) => {
                let l = self.make_canonical(lo)?;
                let h = self.make_canonical(hi)?;
                self.make_node(d, l, h)?
            }
        };
        self.canonical_cache.insert(id, result);
        self.canonical_cache.insert(result, result);
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Evaluate at a point assignment
    pub fn evaluate(
        &self,
        id: DiagramId,
        bools: &HashMap<String, bool>,
        conts: &HashMap<String, f64>,
    ) -> Result<f64> {
        let mut current = id;
        loop {
            match self.node(current)? {
                Node::Terminal(p) => return p.evaluate(conts),
                Node::Internal {
                    decision,
                    low,
                    high,
                } => {
                    current = if self.decisions[*decision].evaluate(bools, conts)? {
                        *high
                    } else {
                        *low
                    };
                }
            }
        }
    }

    fn reachable(&self, id: DiagramId) -> Result<Vec<DiagramId>> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            order.push(cur);
            if let Some((_, lo, hi)) = self.children(cur)? {
                stack.push(lo);
                stack.push(hi);
            }
        }
        Ok(order)
    }

    /// Number of distinct nodes reachable from `id`
    pub fn node_count(&self, id: DiagramId) -> Result<usize> {
        Ok(self.reachable(id)?.len())
    }

    /// Number of root-to-leaf paths, `None` once it exceeds [`MAX_BRANCH_COUNT`]
    pub fn branch_count(&self, id: DiagramId) -> Result<Option<u64>> {
        let mut memo: HashMap<DiagramId, u64> = HashMap::new();
        let count = self.branch_count_rec(id, &mut memo)?;
        Ok((count <= MAX_BRANCH_COUNT).then_some(count))
    }

    fn branch_count_rec(&self, id: DiagramId, memo: &mut HashMap<DiagramId, u64>) -> Result<u64> {
        if let Some(&c) = memo.get(&id) {
            return Ok(c);
        }
        let count = match self.children(id)? {
            None => 1,
            Some((_, lo, hi)) => self
                .branch_count_rec(lo, memo)?
                .saturating_add(self.branch_count_rec(hi, memo)?),
        };
        memo.insert(id, count);
        Ok(count)
    }

    /// Every variable tested or used in a leaf
    pub fn collect_vars(&self, id: DiagramId) -> Result<BTreeSet<String>> {
        let mut vars = BTreeSet::new();
        for cur in self.reachable(id)? {
            match self.node(cur)? {
                Node::Terminal(p) => vars.extend(p.vars()),
                Node::Internal { decision, .. } => vars.extend(self.decisions[*decision].vars()),
            }
        }
        Ok(vars)
    }

    /// Indented textual rendering, high branch first
    pub fn describe(&self, id: DiagramId) -> Result<String> {
        let mut out = String::new();
        self.describe_rec(id, 0, &mut out)?;
        Ok(out)
    }

    fn describe_rec(&self, id: DiagramId, depth: usize, out: &mut String) -> Result<()> {
        let pad = "   ".repeat(depth);
        match self.node(id)? {
            Node::Terminal(p) => {
                let _ = writeln!(out, "{pad}[{p}]");
            }
            Node::Internal {
                decision,
                low,
                high,
            } => {
                let _ = writeln!(out, "{pad}( [{}]", self.decisions[*decision]);
                self.describe_rec(*high, depth + 1, out)?;
                self.describe_rec(*low, depth + 1, out)?;
                let _ = writeln!(out, "{pad})");
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Liveness and reclamation
    // ------------------------------------------------------------------

    pub fn add_special_node(&mut self, id: DiagramId) {
        self.special.insert(id);
    }

    pub fn clear_special_nodes(&mut self) {
        self.special.clear();
    }

    pub fn special_nodes(&self) -> impl Iterator<Item = DiagramId> + '_ {
        self.special.iter().copied()
    }

    /// Reclaim every node not reachable from a special root and clear all
    /// internal memo tables. Returns the number of nodes reclaimed.
    pub fn flush_caches(&mut self) -> usize {
        let before = self.nodes.len();
        let mut live: HashSet<DiagramId> = HashSet::new();
        let mut stack: Vec<DiagramId> = self.special.iter().copied().collect();
        stack.push(self.zero);
        stack.push(self.one);

        while let Some(id) = stack.pop() {
            if !live.insert(id) {
                continue;
            }
            if let Some(Node::Internal { low, high, .. }) = self.nodes.get(&id) {
                stack.push(*low);
                stack.push(*high);
            }
        }

        self.nodes.retain(|id, _| live.contains(id));
        self.unique.retain(|_, id| live.contains(id));
        self.apply_cache.clear();
        self.canonical_cache.clear();

        let reclaimed = before - self.nodes.len();
        debug!("Forest flush reclaimed {} of {} nodes", reclaimed, before);
        reclaimed
    }
}

impl Default for Forest {
    fn default() -> Self {
        Self::new()
    }
}
