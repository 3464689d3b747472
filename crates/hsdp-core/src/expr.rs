//! Arithmetic expressions and branch tests as they appear in problem files
//!
//! Leaves of a piecewise diagram hold an [`ArithExpr`]; internal nodes hold a
//! [`DecisionExpr`]. Both are parsed from the text between `[` and `]`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HsdpError, Result};

/// Largest exponent accepted by `^`
const MAX_EXPONENT: f64 = 64.0;

/// Closed set of arithmetic expression shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArithExpr {
    Const(f64),
    Var(String),
    Sum(Vec<ArithExpr>),
    Prod(Vec<ArithExpr>),
}

impl ArithExpr {
    pub fn var(name: impl Into<String>) -> Self {
        ArithExpr::Var(name.into())
    }

    /// Collect every variable name referenced by this expression
    pub fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            ArithExpr::Const(_) => {}
            ArithExpr::Var(v) => {
                out.insert(v.clone());
            }
            ArithExpr::Sum(terms) | ArithExpr::Prod(terms) => {
                for t in terms {
                    t.collect_vars(out);
                }
            }
        }
    }

    /// Constant value if the expression contains no variables
    pub fn as_const(&self) -> Option<f64> {
        match self {
            ArithExpr::Const(c) => Some(*c),
            ArithExpr::Var(_) => None,
            ArithExpr::Sum(terms) => terms
                .iter()
                .try_fold(0.0, |acc, t| t.as_const().map(|c| acc + c)),
            ArithExpr::Prod(terms) => terms
                .iter()
                .try_fold(1.0, |acc, t| t.as_const().map(|c| acc * c)),
        }
    }

    fn negate(self) -> Self {
        match self {
            ArithExpr::Const(c) => ArithExpr::Const(-c),
            other => ArithExpr::Prod(vec![ArithExpr::Const(-1.0), other]),
        }
    }
}

impl fmt::Display for ArithExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithExpr::Const(c) => write!(f, "{c}"),
            ArithExpr::Var(v) => write!(f, "{v}"),
            ArithExpr::Sum(terms) => {
                write!(f, "(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            ArithExpr::Prod(terms) => {
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " * ")?;
                    }
                    write!(f, "{t}")?;
                }
                Ok(())
            }
        }
    }
}

/// Comparison operator inside a branch test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "==",
        };
        f.write_str(s)
    }
}

/// Branch test of an internal diagram node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionExpr {
    /// Bare boolean variable
    Bool(String),
    Compare {
        lhs: ArithExpr,
        op: CmpOp,
        rhs: ArithExpr,
    },
    /// Conjunction, expanded into nested branches when built
    And(Vec<DecisionExpr>),
}

impl fmt::Display for DecisionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionExpr::Bool(v) => write!(f, "{v}"),
            DecisionExpr::Compare { lhs, op, rhs } => write!(f, "{lhs} {op} {rhs}"),
            DecisionExpr::And(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{p}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

fn lex(src: &str, line: usize) -> Result<Vec<Tok>> {
    let chars: Vec<char> = src.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal.parse::<f64>().map_err(|_| HsdpError::InvalidNumber {
                line,
                literal: literal.clone(),
                context: format!("in expression [{src}]"),
            })?;
            toks.push(Tok::Num(value));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            while i < chars.len() && chars[i] == '\'' {
                i += 1;
            }
            toks.push(Tok::Ident(chars[start..i].iter().collect()));
            continue;
        }
        let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
        let op = match two.as_str() {
            ">=" => Some(">="),
            "<=" => Some("<="),
            "==" => Some("=="),
            "&&" => Some("&"),
            _ => None,
        };
        if let Some(op) = op {
            toks.push(Tok::Op(op));
            i += 2;
            continue;
        }
        let tok = match c {
            '+' => Tok::Op("+"),
            '-' => Tok::Op("-"),
            '*' => Tok::Op("*"),
            '/' => Tok::Op("/"),
            '>' => Tok::Op(">"),
            '<' => Tok::Op("<"),
            '=' => Tok::Op("=="),
            '&' => Tok::Op("&"),
            '^' => Tok::Op("^"),
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            other => {
                return Err(HsdpError::malformed(
                    line,
                    other.to_string(),
                    format!("arithmetic token in [{src}]"),
                ))
            }
        };
        toks.push(tok);
        i += 1;
    }

    Ok(toks)
}

struct ExprParser<'a> {
    toks: Vec<Tok>,
    pos: usize,
    line: usize,
    src: &'a str,
}

impl<'a> ExprParser<'a> {
    fn new(src: &'a str, line: usize) -> Result<Self> {
        Ok(Self {
            toks: lex(src, line)?,
            pos: 0,
            line,
            src,
        })
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, expected: &str) -> HsdpError {
        let found = self
            .peek()
            .map_or_else(|| "end of expression".to_string(), |t| format!("{t:?}"));
        HsdpError::malformed(self.line, found, format!("{expected} in [{}]", self.src))
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.toks.len() {
            Ok(())
        } else {
            Err(self.error("end of expression"))
        }
    }

    fn decision(&mut self) -> Result<DecisionExpr> {
        let mut parts = vec![self.comparison()?];
        while self.eat_op("&") {
            parts.push(self.comparison()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            DecisionExpr::And(parts)
        })
    }

    fn comparison(&mut self) -> Result<DecisionExpr> {
        let lhs = self.sum()?;
        let op = match self.peek() {
            Some(Tok::Op(">")) => CmpOp::Gt,
            Some(Tok::Op(">=")) => CmpOp::Ge,
            Some(Tok::Op("<")) => CmpOp::Lt,
            Some(Tok::Op("<=")) => CmpOp::Le,
            Some(Tok::Op("==")) => CmpOp::Eq,
            _ => {
                return match lhs {
                    ArithExpr::Var(v) => Ok(DecisionExpr::Bool(v)),
                    _ => Err(self.error("comparison operator")),
                }
            }
        };
        self.pos += 1;
        let rhs = self.sum()?;
        Ok(DecisionExpr::Compare { lhs, op, rhs })
    }

    fn sum(&mut self) -> Result<ArithExpr> {
        let mut terms = vec![self.product()?];
        loop {
            if self.eat_op("+") {
                terms.push(self.product()?);
            } else if self.eat_op("-") {
                terms.push(self.product()?.negate());
            } else {
                break;
            }
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            ArithExpr::Sum(terms)
        })
    }

    fn product(&mut self) -> Result<ArithExpr> {
        let mut factors = vec![self.power()?];
        loop {
            if self.eat_op("*") {
                factors.push(self.power()?);
            } else if self.eat_op("/") {
                let divisor = self.power()?;
                match divisor.as_const() {
                    Some(c) if c != 0.0 => factors.push(ArithExpr::Const(1.0 / c)),
                    _ => return Err(self.error("non-zero constant divisor")),
                }
            } else {
                break;
            }
        }
        Ok(if factors.len() == 1 {
            factors.remove(0)
        } else {
            ArithExpr::Prod(factors)
        })
    }

    fn power(&mut self) -> Result<ArithExpr> {
        let base = self.unary()?;
        if !self.eat_op("^") {
            return Ok(base);
        }
        match self.peek().cloned() {
            Some(Tok::Num(n)) if (1.0..=MAX_EXPONENT).contains(&n) && n.fract() == 0.0 => {
                self.pos += 1;
                Ok(ArithExpr::Prod(vec![base; n as usize]))
            }
            _ => Err(self.error("integer exponent between 1 and 64")),
        }
    }

    fn unary(&mut self) -> Result<ArithExpr> {
        if self.eat_op("-") {
            return Ok(self.unary()?.negate());
        }
        if self.eat_op("+") {
            return self.unary();
        }
        match self.peek().cloned() {
            Some(Tok::Num(n)) => {
                self.pos += 1;
                Ok(ArithExpr::Const(n))
            }
            Some(Tok::Ident(name)) => {
                self.pos += 1;
                Ok(ArithExpr::Var(name))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.sum()?;
                if self.peek() != Some(&Tok::RParen) {
                    return Err(self.error("')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => Err(self.error("number, variable or '('")),
        }
    }
}

/// Parse the contents of a leaf bracket, e.g. `time + 600`
pub fn parse_expr(src: &str, line: usize) -> Result<ArithExpr> {
    let mut p = ExprParser::new(src, line)?;
    let expr = p.sum()?;
    p.finish()?;
    Ok(expr)
}

/// Parse the contents of a branch-test bracket, e.g. `energy > 0.6 & p1 == 1`
pub fn parse_decision(src: &str, line: usize) -> Result<DecisionExpr> {
    let mut p = ExprParser::new(src, line)?;
    let dec = p.decision()?;
    p.finish()?;
    Ok(dec)
}
