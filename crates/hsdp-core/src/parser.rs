//! Problem-file parser
//!
//! The file is a keyword-delimited sequence:
//!
//! ```text
//! cvariables (x y)
//! min-values (0 x)
//! max-values (10 x)
//! bvariables (s)
//! ivariables ()
//! ovariables (o)
//! action go
//!     x' ([x + 1])
//!     s' ([s])
//!     observation
//!     o ([2 * x + 1])
//!     reward ([s] ([1]) ([0]))
//! endaction
//! constraint ([x < 10] ([1]) ([0])) endconstraint
//! discount 0.9
//! iterations 3
//! ```
//!
//! Parenthesised groups become nested lists, bracketed text is kept verbatim
//! and handed to [`crate::expr`].

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::{HsdpError, Result};
use crate::expr::{parse_decision, parse_expr};
use crate::problem::{ActionSpec, DiagramSpec, ProblemSpec, Variable, VariableKind};

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Word(String, usize),
    Bracket(String, usize),
    List(Vec<Item>, usize),
}

impl Item {
    fn line(&self) -> usize {
        match self {
            Item::Word(_, l) | Item::Bracket(_, l) | Item::List(_, l) => *l,
        }
    }

    fn describe(&self) -> String {
        match self {
            Item::Word(w, _) => w.clone(),
            Item::Bracket(b, _) => format!("[{b}]"),
            Item::List(_, _) => "( ... )".to_string(),
        }
    }
}

/// Split the raw text into a flat sequence of top-level items
fn read_items(src: &str) -> Result<Vec<Item>> {
    let mut stack: Vec<(Vec<Item>, usize)> = vec![(Vec::new(), 1)];
    let mut chars = src.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '(' => stack.push((Vec::new(), line)),
            ')' => {
                let (items, open_line) = stack.pop().unwrap_or_default();
                match stack.last_mut() {
                    Some((parent, _)) => parent.push(Item::List(items, open_line)),
                    None => return Err(HsdpError::malformed(line, ")", "matching '('")),
                }
            }
            '[' => {
                let start = line;
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => {
                            if c == '\n' {
                                line += 1;
                            }
                            text.push(c);
                        }
                        None => return Err(HsdpError::malformed(start, "end of file", "']'")),
                    }
                }
                if let Some((top, _)) = stack.last_mut() {
                    top.push(Item::Bracket(text.trim().to_string(), start));
                }
            }
            ']' => return Err(HsdpError::malformed(line, "]", "matching '['")),
            _ => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_whitespace() || matches!(n, '(' | ')' | '[' | ']') {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                if let Some((top, _)) = stack.last_mut() {
                    top.push(Item::Word(word, line));
                }
            }
        }
    }

    if stack.len() != 1 {
        let open_line = stack.last().map_or(line, |(_, l)| *l);
        return Err(HsdpError::malformed(open_line, "end of file", "')'"));
    }
    Ok(stack.pop().map(|(items, _)| items).unwrap_or_default())
}

struct Cursor {
    items: std::vec::IntoIter<Item>,
    last_line: usize,
}

impl Cursor {
    fn next(&mut self, expected: &str) -> Result<Item> {
        match self.items.next() {
            Some(item) => {
                self.last_line = item.line();
                Ok(item)
            }
            None => Err(HsdpError::malformed(self.last_line, "end of file", expected)),
        }
    }

    fn keyword(&mut self, kw: &str) -> Result<()> {
        match self.next(kw)? {
            Item::Word(w, _) if w.eq_ignore_ascii_case(kw) => Ok(()),
            other => Err(HsdpError::malformed(other.line(), other.describe(), kw)),
        }
    }

    fn word(&mut self, expected: &str) -> Result<(String, usize)> {
        match self.next(expected)? {
            Item::Word(w, l) => Ok((w, l)),
            other => Err(HsdpError::malformed(other.line(), other.describe(), expected)),
        }
    }

    fn list(&mut self, expected: &str) -> Result<(Vec<Item>, usize)> {
        match self.next(expected)? {
            Item::List(items, l) => Ok((items, l)),
            other => Err(HsdpError::malformed(other.line(), other.describe(), expected)),
        }
    }

    fn names(&mut self, keyword: &str) -> Result<Vec<String>> {
        self.keyword(keyword)?;
        let (items, _) = self.list(&format!("{keyword} list"))?;
        items
            .into_iter()
            .map(|item| match item {
                Item::Word(w, _) => Ok(w),
                other => Err(HsdpError::malformed(other.line(), other.describe(), "variable name")),
            })
            .collect()
    }

    fn bounds(&mut self, keyword: &str, count: usize) -> Result<Vec<Option<f64>>> {
        self.keyword(keyword)?;
        let (items, line) = self.list(&format!("{keyword} list"))?;
        if items.len() != count {
            return Err(HsdpError::malformed(
                line,
                format!("{} values", items.len()),
                format!("{count} {keyword} (one per cvariable)"),
            ));
        }
        items
            .into_iter()
            .map(|item| match item {
                Item::Word(w, _) if w.eq_ignore_ascii_case("x") => Ok(None),
                Item::Word(w, l) => w.parse::<f64>().map(Some).map_err(|_| HsdpError::InvalidNumber {
                    line: l,
                    literal: w.clone(),
                    context: keyword.to_string(),
                }),
                other => Err(HsdpError::malformed(other.line(), other.describe(), "number or 'x'")),
            })
            .collect()
    }

    fn peek_is(&self, kw: &str) -> bool {
        matches!(self.items.as_slice().first(), Some(Item::Word(w, _)) if w.eq_ignore_ascii_case(kw))
    }
}

/// Convert a parenthesised group into a piecewise diagram spec
fn diagram(items: Vec<Item>, line: usize) -> Result<DiagramSpec> {
    let mut it = items.into_iter();
    let head = match it.next() {
        Some(Item::Bracket(text, l)) => (text, l),
        Some(other) => return Err(HsdpError::malformed(other.line(), other.describe(), "[expression]")),
        None => return Err(HsdpError::malformed(line, "()", "[expression]")),
    };
    let rest: Vec<Item> = it.collect();
    match rest.len() {
        0 => Ok(DiagramSpec::Leaf(parse_expr(&head.0, head.1)?)),
        2 => {
            let test = parse_decision(&head.0, head.1)?;
            let mut children = rest.into_iter();
            let high = child(children.next(), line)?;
            let low = child(children.next(), line)?;
            Ok(DiagramSpec::branch(test, high, low))
        }
        n => Err(HsdpError::malformed(
            line,
            format!("{n} sub-diagrams"),
            "either a leaf or exactly two branches",
        )),
    }
}

fn child(item: Option<Item>, line: usize) -> Result<DiagramSpec> {
    match item {
        Some(Item::List(items, l)) => diagram(items, l),
        Some(other) => Err(HsdpError::malformed(other.line(), other.describe(), "( sub-diagram )")),
        None => Err(HsdpError::malformed(line, "nothing", "( sub-diagram )")),
    }
}

fn diagram_from(cursor: &mut Cursor, expected: &str) -> Result<DiagramSpec> {
    let (items, line) = cursor.list(expected)?;
    diagram(items, line)
}

fn action(cursor: &mut Cursor) -> Result<ActionSpec> {
    let (name, _) = cursor.word("action name")?;
    debug!("Parsing action: {}", name);

    let mut transitions = BTreeMap::new();
    loop {
        let (word, line) = cursor.word("primed variable or 'observation'")?;
        if word.eq_ignore_ascii_case("observation") {
            break;
        }
        let dd = diagram_from(cursor, &format!("transition for {word}"))?;
        if transitions.insert(word.clone(), dd).is_some() {
            return Err(HsdpError::malformed(
                line,
                word,
                format!("one transition per primed variable in action {name}"),
            ));
        }
    }

    let mut observations = BTreeMap::new();
    loop {
        let (word, line) = cursor.word("observation variable or 'reward'")?;
        if word.eq_ignore_ascii_case("reward") {
            break;
        }
        let dd = diagram_from(cursor, &format!("observation model for {word}"))?;
        if observations.insert(word.clone(), dd).is_some() {
            return Err(HsdpError::malformed(
                line,
                word,
                format!("one model per observation variable in action {name}"),
            ));
        }
    }

    let reward = diagram_from(cursor, &format!("reward for action {name}"))?;
    cursor.keyword("endaction")?;

    Ok(ActionSpec {
        name,
        transitions,
        observations,
        reward,
    })
}

/// Parse problem text into a [`ProblemSpec`]
pub fn parse_problem(src: &str) -> Result<ProblemSpec> {
    let mut cursor = Cursor {
        items: read_items(src)?.into_iter(),
        last_line: 1,
    };

    let cvars = cursor.names("cvariables")?;
    let mins = cursor.bounds("min-values", cvars.len())?;
    let maxs = cursor.bounds("max-values", cvars.len())?;
    let continuous = cvars
        .into_iter()
        .zip(mins.into_iter().zip(maxs))
        .map(|(name, (min, max))| Variable::new(name, VariableKind::Continuous).with_bounds(min, max))
        .collect();

    let boolean = cursor.names("bvariables")?;
    let intermediate = cursor.names("ivariables")?;
    let observation = cursor.names("ovariables")?;

    let mut actions = Vec::new();
    while cursor.peek_is("action") {
        cursor.keyword("action")?;
        actions.push(action(&mut cursor)?);
    }

    let mut constraints = Vec::new();
    while cursor.peek_is("constraint") {
        cursor.keyword("constraint")?;
        constraints.push(diagram_from(&mut cursor, "constraint diagram")?);
        cursor.keyword("endconstraint")?;
    }

    cursor.keyword("discount")?;
    let (literal, line) = cursor.word("discount value")?;
    let discount = literal.parse::<f64>().map_err(|_| HsdpError::InvalidNumber {
        line,
        literal: literal.clone(),
        context: "discount".to_string(),
    })?;

    cursor.keyword("iterations")?;
    let (literal, line) = cursor.word("iteration count")?;
    let iterations = literal.parse::<usize>().map_err(|_| HsdpError::InvalidNumber {
        line,
        literal: literal.clone(),
        context: "iterations".to_string(),
    })?;

    if let Some(extra) = cursor.items.next() {
        return Err(HsdpError::malformed(extra.line(), extra.describe(), "end of file"));
    }

    Ok(ProblemSpec {
        continuous,
        boolean,
        intermediate,
        observation,
        actions,
        constraints,
        discount,
        iterations,
    })
}

/// Read and parse a problem file
pub fn parse_file(path: impl AsRef<Path>) -> Result<ProblemSpec> {
    let src = std::fs::read_to_string(path.as_ref())?;
    parse_problem(&src)
}
