//! HSDP Core - Shared types for hybrid symbolic dynamic programming
//!
//! This crate provides the error type, the variable and problem data model,
//! the arithmetic expression sum type, and the problem-file parser used by the
//! diagram substrate and the solver.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod error;
pub mod expr;
pub mod parser;
pub mod problem;

pub use error::{HsdpError, Result};
pub use expr::{ArithExpr, CmpOp, DecisionExpr};
pub use parser::{parse_file, parse_problem};
pub use problem::{ActionSpec, DiagramSpec, ProblemSpec, Variable, VariableKind};
