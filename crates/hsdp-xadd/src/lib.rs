//! HSDP XADD - Extended algebraic decision diagrams
//!
//! A single [`Forest`] owns every diagram node. Leaves are canonical
//! polynomials, internal nodes test a boolean variable or the sign of a
//! polynomial. The forest provides the pointwise algebra, restriction,
//! substitution and canonicalisation used by symbolic dynamic programming,
//! plus explicit liveness marking for cache flushes.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::float_cmp)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

pub mod decision;
pub mod forest;
pub mod polynomial;
mod reduce;

pub use decision::{Decision, Normalized};
pub use forest::{DiagramId, Forest, Node, Op, MAX_BRANCH_COUNT};
pub use polynomial::{Monomial, Polynomial};
