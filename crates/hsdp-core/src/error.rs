//! Error types for HSDP

use thiserror::Error;

/// Main error type for HSDP
#[derive(Error, Debug)]
pub enum HsdpError {
    #[error("Malformed input at line {line}: expected {expected}, found '{found}'")]
    MalformedInput {
        line: usize,
        found: String,
        expected: String,
    },

    #[error("Illegal numeric literal '{literal}' at line {line} ({context})")]
    InvalidNumber {
        line: usize,
        literal: String,
        context: String,
    },

    #[error("Unsupported observation model for '{variable}': {expression} is not affine and invertible in a single state variable")]
    UnsupportedObservationModel { variable: String, expression: String },

    #[error("Action '{action}' has no transition for variable '{variable}'")]
    MissingActionVariable { action: String, variable: String },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Diagram handle #{0} was reclaimed by a cache flush")]
    StaleHandle(u32),

    #[error("Diagram error: {0}")]
    Diagram(String),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for HSDP operations
pub type Result<T> = std::result::Result<T, HsdpError>;

impl HsdpError {
    /// Shorthand for a malformed-input diagnostic
    pub fn malformed(line: usize, found: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::MalformedInput {
            line,
            found: found.into(),
            expected: expected.into(),
        }
    }
}
