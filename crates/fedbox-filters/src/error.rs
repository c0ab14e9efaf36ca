//! Error types for filter decoding.

use thiserror::Error;

/// Errors raised while building filters from user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    /// The target is not a parseable IRI.
    #[error("invalid target IRI: {0}")]
    InvalidTarget(String),

    /// A query parameter carried a value of the wrong shape.
    #[error("invalid value for {name}: {value}")]
    InvalidParam { name: String, value: String },
}

/// Convenience alias for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;
