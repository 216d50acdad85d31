//! SQL formatting error types.

use thiserror::Error;

/// Errors produced while splitting and formatting SQL text.
#[derive(Debug, Error)]
pub enum SqlError {
    /// Parameterized execution was requested for a multi-statement query.
    #[error("Formatting multi-statement queries is not supported.")]
    MultiStatementParameters,

    /// Parameterized execution was requested for a SET statement.
    #[error("Formatting set statements is not supported.")]
    SetParameters,

    /// A SET statement did not match `SET <param> = <value>`.
    #[error("Invalid set statement format: {0}, expected SET <param> = <value>")]
    InvalidSetStatement(String),

    /// Fewer parameters than placeholders.
    #[error("not enough parameters provided for substitution: given {given}, found one more")]
    NotEnoughParameters {
        /// Number of parameters supplied.
        given: usize,
    },

    /// More parameters than placeholders.
    #[error("too many parameters provided for substitution: given {given}, used only {used}")]
    TooManyParameters {
        /// Number of parameters supplied.
        given: usize,
        /// Number of placeholders found.
        used: usize,
    },

    /// A parameter value could not be rendered as a literal.
    #[error(transparent)]
    Type(#[from] firebolt_types::TypeError),
}

/// Result type for formatting operations.
pub type Result<T> = std::result::Result<T, SqlError>;
