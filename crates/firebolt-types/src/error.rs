//! Type conversion error types.

use thiserror::Error;

/// Errors that can occur during type parsing and value conversion.
#[derive(Debug, Error)]
pub enum TypeError {
    /// Raw value does not match the column type.
    #[error("invalid {expected} value {value}: {reason}")]
    InvalidValue {
        /// Expected type name.
        expected: &'static str,
        /// Raw value rendering.
        value: String,
        /// Why the conversion failed.
        reason: String,
    },

    /// Invalid date/time value.
    #[error("invalid date/time: {0}")]
    InvalidDateTime(String),

    /// Invalid decimal value.
    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),

    /// Invalid byte-string value.
    #[error("invalid byte string: {0}")]
    InvalidBytes(String),

    /// Parameter type cannot be rendered as a SQL literal.
    #[error("unsupported parameter type {0}")]
    UnsupportedParameter(&'static str),
}

impl TypeError {
    pub(crate) fn invalid(
        expected: &'static str,
        value: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            expected,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, TypeError>;
