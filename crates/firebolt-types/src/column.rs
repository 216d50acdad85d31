//! Result-set column metadata.

use crate::sql_type::SqlType;

/// Column description for a result set, PEP-249 style.
///
/// Only `name` and `type_code` are populated by the server's metadata
/// channel; the remaining fields exist for API compatibility and are
/// populated where the type carries them (`precision`/`scale` for decimals).
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Parsed column type.
    pub type_code: SqlType,
    /// Maximum display width, when known.
    pub display_size: Option<u32>,
    /// Internal storage size, when known.
    pub internal_size: Option<u32>,
    /// Precision for numeric types.
    pub precision: Option<u32>,
    /// Scale for numeric types.
    pub scale: Option<u32>,
    /// Whether the column admits NULL values, when known.
    pub null_ok: Option<bool>,
}

impl Column {
    /// Create a column description from a name and parsed type.
    #[must_use]
    pub fn new(name: impl Into<String>, type_code: SqlType) -> Self {
        let (precision, scale) = match type_code.precision_scale() {
            Some((p, s)) => (Some(p), Some(s)),
            None => (None, None),
        };
        Self {
            name: name.into(),
            type_code,
            display_size: None,
            internal_size: None,
            precision,
            scale,
            null_ok: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_column_carries_precision_scale() {
        let col = Column::new("amount", SqlType::Decimal { precision: 38, scale: 30 });
        assert_eq!(col.precision, Some(38));
        assert_eq!(col.scale, Some(30));
    }

    #[test]
    fn test_scalar_column_has_no_precision() {
        let col = Column::new("id", SqlType::Int);
        assert_eq!(col.precision, None);
        assert_eq!(col.scale, None);
        assert_eq!(col.null_ok, None);
    }
}
