//! Result-set decoding.
//!
//! Two decoders share one interface: [`BufferedRowSet`] holds fully decoded
//! JSON bodies in memory, [`StreamingRowSet`] walks a JSON-Lines response
//! incrementally with bounded memory. Both present an ordered sequence of
//! per-statement result blocks navigated with `next_set`.

pub mod buffered;
pub mod json_lines;
pub mod streaming;

use firebolt_types::{Column, SqlType, Value, parse_value};
use serde::Deserialize;

pub use buffered::BufferedRowSet;
pub use streaming::StreamingRowSet;

use crate::error::{Error, Result};

/// Query execution statistics returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[non_exhaustive]
pub struct Statistics {
    /// Wall-clock execution time in seconds.
    #[serde(default)]
    pub elapsed: f64,
    /// Rows read by the query.
    #[serde(default)]
    pub rows_read: i64,
    /// Bytes read by the query.
    #[serde(default)]
    pub bytes_read: i64,
    /// Seconds spent before execution started.
    #[serde(default)]
    pub time_before_execution: f64,
    /// Seconds spent executing.
    #[serde(default)]
    pub time_to_execute: f64,
    /// Bytes served from cache, when reported.
    #[serde(default)]
    pub scanned_bytes_cache: Option<f64>,
    /// Bytes read from storage, when reported.
    #[serde(default)]
    pub scanned_bytes_storage: Option<f64>,
}

/// Parse one raw row against the block's column types.
pub(crate) fn parse_row(raw: &[serde_json::Value], columns: &[Column]) -> Result<Vec<Value>> {
    if raw.len() != columns.len() {
        return Err(Error::Data(format!(
            "row has {} cells, expected {}",
            raw.len(),
            columns.len()
        )));
    }
    raw.iter()
        .zip(columns)
        .map(|(cell, column)| parse_value(cell, &column.type_code).map_err(Error::from))
        .collect()
}

/// Build column metadata from the server's `{name, type}` pairs.
pub(crate) fn columns_from_meta(meta: &[(String, String)]) -> Vec<Column> {
    meta.iter()
        .map(|(name, type_str)| Column::new(name.clone(), firebolt_types::parse_type(type_str)))
        .collect()
}

/// A cursor's result data, in either decoding mode.
pub enum RowSet {
    /// Fully buffered result blocks.
    Buffered(BufferedRowSet),
    /// Incrementally decoded JSON-Lines blocks.
    Streaming(StreamingRowSet),
}

impl RowSet {
    /// Column metadata of the current block.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        match self {
            Self::Buffered(rs) => rs.columns(),
            Self::Streaming(rs) => rs.columns(),
        }
    }

    /// Row count of the current block (−1 when unknown).
    #[must_use]
    pub fn row_count(&self) -> i64 {
        match self {
            Self::Buffered(rs) => rs.row_count(),
            Self::Streaming(rs) => rs.row_count(),
        }
    }

    /// Statistics of the current block, when already available.
    #[must_use]
    pub fn statistics(&self) -> Option<&Statistics> {
        match self {
            Self::Buffered(rs) => rs.statistics(),
            Self::Streaming(rs) => rs.statistics(),
        }
    }

    /// Fetch the next row of the current block.
    pub async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        match self {
            Self::Buffered(rs) => rs.next_row(),
            Self::Streaming(rs) => rs.next_row().await,
        }
    }

    /// Advance to the next result block, closing the current stream first.
    pub async fn next_set(&mut self) -> Result<bool> {
        match self {
            Self::Buffered(rs) => Ok(rs.next_set()),
            Self::Streaming(rs) => rs.next_set().await,
        }
    }

    /// Release all held resources (streams, buffered rows).
    pub fn close(&mut self) {
        match self {
            Self::Buffered(rs) => rs.close(),
            Self::Streaming(rs) => rs.close(),
        }
    }

    /// The SQL type of a column, for diagnostics.
    #[must_use]
    pub fn column_type(&self, index: usize) -> Option<&SqlType> {
        self.columns().get(index).map(|c| &c.type_code)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_row_typed() {
        let columns = columns_from_meta(&[
            ("id".to_owned(), "Int32".to_owned()),
            ("name".to_owned(), "String".to_owned()),
        ]);
        let row = parse_row(&[json!(1), json!("a")], &columns).unwrap();
        assert_eq!(row, vec![Value::Int(1), Value::Str("a".to_owned())]);
    }

    #[test]
    fn test_parse_row_arity_mismatch() {
        let columns = columns_from_meta(&[("id".to_owned(), "Int32".to_owned())]);
        assert!(parse_row(&[json!(1), json!(2)], &columns).is_err());
    }

    #[test]
    fn test_statistics_deserialization() {
        let stats: Statistics = serde_json::from_value(json!({
            "elapsed": 0.1,
            "rows_read": 10,
            "bytes_read": 100,
            "time_before_execution": 0.01,
            "time_to_execute": 0.09
        }))
        .unwrap();
        assert_eq!(stats.rows_read, 10);
        assert!(stats.scanned_bytes_cache.is_none());
    }
}
