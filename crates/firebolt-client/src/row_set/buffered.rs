//! Eager (in-memory) result decoding.

use firebolt_types::{Column, Value};
use serde::Deserialize;

use crate::error::{Error, Result, StructuredError};
use crate::row_set::json_lines::RawColumn;
use crate::row_set::{Statistics, parse_row};

#[derive(Deserialize)]
struct RawResponse {
    meta: Vec<RawColumn>,
    data: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    statistics: Option<Statistics>,
}

/// One decoded result block.
struct Block {
    row_count: i64,
    columns: Vec<Column>,
    statistics: Option<Statistics>,
    rows: Vec<Vec<serde_json::Value>>,
}

impl Block {
    fn empty() -> Self {
        Self {
            row_count: -1,
            columns: Vec::new(),
            statistics: None,
            rows: Vec::new(),
        }
    }
}

/// A row set holding every block fully in memory.
///
/// Bodies are decoded with numeric tokens preserved verbatim, so
/// arbitrary-precision decimals survive; cells are converted to typed values
/// lazily as rows are fetched.
pub struct BufferedRowSet {
    blocks: Vec<Block>,
    current: usize,
    row_idx: usize,
}

impl Default for BufferedRowSet {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferedRowSet {
    /// Create an empty row set; blocks are appended per statement.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            current: 0,
            row_idx: 0,
        }
    }

    /// Append the block for a response with an empty body (DDL and friends):
    /// unknown row count, no columns, no rows.
    pub fn append_empty_response(&mut self) {
        self.blocks.push(Block::empty());
    }

    /// Decode a response body and append its block.
    pub fn append_response(&mut self, body: &[u8]) -> Result<()> {
        if body.is_empty() {
            self.append_empty_response();
            return Ok(());
        }

        // Check for a structured error payload before requiring the result
        // shape; error bodies carry no meta/data.
        let parsed: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| Error::Data(format!("Invalid query data format: {e}")))?;
        if let Some(errors) = parsed.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                let errors = errors
                    .iter()
                    .filter_map(|e| serde_json::from_value(e.clone()).ok())
                    .collect();
                return Err(Error::Structured(StructuredError::new(errors)));
            }
        }

        let raw: RawResponse = serde_json::from_value(parsed)
            .map_err(|e| Error::Data(format!("Invalid query data format: {e}")))?;
        let columns = raw
            .meta
            .iter()
            .map(|c| Column::new(c.name.clone(), firebolt_types::parse_type(&c.type_str)))
            .collect();
        self.blocks.push(Block {
            row_count: raw.data.len() as i64,
            columns,
            statistics: raw.statistics,
            rows: raw.data,
        });
        Ok(())
    }

    fn block(&self) -> Option<&Block> {
        self.blocks.get(self.current)
    }

    /// Columns of the current block.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        self.block().map_or(&[], |b| &b.columns)
    }

    /// Row count of the current block (−1 when unknown).
    #[must_use]
    pub fn row_count(&self) -> i64 {
        self.block().map_or(-1, |b| b.row_count)
    }

    /// Statistics of the current block.
    #[must_use]
    pub fn statistics(&self) -> Option<&Statistics> {
        self.block().and_then(|b| b.statistics.as_ref())
    }

    /// Fetch and type-convert the next row of the current block.
    pub fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        let Some(block) = self.blocks.get(self.current) else {
            return Err(Error::Data("No results available.".to_owned()));
        };
        if block.row_count == -1 {
            return Err(Error::Data("no rows to fetch".to_owned()));
        }
        if self.row_idx >= block.rows.len() {
            return Ok(None);
        }
        let row = parse_row(&block.rows[self.row_idx], &block.columns)?;
        self.row_idx += 1;
        Ok(Some(row))
    }

    /// Advance to the next block, if one exists.
    pub fn next_set(&mut self) -> bool {
        if self.current + 1 < self.blocks.len() {
            self.current += 1;
            self.row_idx = 0;
            true
        } else {
            false
        }
    }

    /// Release held rows.
    pub fn close(&mut self) {
        self.blocks.clear();
        self.current = 0;
        self.row_idx = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use firebolt_types::SqlType;

    const BODY: &[u8] = br#"{
        "meta": [{"name": "id", "type": "Int32"}, {"name": "name", "type": "String"}],
        "data": [[1, "a"], [2, "b"]],
        "rows": 2,
        "statistics": {"elapsed": 0.01, "rows_read": 2, "bytes_read": 10,
                       "time_before_execution": 0.001, "time_to_execute": 0.009}
    }"#;

    #[test]
    fn test_append_and_fetch() {
        let mut rs = BufferedRowSet::new();
        rs.append_response(BODY).unwrap();
        assert_eq!(rs.row_count(), 2);
        assert_eq!(rs.columns().len(), 2);
        assert_eq!(rs.columns()[0].type_code, SqlType::Int);
        assert_eq!(
            rs.next_row().unwrap(),
            Some(vec![Value::Int(1), Value::Str("a".to_owned())])
        );
        assert_eq!(
            rs.next_row().unwrap(),
            Some(vec![Value::Int(2), Value::Str("b".to_owned())])
        );
        assert_eq!(rs.next_row().unwrap(), None);
        assert!(rs.statistics().is_some());
    }

    #[test]
    fn test_empty_body_block() {
        let mut rs = BufferedRowSet::new();
        rs.append_response(b"").unwrap();
        assert_eq!(rs.row_count(), -1);
        assert!(rs.columns().is_empty());
        // Fetching from a DDL block is a data error.
        assert!(matches!(rs.next_row(), Err(Error::Data(_))));
    }

    #[test]
    fn test_multiple_blocks_and_nextset() {
        let mut rs = BufferedRowSet::new();
        rs.append_response(BODY).unwrap();
        rs.append_empty_response();
        assert_eq!(rs.row_count(), 2);
        assert!(rs.next_set());
        assert_eq!(rs.row_count(), -1);
        assert!(!rs.next_set());
    }

    #[test]
    fn test_nextset_resets_row_position() {
        let mut rs = BufferedRowSet::new();
        rs.append_response(BODY).unwrap();
        rs.append_response(BODY).unwrap();
        rs.next_row().unwrap();
        assert!(rs.next_set());
        assert_eq!(
            rs.next_row().unwrap(),
            Some(vec![Value::Int(1), Value::Str("a".to_owned())])
        );
    }

    #[test]
    fn test_errors_array_raises_structured() {
        let mut rs = BufferedRowSet::new();
        let err = rs
            .append_response(br#"{"errors": [{"name": "Bad", "description": "no"}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Structured(_)));
    }

    #[test]
    fn test_malformed_body_is_data_error() {
        let mut rs = BufferedRowSet::new();
        assert!(matches!(
            rs.append_response(b"{\"meta\": []}"),
            Err(Error::Data(_))
        ));
        assert!(matches!(rs.append_response(b"not json"), Err(Error::Data(_))));
    }

    #[test]
    fn test_decimal_precision_survives_buffering() {
        use bigdecimal::BigDecimal;
        use std::str::FromStr;

        let body = br#"{
            "meta": [{"name": "d", "type": "Decimal(38, 30)"}],
            "data": [[12345678.901234567890123456789012345678]],
            "rows": 1
        }"#;
        let mut rs = BufferedRowSet::new();
        rs.append_response(body).unwrap();
        let row = rs.next_row().unwrap().unwrap();
        assert_eq!(
            row[0],
            Value::Decimal(
                BigDecimal::from_str("12345678.901234567890123456789012345678").unwrap()
            )
        );
    }
}
