//! JSON-Lines record model for streaming results.
//!
//! A streaming response is an ordered sequence of newline-delimited JSON
//! records discriminated by `message_type`: exactly one `START`, any number
//! of `DATA`, then one `FINISH_SUCCESSFULLY` or `FINISH_WITH_ERRORS`.

use serde::Deserialize;

use crate::error::{Error, Result, ServerError};
use crate::row_set::Statistics;

/// A `{name, type}` column descriptor from a `START` record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawColumn {
    /// Column name.
    pub name: String,
    /// Raw type string.
    #[serde(rename = "type")]
    pub type_str: String,
}

/// One record of a JSON-Lines response stream.
#[derive(Debug)]
pub enum JsonLinesRecord {
    /// Opens a result set; carries column metadata.
    Start {
        /// Columns of the result set.
        result_columns: Vec<RawColumn>,
        /// Server-assigned query id.
        query_id: Option<String>,
        /// Caller-assigned query label.
        query_label: Option<String>,
        /// Server request id.
        request_id: Option<String>,
    },
    /// A batch of rows.
    Data {
        /// Raw rows; cells are parsed lazily.
        data: Vec<Vec<serde_json::Value>>,
    },
    /// Terminates the result set successfully.
    Success {
        /// Final execution statistics.
        statistics: Option<Statistics>,
    },
    /// Terminates the result set with server errors.
    Errors {
        /// Structured server errors.
        errors: Vec<ServerError>,
        /// Final execution statistics.
        statistics: Option<Statistics>,
    },
}

#[derive(Deserialize)]
struct StartPayload {
    result_columns: Vec<RawColumn>,
    #[serde(default)]
    query_id: Option<String>,
    #[serde(default)]
    query_label: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Deserialize)]
struct DataPayload {
    data: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct SuccessPayload {
    #[serde(default)]
    statistics: Option<Statistics>,
}

#[derive(Deserialize)]
struct ErrorsPayload {
    #[serde(default)]
    errors: Vec<ServerError>,
    #[serde(default)]
    statistics: Option<Statistics>,
}

impl JsonLinesRecord {
    /// The record's discriminator, for diagnostics.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Start { .. } => "START",
            Self::Data { .. } => "DATA",
            Self::Success { .. } => "FINISH_SUCCESSFULLY",
            Self::Errors { .. } => "FINISH_WITH_ERRORS",
        }
    }
}

/// Parse one line of the stream.
pub fn parse_record(line: &str) -> Result<JsonLinesRecord> {
    let invalid = |reason: &dyn std::fmt::Display| {
        Error::Operational(format!("Invalid JSON line response format: {reason}: {line}"))
    };
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| invalid(&e))?;
    let message_type = value
        .get("message_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(&"missing message_type"))?
        .to_owned();

    match message_type.as_str() {
        "START" => {
            let payload: StartPayload =
                serde_json::from_value(value).map_err(|e| invalid(&e))?;
            Ok(JsonLinesRecord::Start {
                result_columns: payload.result_columns,
                query_id: payload.query_id,
                query_label: payload.query_label,
                request_id: payload.request_id,
            })
        }
        "DATA" => {
            let payload: DataPayload =
                serde_json::from_value(value).map_err(|e| invalid(&e))?;
            Ok(JsonLinesRecord::Data { data: payload.data })
        }
        "FINISH_SUCCESSFULLY" => {
            let payload: SuccessPayload =
                serde_json::from_value(value).map_err(|e| invalid(&e))?;
            Ok(JsonLinesRecord::Success {
                statistics: payload.statistics,
            })
        }
        "FINISH_WITH_ERRORS" => {
            let payload: ErrorsPayload =
                serde_json::from_value(value).map_err(|e| invalid(&e))?;
            Ok(JsonLinesRecord::Errors {
                errors: payload.errors,
                statistics: payload.statistics,
            })
        }
        other => Err(Error::Operational(format!("Unknown message type: {other}"))),
    }
}
