//! Execution planning by parameter style.
//!
//! `qmark` substitutes parameters client-side via the literal formatter;
//! `fb_numeric` sends the query untouched with a JSON `query_parameters`
//! list for server-side binding.

use firebolt_sql::{Statement, StatementFormatter};
use firebolt_types::{Value, to_query_parameter};

use crate::error::{Error, Result};

/// Buffered output format (whole JSON body).
pub const JSON_OUTPUT_FORMAT: &str = "JSON_Compact";
/// Streaming output format (JSON-Lines).
pub const JSON_LINES_OUTPUT_FORMAT: &str = "JSONLines_Compact";

/// Parameter placeholder style, set per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamStyle {
    /// `?` placeholders, substituted client-side.
    #[default]
    Qmark,
    /// `$1, $2, ...` placeholders, bound server-side.
    FbNumeric,
}

impl ParamStyle {
    /// The PEP-249 `paramstyle` string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qmark => "qmark",
            Self::FbNumeric => "fb_numeric",
        }
    }
}

/// A planned execution: the statements to run and the query parameters to
/// attach to each request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExecutionPlan {
    pub statements: Vec<Statement>,
    pub query_params: Vec<(String, String)>,
    pub is_multi_statement: bool,
    pub async_execution: bool,
    pub streaming: bool,
}

/// Plan `query` with `parameters` under the given paramstyle.
pub(crate) fn plan(
    paramstyle: ParamStyle,
    formatter: &StatementFormatter,
    query: &str,
    parameters: &[Vec<Value>],
    streaming: bool,
    async_execution: bool,
) -> Result<ExecutionPlan> {
    let mut query_params = vec![(
        "output_format".to_owned(),
        output_format(streaming).to_owned(),
    )];
    if async_execution {
        query_params.push(("async".to_owned(), "true".to_owned()));
    }

    let statements = match paramstyle {
        ParamStyle::Qmark => formatter.split_format_sql(query, parameters)?,
        ParamStyle::FbNumeric => {
            let bound = parameters.first().map_or(&[][..], Vec::as_slice);
            if !bound.is_empty() {
                let rendered: Vec<serde_json::Value> = bound
                    .iter()
                    .enumerate()
                    .map(|(i, value)| {
                        serde_json::json!({
                            "name": format!("${}", i + 1),
                            "value": to_query_parameter(value),
                        })
                    })
                    .collect();
                let encoded = serde_json::to_string(&rendered).map_err(|e| {
                    Error::Data(format!("failed to serialize query parameters: {e}"))
                })?;
                query_params.push(("query_parameters".to_owned(), encoded));
            }
            vec![Statement::Query(query.to_owned())]
        }
    };

    if statements.len() > 1 && async_execution {
        return Err(Error::NotSupported(
            "Server side async does not support multi-statement queries".to_owned(),
        ));
    }

    Ok(ExecutionPlan {
        is_multi_statement: statements.len() > 1,
        statements,
        query_params,
        async_execution,
        streaming,
    })
}

fn output_format(streaming: bool) -> &'static str {
    if streaming {
        JSON_LINES_OUTPUT_FORMAT
    } else {
        JSON_OUTPUT_FORMAT
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn formatter() -> StatementFormatter {
        StatementFormatter::default()
    }

    #[test]
    fn test_qmark_plan_substitutes() {
        let plan = plan(
            ParamStyle::Qmark,
            &formatter(),
            "SELECT ?",
            &[vec![Value::Int(5)]],
            false,
            false,
        )
        .unwrap();
        assert_eq!(plan.statements, vec![Statement::Query("SELECT 5".to_owned())]);
        assert!(
            plan.query_params
                .contains(&("output_format".to_owned(), JSON_OUTPUT_FORMAT.to_owned()))
        );
        assert!(!plan.is_multi_statement);
    }

    #[test]
    fn test_streaming_output_format() {
        let plan = plan(ParamStyle::Qmark, &formatter(), "SELECT 1", &[], true, false).unwrap();
        assert!(
            plan.query_params
                .contains(&("output_format".to_owned(), JSON_LINES_OUTPUT_FORMAT.to_owned()))
        );
    }

    #[test]
    fn test_async_flag() {
        let plan = plan(ParamStyle::Qmark, &formatter(), "INSERT INTO t SELECT 1", &[], false, true)
            .unwrap();
        assert!(plan.query_params.contains(&("async".to_owned(), "true".to_owned())));
    }

    #[test]
    fn test_async_multi_statement_rejected() {
        let err = plan(
            ParamStyle::Qmark,
            &formatter(),
            "SELECT 1; SELECT 2",
            &[],
            false,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[test]
    fn test_fb_numeric_passes_query_through() {
        let plan = plan(
            ParamStyle::FbNumeric,
            &formatter(),
            "SELECT $1, $2",
            &[vec![Value::Int(1), Value::from("a")]],
            false,
            false,
        )
        .unwrap();
        assert_eq!(
            plan.statements,
            vec![Statement::Query("SELECT $1, $2".to_owned())]
        );
        let encoded = plan
            .query_params
            .iter()
            .find(|(k, _)| k == "query_parameters")
            .map(|(_, v)| v.clone())
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parsed[0]["name"], "$1");
        assert_eq!(parsed[0]["value"], 1);
        assert_eq!(parsed[1]["value"], "a");
    }

    #[test]
    fn test_fb_numeric_without_parameters_omits_field() {
        let plan = plan(ParamStyle::FbNumeric, &formatter(), "SELECT 1", &[], false, false).unwrap();
        assert!(!plan.query_params.iter().any(|(k, _)| k == "query_parameters"));
    }
}
