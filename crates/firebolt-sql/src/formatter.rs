//! Statement splitting, SET detection and placeholder substitution.

use firebolt_types::{EscapeStyle, Value, format_value};

use crate::error::{Result, SqlError};
use crate::scanner::{Fragment, Scanner, split_statements};

/// A `SET <name> = <value>` directive extracted from a statement.
///
/// SET statements are never sent as SQL; the cursor stages them and forwards
/// them as query parameters on subsequent requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetParameter {
    /// Parameter name.
    pub name: String,
    /// Parameter value, unquoted.
    pub value: String,
}

/// One statement produced by [`StatementFormatter::split_format_sql`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// A SQL statement ready to be sent, placeholders substituted.
    Query(String),
    /// A SET directive to stage into the session.
    Set(SetParameter),
}

/// Splits multi-statement SQL and substitutes `?` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementFormatter {
    escape_style: EscapeStyle,
}

impl StatementFormatter {
    /// Create a formatter with the given literal escape style.
    #[must_use]
    pub fn new(escape_style: EscapeStyle) -> Self {
        Self { escape_style }
    }

    /// Split `query` into statements and format each with `parameters`.
    ///
    /// With parameters present the query must be a single non-SET statement;
    /// one formatted statement is produced per parameter set. Without
    /// parameters each statement is classified as SET or plain SQL.
    pub fn split_format_sql(
        &self,
        query: &str,
        parameters: &[Vec<Value>],
    ) -> Result<Vec<Statement>> {
        let spans = split_statements(query);
        if spans.is_empty() {
            return Ok(vec![Statement::Query(query.to_owned())]);
        }

        if !parameters.is_empty() {
            if spans.len() > 1 {
                return Err(SqlError::MultiStatementParameters);
            }
            if self.statement_to_set(spans[0])?.is_some() {
                return Err(SqlError::SetParameters);
            }
            return parameters
                .iter()
                .map(|set| Ok(Statement::Query(self.format_statement(spans[0], set)?)))
                .collect();
        }

        spans
            .iter()
            .map(|span| {
                Ok(match self.statement_to_set(span)? {
                    Some(set) => Statement::Set(set),
                    None => Statement::Query(normalize(span)),
                })
            })
            .collect()
    }

    /// Substitute `?` placeholders in a single statement.
    ///
    /// Placeholders are consumed in order; a count mismatch in either
    /// direction is an error.
    pub fn format_statement(&self, statement: &str, parameters: &[Value]) -> Result<String> {
        let mut out = String::with_capacity(statement.len());
        let mut used = 0usize;
        for frag in Scanner::new(statement) {
            if frag == Fragment::Placeholder {
                let value = parameters.get(used).ok_or(SqlError::NotEnoughParameters {
                    given: parameters.len(),
                })?;
                out.push_str(&format_value(value, self.escape_style)?);
                used += 1;
            } else {
                out.push_str(frag.text());
            }
        }
        if used < parameters.len() {
            return Err(SqlError::TooManyParameters {
                given: parameters.len(),
                used,
            });
        }
        Ok(normalize(&out))
    }

    /// Try to parse a statement as a `SET` command.
    ///
    /// Returns `Ok(None)` when the statement is not a SET; an error when it
    /// starts with SET but does not match `SET <param> = <value>`.
    pub fn statement_to_set(&self, statement: &str) -> Result<Option<SetParameter>> {
        let tokens: Vec<Fragment<'_>> = Scanner::new(statement)
            .filter(|f| !f.is_trivia() && *f != Fragment::Semicolon)
            .collect();

        let Some(Fragment::Word(first)) = tokens.first() else {
            return Ok(None);
        };
        if !first.eq_ignore_ascii_case("set") {
            return Ok(None);
        }

        let invalid = || SqlError::InvalidSetStatement(normalize(statement));

        let eq_idx = tokens
            .iter()
            .position(|f| matches!(f, Fragment::Symbol(s) if *s == "="))
            .ok_or_else(invalid)?;
        let name: String = tokens[1..eq_idx].iter().map(Fragment::text).collect();
        let value: String = tokens[eq_idx + 1..].iter().map(Fragment::text).collect();
        if name.is_empty() || value.is_empty() {
            return Err(invalid());
        }
        Ok(Some(SetParameter {
            name,
            value: unquote(&value),
        }))
    }
}

/// Trim surrounding whitespace and a trailing semicolon.
fn normalize(statement: &str) -> String {
    statement.trim().trim_end_matches(';').trim_end().to_owned()
}

/// Strip outer single quotes and unescape doubled quotes inside.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        value[1..value.len() - 1].replace("''", "'")
    } else {
        value.to_owned()
    }
}
