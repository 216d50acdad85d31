//! Client error types.
//!
//! A single [`Error`] enum mirrors the PEP-249 exception taxonomy so callers
//! can catch by severity class with the [`Error::is_interface_error`] /
//! [`Error::is_database_error`] family of predicates, while still matching on
//! concrete variants for precise handling.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur during driver operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Important warning, e.g. data truncation on insert.
    #[error("warning: {0}")]
    Warning(String),

    /// Error related to the driver interface rather than the database.
    #[error("interface error: {0}")]
    Interface(String),

    /// Invalid connection or driver configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Problem with the processed data (bad values, wrong parameter count).
    #[error("data error: {0}")]
    Data(String),

    /// Error related to the database's operation, not necessarily under the
    /// programmer's control.
    #[error("operational error: {0}")]
    Operational(String),

    /// Operation attempted on a closed connection.
    #[error("Unable to {0}: connection closed")]
    ConnectionClosed(&'static str),

    /// The engine addressed by the connection is not running.
    #[error("Engine {0} is not running")]
    EngineNotRunning(String),

    /// Query execution exceeded the configured timeout.
    #[error("Query execution timed out")]
    QueryTimeout,

    /// Relational integrity violation.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Database internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Programming error, e.g. bad SQL or misused API.
    #[error("programming error: {0}")]
    Programming(String),

    /// Cursor method called after the cursor was closed.
    #[error("Unable to call {0}: cursor closed")]
    CursorClosed(&'static str),

    /// Cursor method called before any query was run.
    #[error("Unable to call {0}: need to run a query first")]
    QueryNotRun(&'static str),

    /// Row-producing method called on a server-side async statement.
    #[error(
        "Method {0} not allowed for an async query. \
         Please get the token and use the async query API to get the status"
    )]
    MethodNotAllowedInAsync(&'static str),

    /// Structured error(s) received from the server in a JSON body.
    #[error("{0}")]
    Structured(StructuredError),

    /// Operation not supported by the database.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Operation not supported on legacy (V1) deployments.
    #[error(
        "{0} is not supported in this version of Firebolt. \
         Please contact support to upgrade your account to a new version"
    )]
    V1NotSupported(&'static str),

    /// Credentials were rejected during token acquisition.
    #[error("Failed to authenticate: {0}")]
    Authentication(String),

    /// Token rejected with no refresh path left.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Account does not exist.
    #[error("Account '{0}' does not exist")]
    AccountNotFound(String),

    /// Account does not exist in this organization or is not authorized.
    #[error(
        "Account '{0}' does not exist in this organization or is not authorized. \
         Please verify the account name and make sure your service account has \
         the correct RBAC permissions and is linked to a user"
    )]
    AccountNotFoundOrNoAccess(String),

    /// Engine with the provided name was not found.
    #[error("Engine with name {0} doesn't exist")]
    EngineNotFound(String),

    /// HTTP 400 with a server-provided message.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Multiple failures while closing result streams.
    #[error("operational error: failed to close {} result stream(s): {}", .0.len(), render_group(.0))]
    StreamCloseGroup(Vec<Error>),
}

fn render_group(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Whether this error belongs to the interface class (including
    /// configuration errors).
    #[must_use]
    pub fn is_interface_error(&self) -> bool {
        matches!(self, Self::Interface(_) | Self::Configuration(_))
    }

    /// Whether this error belongs to the database class.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        self.is_operational_error()
            || self.is_programming_error()
            || matches!(
                self,
                Self::Data(_) | Self::Integrity(_) | Self::Internal(_) | Self::NotSupported(_) | Self::V1NotSupported(_)
            )
    }

    /// Whether this error belongs to the operational class.
    #[must_use]
    pub fn is_operational_error(&self) -> bool {
        matches!(
            self,
            Self::Operational(_)
                | Self::ConnectionClosed(_)
                | Self::EngineNotRunning(_)
                | Self::QueryTimeout
                | Self::StreamCloseGroup(_)
        )
    }

    /// Whether this error belongs to the programming class.
    #[must_use]
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::Programming(_)
                | Self::CursorClosed(_)
                | Self::QueryNotRun(_)
                | Self::MethodNotAllowedInAsync(_)
                | Self::Structured(_)
        )
    }

    /// Whether this error came from authentication or authorization.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_)
                | Self::Authorization(_)
                | Self::AccountNotFound(_)
                | Self::AccountNotFoundOrNoAccess(_)
        )
    }

    /// Wrap a transport failure that happened during result streaming.
    pub(crate) fn stream_transport(error: reqwest::Error) -> Self {
        Self::Operational(format!("stream error: {error}"))
    }

    /// Wrap a transport failure that happened during bootstrap.
    pub(crate) fn bootstrap_transport(error: reqwest::Error) -> Self {
        Self::Interface(format!("connection error: {error}"))
    }
}

impl From<firebolt_types::TypeError> for Error {
    fn from(e: firebolt_types::TypeError) -> Self {
        Self::Data(e.to_string())
    }
}

impl From<firebolt_sql::SqlError> for Error {
    fn from(e: firebolt_sql::SqlError) -> Self {
        use firebolt_sql::SqlError;
        match e {
            SqlError::MultiStatementParameters | SqlError::SetParameters => {
                Self::NotSupported(e.to_string())
            }
            SqlError::InvalidSetStatement(_) => Self::Interface(e.to_string()),
            SqlError::NotEnoughParameters { .. } | SqlError::TooManyParameters { .. } => {
                Self::Data(e.to_string())
            }
            SqlError::Type(inner) => inner.into(),
        }
    }
}

impl From<firebolt_auth::AuthError> for Error {
    fn from(e: firebolt_auth::AuthError) -> Self {
        use firebolt_auth::AuthError;
        match e {
            AuthError::Authentication(cause) => Self::Authentication(cause),
            AuthError::Authorization(cause) => Self::Authorization(cause),
            AuthError::InvalidTokenResponse(cause) => Self::Authentication(cause),
            AuthError::Storage(cause) => Self::Interface(cause.to_string()),
        }
    }
}

/// A structured error payload received from the server.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[non_exhaustive]
pub struct ServerError {
    /// Server error code, e.g. `FB001`.
    #[serde(default)]
    pub code: Option<String>,
    /// Short error name.
    #[serde(default)]
    pub name: Option<String>,
    /// Severity label, e.g. `ERROR`.
    #[serde(default)]
    pub severity: Option<String>,
    /// Which component produced the error.
    #[serde(default)]
    pub source: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Suggested resolution.
    #[serde(default)]
    pub resolution: Option<String>,
    /// Documentation link.
    #[serde(default, rename = "helpLink")]
    pub help_link: Option<String>,
    /// Location of the failure within the statement.
    #[serde(default)]
    pub location: Option<ErrorLocation>,
}

/// Location of a failure within the statement text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct ErrorLocation {
    /// 1-based line of the failing statement.
    #[serde(default, rename = "failingLine")]
    pub failing_line: Option<u32>,
    /// Start offset within the statement.
    #[serde(default, rename = "startOffset")]
    pub start_offset: Option<u32>,
    /// End offset within the statement.
    #[serde(default, rename = "endOffset")]
    pub end_offset: Option<u32>,
}

impl std::fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}, offset {}..{}",
            self.failing_line.unwrap_or(0),
            self.start_offset.unwrap_or(0),
            self.end_offset.unwrap_or(0)
        )
    }
}

/// Collection of structured server errors from one response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredError {
    /// The server's `errors` array.
    pub errors: Vec<ServerError>,
}

impl StructuredError {
    /// Wrap a server `errors` array.
    #[must_use]
    pub fn new(errors: Vec<ServerError>) -> Self {
        Self { errors }
    }
}

impl std::fmt::Display for StructuredError {
    // Renders as "{severity}: {name} ({code}) - {description} at {location},
    // see {helpLink}" per error, joined with commas.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for error in &self.errors {
            if !first {
                f.write_str(",\n")?;
            }
            first = false;
            if let Some(severity) = &error.severity {
                write!(f, "{severity}: ")?;
            }
            if let Some(name) = &error.name {
                write!(f, "{name} ")?;
            }
            if let Some(code) = &error.code {
                write!(f, "({code}) ")?;
            }
            if let Some(description) = &error.description {
                write!(f, "- {description}")?;
            }
            if let Some(location) = &error.location {
                write!(f, " at {location}")?;
            }
            if let Some(help_link) = &error.help_link {
                write!(f, ", see {help_link}")?;
            }
        }
        Ok(())
    }
}

impl From<StructuredError> for Error {
    fn from(e: StructuredError) -> Self {
        Self::Structured(e)
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn server_error() -> ServerError {
        ServerError {
            code: Some("FB001".to_owned()),
            name: Some("SyntaxError".to_owned()),
            severity: Some("ERROR".to_owned()),
            description: Some("unexpected token".to_owned()),
            help_link: Some("https://docs.firebolt.io/err".to_owned()),
            location: Some(ErrorLocation {
                failing_line: Some(2),
                start_offset: Some(5),
                end_offset: Some(9),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_structured_error_rendering() {
        let error = StructuredError::new(vec![server_error()]);
        assert_eq!(
            error.to_string(),
            "ERROR: SyntaxError (FB001) - unexpected token at line 2, offset 5..9, \
             see https://docs.firebolt.io/err"
        );
    }

    #[test]
    fn test_structured_error_joins_multiple() {
        let error = StructuredError::new(vec![server_error(), server_error()]);
        assert!(error.to_string().contains(",\n"));
    }

    #[test]
    fn test_structured_error_skips_missing_fields() {
        let error = StructuredError::new(vec![ServerError {
            description: Some("just a message".to_owned()),
            ..Default::default()
        }]);
        assert_eq!(error.to_string(), "- just a message");
    }

    #[test]
    fn test_severity_predicates() {
        assert!(Error::Configuration("x".into()).is_interface_error());
        assert!(Error::ConnectionClosed("commit").is_operational_error());
        assert!(Error::ConnectionClosed("commit").is_database_error());
        assert!(Error::CursorClosed("fetchone").is_programming_error());
        assert!(Error::QueryTimeout.is_operational_error());
        assert!(Error::Data("x".into()).is_database_error());
        assert!(Error::Authorization("x".into()).is_auth_error());
        assert!(!Error::Data("x".into()).is_interface_error());
    }

    #[test]
    fn test_sql_error_mapping() {
        use firebolt_sql::SqlError;
        assert!(matches!(
            Error::from(SqlError::MultiStatementParameters),
            Error::NotSupported(_)
        ));
        assert!(matches!(
            Error::from(SqlError::InvalidSetStatement("SET x".into())),
            Error::Interface(_)
        ));
        assert!(matches!(
            Error::from(SqlError::NotEnoughParameters { given: 1 }),
            Error::Data(_)
        ));
    }

    #[test]
    fn test_server_error_deserializes_camel_case() {
        let raw = serde_json::json!({
            "code": "FB001",
            "name": "E",
            "severity": "ERROR",
            "description": "boom",
            "helpLink": "https://example.com",
            "location": {"failingLine": 1, "startOffset": 0, "endOffset": 3}
        });
        let parsed: ServerError = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.help_link.as_deref(), Some("https://example.com"));
        assert_eq!(parsed.location.unwrap().failing_line, Some(1));
    }
}
