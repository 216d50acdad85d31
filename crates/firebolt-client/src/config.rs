//! Connection configuration.

use std::sync::Arc;

use firebolt_auth::Auth;

use crate::planner::ParamStyle;
use crate::user_agent::{DefaultUserAgent, UserAgentProvider};

/// Default API endpoint for cloud deployments.
pub const DEFAULT_API_ENDPOINT: &str = "api.app.firebolt.io";

/// Parameters for [`connect`](crate::connect).
///
/// ```rust,no_run
/// use firebolt_client::{ConnectParams, connect};
/// use firebolt_auth::Auth;
///
/// # async fn run() -> firebolt_client::Result<()> {
/// let connection = connect(
///     ConnectParams::new(Auth::client_credentials("id", "secret"))
///         .with_account_name("my-account")
///         .with_database("sales")
///         .with_engine_name("reporting"),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectParams {
    /// Authentication value; drives version detection.
    pub auth: Auth,
    /// Account name (required for V2).
    pub account_name: Option<String>,
    /// Database to pin, if any.
    pub database: Option<String>,
    /// User engine to resolve and execute on, if any.
    pub engine_name: Option<String>,
    /// Engine URL override (legacy V1 connections only).
    pub engine_url: Option<String>,
    /// API endpoint used for authentication and discovery.
    pub api_endpoint: String,
    /// Placeholder style for this connection's cursors.
    pub paramstyle: ParamStyle,
    /// When `false`, statements run inside a server-managed transaction
    /// until an explicit commit or rollback.
    pub autocommit: bool,
    /// User-agent provider for outgoing requests.
    pub user_agent: Arc<dyn UserAgentProvider>,
}

impl ConnectParams {
    /// Start building parameters around an auth value.
    #[must_use]
    pub fn new(auth: Auth) -> Self {
        Self {
            auth,
            account_name: None,
            database: None,
            engine_name: None,
            engine_url: None,
            api_endpoint: DEFAULT_API_ENDPOINT.to_owned(),
            paramstyle: ParamStyle::default(),
            autocommit: true,
            user_agent: Arc::new(DefaultUserAgent::default()),
        }
    }

    /// Set the account name.
    #[must_use]
    pub fn with_account_name(mut self, account_name: impl Into<String>) -> Self {
        self.account_name = Some(account_name.into());
        self
    }

    /// Set the database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the engine name.
    #[must_use]
    pub fn with_engine_name(mut self, engine_name: impl Into<String>) -> Self {
        self.engine_name = Some(engine_name.into());
        self
    }

    /// Set an explicit engine URL (legacy V1 connections only).
    #[must_use]
    pub fn with_engine_url(mut self, engine_url: impl Into<String>) -> Self {
        self.engine_url = Some(engine_url.into());
        self
    }

    /// Override the API endpoint (non-production environments).
    #[must_use]
    pub fn with_api_endpoint(mut self, api_endpoint: impl Into<String>) -> Self {
        self.api_endpoint = api_endpoint.into();
        self
    }

    /// Choose the placeholder style.
    #[must_use]
    pub fn with_paramstyle(mut self, paramstyle: ParamStyle) -> Self {
        self.paramstyle = paramstyle;
        self
    }

    /// Disable autocommit to run inside server-managed transactions.
    #[must_use]
    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// Replace the user-agent provider.
    #[must_use]
    pub fn with_user_agent(mut self, provider: Arc<dyn UserAgentProvider>) -> Self {
        self.user_agent = provider;
        self
    }
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("account_name", &self.account_name)
            .field("database", &self.database)
            .field("engine_name", &self.engine_name)
            .field("api_endpoint", &self.api_endpoint)
            .field("paramstyle", &self.paramstyle)
            .field("autocommit", &self.autocommit)
            .finish_non_exhaustive()
    }
}
