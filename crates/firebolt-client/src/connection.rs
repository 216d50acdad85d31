//! Connection bootstrap and lifecycle.
//!
//! A user-facing logical connection (account → system engine → user engine →
//! database) resolves into a concrete HTTP endpoint here. The bootstrap is
//! gated on the deployment generation derived from the auth value; V2
//! connections discover the system engine and optionally resolve a user
//! engine through it.

use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use firebolt_auth::{CacheKey, EngineInfo, connection_cache};
use firebolt_sql::StatementFormatter;
use firebolt_types::{EscapeStyle, Value};
use reqwest::StatusCode;
use url::Url;

use crate::config::ConnectParams;
use crate::cursor::{Cursor, CursorHandle};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestSpec};
use crate::planner::ParamStyle;
use crate::session::SessionState;
use crate::urls::{ENGINE_URL_BY_ACCOUNT_NAME, format_account_url};
use crate::util::parse_url;

#[cfg(feature = "v1")]
mod v1;

/// Engine status required for statement execution.
const ENGINE_STATUS_RUNNING: &str = "Running";

/// Default database on Core deployments.
const CORE_DEFAULT_DATABASE: &str = "firebolt";

/// Statuses meaning an async query is still in flight.
const ASYNC_RUNNING_STATUSES: [&str; 2] = ["RUNNING", "STARTED_EXECUTION"];
/// Status meaning an async query finished successfully.
const ASYNC_SUCCESS_STATUS: &str = "ENDED_SUCCESSFULLY";

pub(crate) struct ConnectionInner {
    pub(crate) http: HttpClient,
    pub(crate) session: parking_lot::Mutex<SessionState>,
    pub(crate) formatter: StatementFormatter,
    pub(crate) paramstyle: ParamStyle,
    cursors: parking_lot::Mutex<Vec<Weak<CursorHandle>>>,
    closed: AtomicBool,
    pub(crate) autocommit: AtomicBool,
    account_name: Option<String>,
    system: Option<Connection>,
    is_system: bool,
}

impl ConnectionInner {
    pub(crate) fn register_cursor(&self, handle: &Arc<CursorHandle>) {
        let mut cursors = self.cursors.lock();
        cursors.retain(|weak| weak.strong_count() > 0);
        cursors.push(Arc::downgrade(handle));
    }

    /// Apply dynamic response headers atomically.
    pub(crate) fn apply_response_headers(&self, headers: &reqwest::header::HeaderMap) -> Result<()> {
        self.session.lock().apply_response_headers(headers)
    }
}

/// An open connection to a Firebolt engine. Implements the PEP-249
/// connection surface.
///
/// Cloning is cheap and shares all state; the blocking facade and the
/// system-engine sub-connection rely on this.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    fn new(
        http: HttpClient,
        engine_url: Url,
        database: Option<&str>,
        params: &ConnectParams,
        system: Option<Connection>,
        is_system: bool,
    ) -> Self {
        let escape_style = escape_style_for(&params.auth);
        Self {
            inner: Arc::new(ConnectionInner {
                http,
                session: parking_lot::Mutex::new(SessionState::new(engine_url, database)),
                formatter: StatementFormatter::new(escape_style),
                paramstyle: params.paramstyle,
                cursors: parking_lot::Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                autocommit: AtomicBool::new(params.autocommit),
                account_name: params.account_name.clone(),
                system,
                is_system,
            }),
        }
    }

    #[cfg(feature = "v1")]
    pub(crate) fn new_v1(
        http: HttpClient,
        engine_url: Url,
        database: &str,
        params: &ConnectParams,
    ) -> Self {
        Self::new(http, engine_url, Some(database), params, None, false)
    }

    /// Create a cursor over this connection.
    pub fn cursor(&self) -> Result<Cursor> {
        if self.closed() {
            return Err(Error::ConnectionClosed("create cursor"));
        }
        Ok(Cursor::new(Arc::clone(&self.inner)))
    }

    pub(crate) fn catalog_cursor(&self) -> Result<Cursor> {
        if self.closed() {
            return Err(Error::ConnectionClosed("create cursor"));
        }
        Ok(Cursor::internal(Arc::clone(&self.inner)))
    }

    /// Whether the connection has been closed.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close the connection: every live cursor first, then the system-engine
    /// sub-connection. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let handles: Vec<Arc<CursorHandle>> = {
            let cursors = self.inner.cursors.lock();
            cursors.iter().filter_map(Weak::upgrade).collect()
        };
        for handle in handles {
            handle.close().await;
        }
        if let Some(system) = &self.inner.system {
            Box::pin(system.close()).await;
        }
    }

    /// Currently pinned database, if any.
    #[must_use]
    pub fn database(&self) -> Option<String> {
        self.inner.session.lock().database().map(str::to_owned)
    }

    /// Current engine endpoint.
    #[must_use]
    pub fn engine_url(&self) -> String {
        self.inner.session.lock().engine_url().to_string()
    }

    /// Whether statements commit implicitly.
    #[must_use]
    pub fn autocommit(&self) -> bool {
        self.inner.autocommit.load(Ordering::Acquire)
    }

    /// Toggle autocommit. With autocommit off the server opens a transaction
    /// on the first statement and the driver forwards its id afterwards.
    pub fn set_autocommit(&self, autocommit: bool) {
        self.inner.autocommit.store(autocommit, Ordering::Release);
    }

    /// Whether a server-managed transaction is currently open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.inner.session.lock().transaction_id().is_some()
    }

    /// Commit the open transaction, if any.
    pub async fn commit(&self) -> Result<()> {
        if self.closed() {
            return Err(Error::ConnectionClosed("commit"));
        }
        if !self.in_transaction() {
            return Ok(());
        }
        let mut cursor = self.cursor()?;
        cursor.execute("COMMIT", None).await?;
        Ok(())
    }

    /// Roll back the open transaction, if any.
    pub async fn rollback(&self) -> Result<()> {
        if self.closed() {
            return Err(Error::ConnectionClosed("rollback"));
        }
        if !self.in_transaction() {
            return Ok(());
        }
        let mut cursor = self.cursor()?;
        cursor.execute("ROLLBACK", None).await?;
        Ok(())
    }

    /// Resolve the account id for this connection's account, consulting the
    /// process-wide cache first.
    pub async fn account_id(&self) -> Result<String> {
        if self.closed() {
            return Err(Error::ConnectionClosed("resolve account id"));
        }
        let Some(account_name) = &self.inner.account_name else {
            return Err(Error::Configuration(
                "connection has no account name".to_owned(),
            ));
        };
        self.inner.http.account_id(account_name).await
    }

    /// Verify that a database exists, through the system engine.
    pub async fn is_database_available(&self, database: &str) -> Result<bool> {
        let lookup = self.system_or_self();
        let mut cursor = lookup.catalog_cursor()?;
        let count = cursor
            .execute(
                "SELECT 1 FROM information_schema.databases WHERE database_name=?",
                Some(&[Value::from(database)]),
            )
            .await?;
        Ok(count > 0)
    }

    /// Full status record of a server-side async query.
    pub async fn get_async_query_info(&self, token: &str) -> Result<AsyncQueryInfo> {
        let lookup = self.system_or_self();
        let mut cursor = lookup.catalog_cursor()?;
        cursor
            .execute(
                "SELECT status, query_id FROM information_schema.engine_query_history \
                 WHERE query_token=?",
                Some(&[Value::from(token)]),
            )
            .await?;
        let Some(row) = cursor.fetchone().await? else {
            return Err(Error::Operational(format!(
                "no async query found for token {token}"
            )));
        };
        let status = row
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let query_id = row.get(1).and_then(Value::as_str).map(str::to_owned);
        Ok(AsyncQueryInfo { status, query_id })
    }

    /// Whether a server-side async query is still running.
    pub async fn is_async_query_running(&self, token: &str) -> Result<bool> {
        let info = self.get_async_query_info(token).await?;
        Ok(ASYNC_RUNNING_STATUSES.contains(&info.status.as_str()))
    }

    /// Whether a server-side async query finished successfully.
    ///
    /// `None` while the query is still running.
    pub async fn is_async_query_successful(&self, token: &str) -> Result<Option<bool>> {
        let info = self.get_async_query_info(token).await?;
        if ASYNC_RUNNING_STATUSES.contains(&info.status.as_str()) {
            return Ok(None);
        }
        Ok(Some(info.status == ASYNC_SUCCESS_STATUS))
    }

    /// Cancel a server-side async query.
    pub async fn cancel_async_query(&self, token: &str) -> Result<()> {
        let info = self.get_async_query_info(token).await?;
        let Some(query_id) = info.query_id else {
            return Err(Error::Operational(format!(
                "async query for token {token} has no query id"
            )));
        };
        let lookup = self.system_or_self();
        let mut cursor = lookup.catalog_cursor()?;
        cursor
            .execute("CANCEL QUERY WHERE query_id=?", Some(&[Value::from(query_id)]))
            .await?;
        Ok(())
    }

    fn system_or_self(&self) -> &Connection {
        self.inner.system.as_ref().unwrap_or(self)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("engine_url", &self.engine_url())
            .field("database", &self.database())
            .field("closed", &self.closed())
            .field("is_system", &self.inner.is_system)
            .finish_non_exhaustive()
    }
}

/// Status record of a server-side async query.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct AsyncQueryInfo {
    /// Lifecycle status, e.g. `RUNNING` or `ENDED_SUCCESSFULLY`.
    pub status: String,
    /// Server-assigned query id, once known.
    pub query_id: Option<String>,
}

/// Open a connection, bootstrapping per the auth value's deployment
/// generation.
pub async fn connect(params: ConnectParams) -> Result<Connection> {
    match params.auth.version() {
        firebolt_auth::FireboltVersion::Core => connect_core(params),
        firebolt_auth::FireboltVersion::V2 => connect_v2(params).await,
        firebolt_auth::FireboltVersion::V1 => {
            #[cfg(feature = "v1")]
            {
                v1::connect_v1(params).await
            }
            #[cfg(not(feature = "v1"))]
            {
                Err(Error::Configuration(
                    "username/password authentication requires the `v1` feature".to_owned(),
                ))
            }
        }
    }
}

fn connect_core(params: ConnectParams) -> Result<Connection> {
    // Core deployments have no accounts or engines to resolve; these
    // parameters indicate a misconfigured caller.
    for (name, present) in [
        ("account_name", params.account_name.is_some()),
        ("engine_name", params.engine_name.is_some()),
        ("engine_url", params.engine_url.is_some()),
    ] {
        if present {
            return Err(Error::Configuration(format!(
                "{name} is not compatible with Firebolt Core connections"
            )));
        }
    }
    let engine_url = params
        .auth
        .core_url()
        .ok_or_else(|| Error::Configuration("Core auth is missing its URL".to_owned()))?;
    let engine_url = parse_url(engine_url)?;
    let api_endpoint = engine_url.clone();
    let http = HttpClient::new(
        params.auth.clone(),
        api_endpoint,
        params.user_agent.user_agent(),
    )?;
    let database = params.database.clone();
    Ok(Connection::new(
        http,
        engine_url,
        Some(database.as_deref().unwrap_or(CORE_DEFAULT_DATABASE)),
        &params,
        None,
        false,
    ))
}

async fn connect_v2(params: ConnectParams) -> Result<Connection> {
    let account_name = params
        .account_name
        .clone()
        .ok_or_else(|| Error::Configuration("account_name is required to connect".to_owned()))?;
    let api_endpoint = parse_url(&params.api_endpoint)?;
    let http = HttpClient::new(
        params.auth.clone(),
        api_endpoint.clone(),
        params.user_agent.user_agent(),
    )?;

    let system_url = system_engine_url(&http, &account_name).await?;
    let system_connection = Connection::new(
        http.clone(),
        system_url,
        params.database.as_deref(),
        &params,
        None,
        true,
    );

    let Some(engine_name) = params.engine_name.clone() else {
        // The system engine routes statements itself, with or without a
        // pinned database.
        return Ok(system_connection);
    };

    match resolve_user_engine(&system_connection, &engine_name, params.database.as_deref()).await {
        Ok((engine_url, database)) => {
            let user_http = HttpClient::new(
                params.auth.clone(),
                api_endpoint,
                params.user_agent.user_agent(),
            )?;
            Ok(Connection::new(
                user_http,
                engine_url,
                Some(&database),
                &params,
                Some(system_connection),
                false,
            ))
        }
        Err(error) => {
            system_connection.close().await;
            Err(error)
        }
    }
}

/// Discover the account's system-engine endpoint, consulting the
/// process-wide cache first.
async fn system_engine_url(http: &HttpClient, account_name: &str) -> Result<Url> {
    let cache = connection_cache();
    let key = CacheKey::new(http.auth().principal(), http.auth().secret(), Some(account_name));
    if let Some(info) = cache.get(&key) {
        if let Some(engine) = &info.system_engine {
            tracing::debug!(account_name, "system engine endpoint found in cache");
            return parse_url(&engine.url);
        }
    }

    let url = http
        .api_endpoint()
        .join(&format_account_url(ENGINE_URL_BY_ACCOUNT_NAME, account_name))
        .map_err(|e| Error::Configuration(format!("invalid account name: {e}")))?;
    let response = http.send(&RequestSpec::get(url.clone())).await?;
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(Error::AccountNotFound(account_name.to_owned()));
    }
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(Error::Interface(format!(
            "Unable to retrieve system engine endpoint {url}: {status} {}",
            String::from_utf8_lossy(&body)
        )));
    }
    let parsed: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| Error::Interface(format!("invalid system engine response: {e}")))?;
    let engine_url = parsed
        .get("engineUrl")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Interface("system engine response missing engineUrl".to_owned()))?;
    let engine_url = parse_url(engine_url)?;

    cache.update(&key, |info| {
        info.system_engine = Some(EngineInfo {
            url: engine_url.to_string(),
            params: Vec::new(),
        });
    });
    Ok(engine_url)
}

/// Resolve a user engine through the system engine's catalog.
///
/// Returns the engine endpoint and the database to pin (the caller's, or the
/// engine's attachment when the caller did not supply one).
async fn resolve_user_engine(
    system: &Connection,
    engine_name: &str,
    database: Option<&str>,
) -> Result<(Url, String)> {
    let mut cursor = system.catalog_cursor()?;
    cursor
        .execute(
            "SELECT url, attached_to, status FROM information_schema.engines \
             WHERE engine_name=?",
            Some(&[Value::from(engine_name)]),
        )
        .await?;
    let Some(row) = cursor.fetchone().await? else {
        return Err(Error::EngineNotFound(engine_name.to_owned()));
    };

    let url = row.first().and_then(Value::as_str).unwrap_or_default().to_owned();
    let attached_to = row.get(1).and_then(Value::as_str).map(str::to_owned);
    let status = row.get(2).and_then(Value::as_str).unwrap_or_default();

    if status != ENGINE_STATUS_RUNNING {
        return Err(Error::EngineNotRunning(engine_name.to_owned()));
    }
    let database = match (database, attached_to) {
        (Some(requested), Some(attached)) if requested != attached => {
            return Err(Error::Interface(format!(
                "Engine {engine_name} is attached to {attached} instead of {requested}"
            )));
        }
        (Some(requested), _) => requested.to_owned(),
        (None, Some(attached)) => attached,
        (None, None) => {
            return Err(Error::EngineNotFound(format!(
                "{engine_name} (not attached to any database)"
            )));
        }
    };

    let engine_url = parse_url(&url)?;
    let cache = connection_cache();
    let key = CacheKey::new(
        system.inner.http.auth().principal(),
        system.inner.http.auth().secret(),
        None,
    );
    cache.update(&key, |info| {
        info.engines.insert(
            engine_name.to_owned(),
            EngineInfo {
                url: engine_url.to_string(),
                params: vec![("database".to_owned(), database.clone())],
            },
        );
    });
    Ok((engine_url, database))
}

fn escape_style_for(auth: &firebolt_auth::Auth) -> EscapeStyle {
    #[cfg(feature = "v1")]
    if auth.version() == firebolt_auth::FireboltVersion::V1 {
        return EscapeStyle::V1;
    }
    let _ = auth;
    EscapeStyle::V2
}
