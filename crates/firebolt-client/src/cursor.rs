//! Statement execution and fetch semantics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use firebolt_sql::{SetParameter, Statement};
use firebolt_types::{Column, Value};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::connection::ConnectionInner;
use crate::error::{Error, Result};
use crate::http::{RequestSpec, check_response};
use crate::planner::{self, JSON_OUTPUT_FORMAT, ParamStyle};
use crate::row_set::{BufferedRowSet, RowSet, Statistics, StreamingRowSet};
use crate::session::validate_set_parameter;
use crate::timeout::TimeoutController;

/// Cursor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    /// No query has run yet.
    None,
    /// The last execution failed.
    Error,
    /// The last execution completed.
    Done,
    /// The cursor is closed.
    Closed,
}

/// Shared cursor state reachable from the connection's registry, so a
/// connection close can cascade into cursors still held by the caller.
pub(crate) struct CursorHandle {
    closed: AtomicBool,
    state: parking_lot::Mutex<CursorState>,
    row_set: tokio::sync::Mutex<Option<RowSet>>,
}

impl CursorHandle {
    fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            state: parking_lot::Mutex::new(CursorState::None),
            row_set: tokio::sync::Mutex::new(None),
        }
    }

    pub(crate) async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        *self.state.lock() = CursorState::Closed;
        if let Some(mut row_set) = self.row_set.lock().await.take() {
            row_set.close();
        }
    }
}

// CREATE EXTERNAL TABLE statements carry credentials; never log those.
static SENSITIVE_QUERY: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new("(?i)aws_key_id|credentials").ok());

fn log_query(query: &str) {
    let sensitive = SENSITIVE_QUERY
        .as_ref()
        .is_some_and(|re| re.is_match(query));
    if !sensitive {
        tracing::debug!(%query, "running query");
    }
}

/// A database cursor. Created with [`Connection::cursor`](crate::Connection::cursor).
///
/// Statements on one cursor are strictly sequential (`&mut self`); use
/// separate cursors for interleaved statements.
pub struct Cursor {
    conn: Arc<ConnectionInner>,
    handle: Arc<CursorHandle>,
    paramstyle: ParamStyle,
    arraysize: usize,
    async_token: Option<String>,
}

impl Cursor {
    pub(crate) fn new(conn: Arc<ConnectionInner>) -> Self {
        let paramstyle = conn.paramstyle;
        Self::with_paramstyle(conn, paramstyle)
    }

    /// Internal cursor for catalog queries; always plans with `?`
    /// placeholders regardless of the connection's paramstyle.
    pub(crate) fn internal(conn: Arc<ConnectionInner>) -> Self {
        Self::with_paramstyle(conn, ParamStyle::Qmark)
    }

    fn with_paramstyle(conn: Arc<ConnectionInner>, paramstyle: ParamStyle) -> Self {
        let handle = Arc::new(CursorHandle::new());
        conn.register_cursor(&handle);
        Self {
            conn,
            handle,
            paramstyle,
            arraysize: 1,
            async_token: None,
        }
    }

    /// Number of rows [`fetchmany`](Self::fetchmany) returns by default.
    #[must_use]
    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    /// Change the default fetch size.
    pub fn set_arraysize(&mut self, arraysize: usize) {
        self.arraysize = arraysize.max(1);
    }

    /// Whether the cursor is closed.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.handle.closed.load(Ordering::Acquire)
    }

    /// Close the cursor, releasing any held result streams. Idempotent.
    pub async fn close(&mut self) {
        self.handle.close().await;
    }

    fn check_not_closed(&self, method: &'static str) -> Result<()> {
        if self.closed() {
            return Err(Error::CursorClosed(method));
        }
        Ok(())
    }

    fn check_query_ran(&self, method: &'static str) -> Result<()> {
        if self.async_token.is_some() {
            return Err(Error::MethodNotAllowedInAsync(method));
        }
        match *self.handle.state.lock() {
            CursorState::Done => Ok(()),
            CursorState::Closed => Err(Error::CursorClosed(method)),
            CursorState::None | CursorState::Error => Err(Error::QueryNotRun(method)),
        }
    }

    /// Execute a query with optional positional parameters. Returns the row
    /// count of the first result block (−1 when unknown).
    pub async fn execute(&mut self, query: &str, parameters: Option<&[Value]>) -> Result<i64> {
        let parameters: Vec<Vec<Value>> = parameters.map(|p| vec![p.to_vec()]).unwrap_or_default();
        self.execute_inner(query, &parameters, false, false, None)
            .await?;
        self.rowcount().await
    }

    /// Execute a query once per parameter set.
    pub async fn executemany(&mut self, query: &str, parameters: &[Vec<Value>]) -> Result<i64> {
        self.execute_inner(query, parameters, false, false, None)
            .await?;
        self.rowcount().await
    }

    /// Execute with an absolute timeout across the whole (possibly
    /// multi-statement) batch.
    pub async fn execute_with_timeout(
        &mut self,
        query: &str,
        parameters: Option<&[Value]>,
        timeout: Duration,
    ) -> Result<i64> {
        let parameters: Vec<Vec<Value>> = parameters.map(|p| vec![p.to_vec()]).unwrap_or_default();
        self.execute_inner(query, &parameters, false, false, Some(timeout))
            .await?;
        self.rowcount().await
    }

    /// Execute in streaming mode: rows are decoded incrementally from a
    /// JSON-Lines response with bounded memory.
    pub async fn execute_stream(
        &mut self,
        query: &str,
        parameters: Option<&[Value]>,
    ) -> Result<()> {
        let parameters: Vec<Vec<Value>> = parameters.map(|p| vec![p.to_vec()]).unwrap_or_default();
        self.execute_inner(query, &parameters, true, false, None)
            .await
    }

    /// Submit a statement for server-side async execution and return its
    /// token for later status polling.
    pub async fn execute_async(
        &mut self,
        query: &str,
        parameters: Option<&[Value]>,
    ) -> Result<String> {
        let parameters: Vec<Vec<Value>> = parameters.map(|p| vec![p.to_vec()]).unwrap_or_default();
        self.execute_inner(query, &parameters, false, true, None)
            .await?;
        self.async_query_token()
    }

    /// Token of the last async submission.
    pub fn async_query_token(&self) -> Result<String> {
        self.async_token.clone().ok_or_else(|| {
            Error::Programming("No async query was executed or query was not async".to_owned())
        })
    }

    async fn execute_inner(
        &mut self,
        query: &str,
        parameters: &[Vec<Value>],
        streaming: bool,
        async_execution: bool,
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.check_not_closed("execute")?;
        if async_execution
            && self.conn.http.auth().version() == firebolt_auth::FireboltVersion::V1
        {
            return Err(Error::V1NotSupported("Server-side asynchronous execution"));
        }

        // Reset per-statement state.
        if let Some(mut old) = self.handle.row_set.lock().await.take() {
            old.close();
        }
        *self.handle.state.lock() = CursorState::None;
        self.async_token = None;

        let plan = planner::plan(
            self.paramstyle,
            &self.conn.formatter,
            query,
            parameters,
            streaming,
            async_execution,
        )?;
        let controller = TimeoutController::new(timeout);

        match self.run_plan(&plan, &controller).await {
            Ok(()) => {
                *self.handle.state.lock() = CursorState::Done;
                Ok(())
            }
            Err(error) => {
                *self.handle.state.lock() = CursorState::Error;
                if let Some(mut row_set) = self.handle.row_set.lock().await.take() {
                    row_set.close();
                }
                Err(error)
            }
        }
    }

    async fn run_plan(
        &mut self,
        plan: &planner::ExecutionPlan,
        controller: &TimeoutController,
    ) -> Result<()> {
        let mut row_set = if plan.streaming {
            RowSet::Streaming(StreamingRowSet::new())
        } else {
            RowSet::Buffered(BufferedRowSet::new())
        };

        for statement in &plan.statements {
            controller.raise_if_timeout()?;
            match statement {
                Statement::Set(parameter) => {
                    validate_set_parameter(parameter)?;
                    self.probe_and_stage(parameter, controller).await?;
                }
                Statement::Query(sql) => {
                    log_query(sql);
                    let response = self.send_statement(sql, plan, controller).await?;
                    let response = check_response(response).await?;
                    self.conn.apply_response_headers(response.headers())?;

                    if plan.async_execution {
                        let body = response.bytes().await?;
                        self.async_token = Some(parse_async_token(&body)?);
                    } else if plan.streaming {
                        let RowSet::Streaming(streaming_set) = &mut row_set else {
                            return Err(Error::Internal("row set mode mismatch".to_owned()));
                        };
                        streaming_set.append_response(response.into_live()?).await?;
                    } else {
                        let RowSet::Buffered(buffered_set) = &mut row_set else {
                            return Err(Error::Internal("row set mode mismatch".to_owned()));
                        };
                        let body = response.bytes().await?;
                        buffered_set.append_response(&body)?;
                    }
                }
            }
        }

        if !plan.async_execution {
            *self.handle.row_set.lock().await = Some(row_set);
        }
        Ok(())
    }

    /// Validate a `SET` against the server with a probe request, then stage
    /// it into the session so it rides along on subsequent statements.
    async fn probe_and_stage(
        &mut self,
        parameter: &SetParameter,
        controller: &TimeoutController,
    ) -> Result<()> {
        let (url, mut query) = {
            let session = self.conn.session.lock();
            (session.engine_url().clone(), session.request_params())
        };
        query.push((parameter.name.clone(), parameter.value.clone()));
        query.push(("output_format".to_owned(), JSON_OUTPUT_FORMAT.to_owned()));

        let mut spec = RequestSpec::post(url, query, "SELECT 1".to_owned());
        spec.timeout = controller.remaining();
        let response = self.conn.http.send(&spec).await?;
        let response = check_response(response).await?;
        self.conn.apply_response_headers(response.headers())?;

        tracing::debug!(name = %parameter.name, "staging session parameter");
        self.conn.session.lock().stage_set(parameter.clone());
        Ok(())
    }

    async fn send_statement(
        &mut self,
        sql: &str,
        plan: &planner::ExecutionPlan,
        controller: &TimeoutController,
    ) -> Result<crate::http::HttpResponse> {
        let (url, mut query) = {
            let session = self.conn.session.lock();
            (session.engine_url().clone(), session.request_params())
        };
        query.extend(plan.query_params.iter().cloned());
        // With autocommit off the server keeps statements inside a
        // transaction until an explicit COMMIT/ROLLBACK.
        if !self.conn.autocommit.load(Ordering::Acquire) {
            query.push(("autocommit".to_owned(), "false".to_owned()));
        }

        let mut spec = RequestSpec::post(url, query, sql.to_owned());
        spec.timeout = controller.remaining();
        self.conn.http.send(&spec).await
    }

    /// A structured error arriving mid-stream poisons the cursor: the row
    /// set is closed and further fetches report that no query ran.
    fn poison_on_structured<T>(
        &self,
        guard: &mut Option<RowSet>,
        result: Result<T>,
    ) -> Result<T> {
        if matches!(result, Err(Error::Structured(_))) {
            if let Some(row_set) = guard.as_mut() {
                row_set.close();
            }
            *guard = None;
            *self.handle.state.lock() = CursorState::Error;
        }
        result
    }

    /// Fetch the next row, or `None` when the current block is exhausted.
    pub async fn fetchone(&mut self) -> Result<Option<Vec<Value>>> {
        self.check_not_closed("fetchone")?;
        self.check_query_ran("fetchone")?;
        let mut guard = self.handle.row_set.lock().await;
        let Some(row_set) = guard.as_mut() else {
            return Err(Error::QueryNotRun("fetchone"));
        };
        let result = row_set.next_row().await;
        self.poison_on_structured(&mut guard, result)
    }

    /// Fetch up to `size` rows (default [`arraysize`](Self::arraysize)).
    pub async fn fetchmany(&mut self, size: Option<usize>) -> Result<Vec<Vec<Value>>> {
        self.check_not_closed("fetchmany")?;
        self.check_query_ran("fetchmany")?;
        let size = size.unwrap_or(self.arraysize);
        let mut guard = self.handle.row_set.lock().await;
        let Some(row_set) = guard.as_mut() else {
            return Err(Error::QueryNotRun("fetchmany"));
        };
        let mut rows = Vec::with_capacity(size);
        let result = loop {
            if rows.len() >= size {
                break Ok(());
            }
            match row_set.next_row().await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => break Ok(()),
                Err(error) => break Err(error),
            }
        };
        self.poison_on_structured(&mut guard, result)?;
        Ok(rows)
    }

    /// Drain the current result block.
    pub async fn fetchall(&mut self) -> Result<Vec<Vec<Value>>> {
        self.check_not_closed("fetchall")?;
        self.check_query_ran("fetchall")?;
        let mut guard = self.handle.row_set.lock().await;
        let Some(row_set) = guard.as_mut() else {
            return Err(Error::QueryNotRun("fetchall"));
        };
        let mut rows = Vec::new();
        let result = loop {
            match row_set.next_row().await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => break Ok(()),
                Err(error) => break Err(error),
            }
        };
        self.poison_on_structured(&mut guard, result)?;
        Ok(rows)
    }

    /// Advance to the next result block of a multi-statement execution.
    pub async fn nextset(&mut self) -> Result<bool> {
        self.check_not_closed("nextset")?;
        self.check_query_ran("nextset")?;
        let mut guard = self.handle.row_set.lock().await;
        match guard.as_mut() {
            Some(row_set) => row_set.next_set().await,
            None => Err(Error::QueryNotRun("nextset")),
        }
    }

    /// Column descriptions of the current result block.
    pub async fn description(&self) -> Result<Option<Vec<Column>>> {
        self.check_not_closed("description")?;
        let guard = self.handle.row_set.lock().await;
        Ok(guard.as_ref().map(|row_set| row_set.columns().to_vec()))
    }

    /// Row count of the current result block (−1 when unknown or before any
    /// query).
    pub async fn rowcount(&self) -> Result<i64> {
        self.check_not_closed("rowcount")?;
        let guard = self.handle.row_set.lock().await;
        Ok(guard.as_ref().map_or(-1, RowSet::row_count))
    }

    /// Statistics of the current result block, once available.
    pub async fn statistics(&self) -> Result<Option<Statistics>> {
        self.check_not_closed("statistics")?;
        let guard = self.handle.row_set.lock().await;
        Ok(guard.as_ref().and_then(|row_set| row_set.statistics().cloned()))
    }

    /// Predefine memory areas for parameters (PEP-249 no-op).
    pub fn setinputsizes(&self, _sizes: &[usize]) -> Result<()> {
        self.check_not_closed("setinputsizes")
    }

    /// Set a column buffer size for large fetches (PEP-249 no-op).
    pub fn setoutputsize(&self, _size: usize, _column: Option<usize>) -> Result<()> {
        self.check_not_closed("setoutputsize")
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("closed", &self.closed())
            .field("arraysize", &self.arraysize)
            .field("paramstyle", &self.paramstyle)
            .finish_non_exhaustive()
    }
}

fn parse_async_token(body: &[u8]) -> Result<String> {
    #[derive(serde::Deserialize)]
    struct AsyncSubmitResponse {
        token: String,
    }
    let parsed: AsyncSubmitResponse = serde_json::from_slice(body)
        .map_err(|e| Error::Operational(format!("invalid async submit response: {e}")))?;
    Ok(parsed.token)
}
