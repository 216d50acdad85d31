//! Blocking facade over the async driver.
//!
//! Wraps the async [`Connection`](crate::Connection) and
//! [`Cursor`](crate::Cursor) in an owned current-thread runtime, mirroring
//! the driver's dual sync/async surface without duplicating the HTTP layer.
//! Connections are safe to share across threads; cursors are not.

use std::sync::Arc;
use std::time::Duration;

use firebolt_types::{Column, Value};
use tokio::runtime::Runtime;

use crate::config::ConnectParams;
use crate::error::{Error, Result};
use crate::row_set::Statistics;

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Interface(format!("failed to start runtime: {e}")))
}

/// Open a blocking connection.
pub fn connect(params: ConnectParams) -> Result<Connection> {
    let runtime = Arc::new(build_runtime()?);
    let inner = runtime.block_on(crate::connect(params))?;
    Ok(Connection { runtime, inner })
}

/// Blocking counterpart of [`crate::Connection`].
#[derive(Clone)]
pub struct Connection {
    runtime: Arc<Runtime>,
    inner: crate::Connection,
}

impl Connection {
    /// Create a cursor over this connection.
    pub fn cursor(&self) -> Result<Cursor> {
        Ok(Cursor {
            runtime: Arc::clone(&self.runtime),
            inner: self.inner.cursor()?,
        })
    }

    /// Whether the connection has been closed.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.inner.closed()
    }

    /// Close the connection and every live cursor.
    pub fn close(&self) {
        self.runtime.block_on(self.inner.close());
    }

    /// Currently pinned database, if any.
    #[must_use]
    pub fn database(&self) -> Option<String> {
        self.inner.database()
    }

    /// Commit the open transaction, if any.
    pub fn commit(&self) -> Result<()> {
        self.runtime.block_on(self.inner.commit())
    }

    /// Roll back the open transaction, if any.
    pub fn rollback(&self) -> Result<()> {
        self.runtime.block_on(self.inner.rollback())
    }

    /// Whether a server-side async query is still running.
    pub fn is_async_query_running(&self, token: &str) -> Result<bool> {
        self.runtime.block_on(self.inner.is_async_query_running(token))
    }

    /// Whether a server-side async query finished successfully.
    pub fn is_async_query_successful(&self, token: &str) -> Result<Option<bool>> {
        self.runtime
            .block_on(self.inner.is_async_query_successful(token))
    }

    /// Cancel a server-side async query.
    pub fn cancel_async_query(&self, token: &str) -> Result<()> {
        self.runtime.block_on(self.inner.cancel_async_query(token))
    }
}

/// Blocking counterpart of [`crate::Cursor`].
pub struct Cursor {
    runtime: Arc<Runtime>,
    inner: crate::Cursor,
}

impl Cursor {
    /// Execute a query with optional positional parameters.
    pub fn execute(&mut self, query: &str, parameters: Option<&[Value]>) -> Result<i64> {
        self.runtime.block_on(self.inner.execute(query, parameters))
    }

    /// Execute a query once per parameter set.
    pub fn executemany(&mut self, query: &str, parameters: &[Vec<Value>]) -> Result<i64> {
        self.runtime
            .block_on(self.inner.executemany(query, parameters))
    }

    /// Execute with an absolute batch timeout.
    pub fn execute_with_timeout(
        &mut self,
        query: &str,
        parameters: Option<&[Value]>,
        timeout: Duration,
    ) -> Result<i64> {
        self.runtime
            .block_on(self.inner.execute_with_timeout(query, parameters, timeout))
    }

    /// Execute in streaming mode.
    pub fn execute_stream(&mut self, query: &str, parameters: Option<&[Value]>) -> Result<()> {
        self.runtime
            .block_on(self.inner.execute_stream(query, parameters))
    }

    /// Submit a server-side async statement, returning its token.
    pub fn execute_async(&mut self, query: &str, parameters: Option<&[Value]>) -> Result<String> {
        self.runtime
            .block_on(self.inner.execute_async(query, parameters))
    }

    /// Fetch the next row.
    pub fn fetchone(&mut self) -> Result<Option<Vec<Value>>> {
        self.runtime.block_on(self.inner.fetchone())
    }

    /// Fetch up to `size` rows (default arraysize).
    pub fn fetchmany(&mut self, size: Option<usize>) -> Result<Vec<Vec<Value>>> {
        self.runtime.block_on(self.inner.fetchmany(size))
    }

    /// Drain the current result block.
    pub fn fetchall(&mut self) -> Result<Vec<Vec<Value>>> {
        self.runtime.block_on(self.inner.fetchall())
    }

    /// Advance to the next result block.
    pub fn nextset(&mut self) -> Result<bool> {
        self.runtime.block_on(self.inner.nextset())
    }

    /// Column descriptions of the current result block.
    pub fn description(&self) -> Result<Option<Vec<Column>>> {
        self.runtime.block_on(self.inner.description())
    }

    /// Row count of the current result block.
    pub fn rowcount(&self) -> Result<i64> {
        self.runtime.block_on(self.inner.rowcount())
    }

    /// Statistics of the current result block.
    pub fn statistics(&self) -> Result<Option<Statistics>> {
        self.runtime.block_on(self.inner.statistics())
    }

    /// Default fetch size.
    #[must_use]
    pub fn arraysize(&self) -> usize {
        self.inner.arraysize()
    }

    /// Change the default fetch size.
    pub fn set_arraysize(&mut self, arraysize: usize) {
        self.inner.set_arraysize(arraysize);
    }

    /// Whether the cursor is closed.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.inner.closed()
    }

    /// Close the cursor.
    pub fn close(&mut self) {
        self.runtime.block_on(self.inner.close());
    }
}
