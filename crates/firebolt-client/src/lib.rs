//! # firebolt-client
//!
//! Async client for the Firebolt cloud data warehouse, with a PEP-249-style
//! connection/cursor surface and a blocking facade.
//!
//! ## Features
//!
//! - **Connection bootstrap**: account → system engine → user engine →
//!   database resolution, with server-driven endpoint redirection
//! - **Typed results**: rows decode into [`Value`]s via the Firebolt type
//!   catalog, including arrays, structs and arbitrary-precision decimals
//! - **Two decoding modes**: buffered JSON bodies, or JSON-Lines streaming
//!   with bounded memory for large results
//! - **Parameters**: client-side `?` substitution or server-side `$N`
//!   binding, selected per connection
//! - **Server-side async queries**: submit, poll and cancel by token
//!
//! ## Example
//!
//! ```rust,no_run
//! use firebolt_auth::Auth;
//! use firebolt_client::{ConnectParams, connect};
//!
//! # async fn run() -> firebolt_client::Result<()> {
//! let connection = connect(
//!     ConnectParams::new(Auth::client_credentials("my-id", "my-secret"))
//!         .with_account_name("my-account")
//!         .with_database("sales"),
//! )
//! .await?;
//!
//! let mut cursor = connection.cursor()?;
//! cursor
//!     .execute("SELECT id, name FROM users WHERE id = ?", Some(&[1.into()]))
//!     .await?;
//! while let Some(row) = cursor.fetchone().await? {
//!     println!("{row:?}");
//! }
//!
//! connection.close().await;
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
mod http;
pub mod planner;
pub mod row_set;
pub mod session;
pub mod timeout;
pub mod urls;
pub mod user_agent;
mod util;

/// PEP-249 API level implemented by this driver.
pub const APILEVEL: &str = "2.0";
/// PEP-249 thread safety: connections may be shared across threads, cursors
/// may not.
pub const THREADSAFETY: u8 = 2;

pub use config::{ConnectParams, DEFAULT_API_ENDPOINT};
pub use connection::{AsyncQueryInfo, Connection, connect};
pub use cursor::Cursor;
pub use error::{Error, ErrorLocation, Result, ServerError, StructuredError};
pub use planner::{JSON_LINES_OUTPUT_FORMAT, JSON_OUTPUT_FORMAT, ParamStyle};
pub use row_set::Statistics;
pub use timeout::TimeoutController;
pub use user_agent::{DefaultUserAgent, UserAgentProvider};

// Re-export the building blocks callers interact with directly.
pub use firebolt_auth::Auth;
pub use firebolt_types::{Column, SqlType, Value};
