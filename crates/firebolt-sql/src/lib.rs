//! # firebolt-sql
//!
//! SQL text handling for the Firebolt driver: multi-statement splitting,
//! `SET <param> = <value>` detection, and client-side (`?`) placeholder
//! substitution.
//!
//! The scanner understands quoted strings, quoted identifiers and both SQL
//! comment styles, so splitting and substitution never fire inside literals:
//!
//! ```rust
//! use firebolt_sql::{Statement, StatementFormatter};
//! use firebolt_types::Value;
//!
//! let formatter = StatementFormatter::default();
//! let statements = formatter
//!     .split_format_sql("SELECT * FROM t WHERE name = ?", &[vec![Value::from("a;b")]])
//!     .unwrap();
//! assert_eq!(
//!     statements,
//!     vec![Statement::Query("SELECT * FROM t WHERE name = 'a;b'".to_owned())]
//! );
//! ```

pub mod error;
pub mod formatter;
mod scanner;

pub use error::SqlError;
pub use formatter::{SetParameter, Statement, StatementFormatter};
