//! # firebolt-types
//!
//! Type mappings between Firebolt SQL types and Rust values.
//!
//! Firebolt reports column types as strings over its metadata channel
//! (`"Int32"`, `"Nullable(Decimal(38, 30))"`, `"Array(Date)"`, ...). This
//! crate parses those strings into [`SqlType`] values, converts raw JSON
//! cells into typed [`Value`]s, and formats Rust values back into SQL
//! literals for client-side parameter substitution.
//!
//! ## Example
//!
//! ```rust
//! use firebolt_types::{SqlType, Value, parse_type, parse_value};
//!
//! let ty = parse_type("Array(Nullable(Int32))");
//! assert_eq!(ty, SqlType::Array(Box::new(SqlType::Int)));
//!
//! let raw = serde_json::json!([1, null, 3]);
//! let value = parse_value(&raw, &ty).unwrap();
//! assert_eq!(
//!     value,
//!     Value::Array(vec![Value::Int(1), Value::Null, Value::Int(3)])
//! );
//! ```

pub mod column;
pub mod decode;
pub mod encode;
pub mod error;
pub mod sql_type;
pub mod value;

pub use column::Column;
pub use decode::{parse_datetime, parse_value};
pub use encode::{EscapeStyle, format_value, to_query_parameter};
pub use error::TypeError;
pub use sql_type::{SqlType, parse_type};
pub use value::Value;
