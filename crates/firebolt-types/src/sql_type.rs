//! Parsing of server-reported type strings.

/// A Firebolt SQL type as reported by the query metadata channel.
///
/// Nullability is not part of the type: `Nullable(T)` parses as `T`, and a
/// JSON `null` cell decodes to [`Value::Null`](crate::Value::Null) for every
/// type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    /// Any integer width (`Int8` through `UInt64`).
    Int,
    /// `Float32` or `Float64`.
    Float,
    /// `String` and any type the parser does not recognize.
    Str,
    /// `Boolean`.
    Bool,
    /// `Date` or `Date32`.
    Date,
    /// `DateTime` (second precision).
    DateTime,
    /// `DateTime64(p)` with sub-second precision.
    DateTime64(u32),
    /// `Decimal(p, s)` / `numeric(p, s)`.
    Decimal {
        /// Total number of significant digits.
        precision: u32,
        /// Digits to the right of the decimal point.
        scale: u32,
    },
    /// `Bytea` byte strings.
    Bytes,
    /// `Array(T)`.
    Array(Box<SqlType>),
    /// `struct(name type, ...)` with ordered fields.
    Struct(Vec<(String, SqlType)>),
    /// `Nothing`, only produced by `SELECT NULL`. Decodes as text.
    Nothing,
}

impl SqlType {
    /// Human-readable type name, matching the server's catalog spelling.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "Int64",
            Self::Float => "Float64",
            Self::Str => "String",
            Self::Bool => "Boolean",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
            Self::DateTime64(_) => "DateTime64",
            Self::Decimal { .. } => "Decimal",
            Self::Bytes => "Bytea",
            Self::Array(_) => "Array",
            Self::Struct(_) => "Struct",
            Self::Nothing => "Nothing",
        }
    }

    /// Precision and scale, for `Decimal` types.
    #[must_use]
    pub fn precision_scale(&self) -> Option<(u32, u32)> {
        match self {
            Self::Decimal { precision, scale } => Some((*precision, *scale)),
            _ => None,
        }
    }
}

const ARRAY_PREFIX: &str = "Array(";
const NULLABLE_PREFIX: &str = "Nullable(";
const DECIMAL_PREFIXES: [&str; 2] = ["Decimal(", "numeric("];
const DATETIME64_PREFIX: &str = "DateTime64(";
const STRUCT_PREFIX: &str = "struct(";

/// Parse a type string provided by query metadata.
///
/// Unrecognized types parse as [`SqlType::Str`]: surfacing an unknown type as
/// text still lets the caller work with the data, while failing would not.
#[must_use]
pub fn parse_type(raw_type: &str) -> SqlType {
    if let Some(inner) = strip_wrapper(raw_type, ARRAY_PREFIX) {
        return SqlType::Array(Box::new(parse_type(inner)));
    }
    if let Some(inner) = strip_wrapper(raw_type, NULLABLE_PREFIX) {
        return parse_type(inner);
    }
    for prefix in DECIMAL_PREFIXES {
        if let Some(inner) = strip_wrapper(raw_type, prefix) {
            if let Some((precision, scale)) = parse_precision_scale(inner) {
                return SqlType::Decimal { precision, scale };
            }
        }
    }
    if let Some(inner) = strip_wrapper(raw_type, DATETIME64_PREFIX) {
        if let Ok(precision) = inner.trim().parse::<u32>() {
            return SqlType::DateTime64(precision);
        }
    }
    if let Some(inner) = strip_wrapper(raw_type, STRUCT_PREFIX) {
        if let Some(fields) = parse_struct_fields(inner) {
            return SqlType::Struct(fields);
        }
    }

    match raw_type {
        "Int8" | "UInt8" | "Int16" | "UInt16" | "Int32" | "UInt32" | "Int64" | "UInt64" => {
            SqlType::Int
        }
        "Float32" | "Float64" => SqlType::Float,
        "String" => SqlType::Str,
        "Date" | "Date32" => SqlType::Date,
        "DateTime" => SqlType::DateTime,
        "Boolean" => SqlType::Bool,
        "Bytea" => SqlType::Bytes,
        "Nothing" => SqlType::Nothing,
        // Treat unknown types as strings. Better than an error since the user
        // still has a way to work with the data.
        _ => SqlType::Str,
    }
}

fn strip_wrapper<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    raw.strip_prefix(prefix)?.strip_suffix(')')
}

fn parse_precision_scale(inner: &str) -> Option<(u32, u32)> {
    let (precision, scale) = inner.split_once(',')?;
    Some((
        precision.trim().parse().ok()?,
        scale.trim().parse().ok()?,
    ))
}

/// Split `name type, name type, ...` on top-level commas, honoring nested
/// parentheses. Field names may be backtick-quoted to allow embedded spaces
/// and commas.
fn parse_struct_fields(inner: &str) -> Option<Vec<(String, SqlType)>> {
    let mut fields = Vec::new();
    for part in split_top_level(inner) {
        let part = part.trim();
        if part.is_empty() {
            return None;
        }
        let (name, type_str) = if let Some(rest) = part.strip_prefix('`') {
            let (name, rest) = rest.split_once('`')?;
            (name.to_owned(), rest.trim_start())
        } else {
            let (name, rest) = part.split_once(' ')?;
            (name.to_owned(), rest.trim_start())
        };
        if type_str.is_empty() {
            return None;
        }
        fields.push((name, parse_type(type_str)));
    }
    if fields.is_empty() { None } else { Some(fields) }
}

fn split_top_level(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_backticks = false;
    for (idx, ch) in inner.char_indices() {
        match ch {
            '`' => in_backticks = !in_backticks,
            '(' if !in_backticks => depth += 1,
            ')' if !in_backticks => depth = depth.saturating_sub(1),
            ',' if depth == 0 && !in_backticks => {
                parts.push(&inner[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}
