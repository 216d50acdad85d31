//! Formatting of Rust values into SQL literals and wire parameters.

use chrono::Utc;
use serde_json::{Number, Value as Json, json};

use crate::error::{Result, TypeError};
use crate::value::Value;

/// Escape set used when rendering string literals.
///
/// The current server accepts doubled single quotes and does not treat
/// backslash as an escape character; the legacy (V1) dialect does, so
/// backslashes must be doubled there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeStyle {
    /// Current dialect: `'` → `''`, NUL → `\0`.
    #[default]
    V2,
    /// Legacy dialect: additionally `\` → `\\`.
    V1,
}

/// Render a value as a SQL literal for client-side parameter substitution.
pub fn format_value(value: &Value, style: EscapeStyle) -> Result<String> {
    match value {
        Value::Null => Ok("NULL".to_owned()),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_owned()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Decimal(d) => Ok(d.to_string()),
        Value::Str(s) => Ok(quote_string(s, style)),
        Value::Date(d) => Ok(format!("'{}'", d.format("%Y-%m-%d"))),
        Value::DateTime(dt) => Ok(format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S"))),
        // Offset-aware timestamps are normalized to UTC before formatting.
        Value::DateTimeTz(dt) => Ok(format!(
            "'{}'",
            dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S")
        )),
        Value::Bytes(b) => Ok(format_bytes_literal(b)),
        Value::Array(items) => {
            let rendered = items
                .iter()
                .map(|item| format_value(item, style))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("[{}]", rendered.join(", ")))
        }
        Value::Struct(_) => Err(TypeError::UnsupportedParameter("struct")),
    }
}

fn quote_string(s: &str, style: EscapeStyle) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\'' => out.push_str("''"),
            '\\' if style == EscapeStyle::V1 => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

fn format_bytes_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4 + 3);
    out.push_str("E'");
    for b in bytes {
        out.push_str(&format!("\\x{b:02x}"));
    }
    out.push('\'');
    out
}

/// Serialize a value for the server-side (`$N`) parameter channel.
///
/// Values travel as JSON inside the `query_parameters` request field; types
/// without a JSON shape are rendered the way the server parses literals.
pub fn to_query_parameter(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => Number::from_f64(*f).map_or_else(|| json!(f.to_string()), Json::Number),
        Value::Decimal(d) => json!(d.to_string()),
        Value::Str(s) => json!(s),
        Value::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
        Value::DateTime(dt) => json!(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Value::DateTimeTz(dt) => json!(
            dt.with_timezone(&Utc)
                .format("%Y-%m-%d %H:%M:%S%.f")
                .to_string()
        ),
        Value::Bytes(b) => {
            let mut out = String::with_capacity(b.len() * 4);
            for byte in b.iter() {
                out.push_str(&format!("\\x{byte:02x}"));
            }
            json!(out)
        }
        Value::Array(items) => Json::Array(items.iter().map(to_query_parameter).collect()),
        Value::Struct(fields) => Json::Object(
            fields
                .iter()
                .map(|(name, v)| (name.clone(), to_query_parameter(v)))
                .collect(),
        ),
    }
}
