//! Conversion of raw JSON cells into typed values.
//!
//! Firebolt serializes result cells as JSON scalars; the column type decides
//! how each scalar is interpreted. Numeric tokens are kept in their raw
//! textual form by the JSON layer (arbitrary precision) so decimals survive
//! conversion losslessly.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as Json;

use crate::error::{Result, TypeError};
use crate::sql_type::SqlType;
use crate::value::Value;

/// A parsed timestamp, with or without a UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDateTime {
    /// No offset present in the input.
    Naive(NaiveDateTime),
    /// Input carried a `±HH[:MM[:SS]]` offset or `Z`.
    Fixed(DateTime<FixedOffset>),
}

/// Parse a raw JSON cell into a typed [`Value`] according to `ty`.
///
/// A JSON `null` decodes to [`Value::Null`] for every type.
pub fn parse_value(raw: &Json, ty: &SqlType) -> Result<Value> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    match ty {
        SqlType::Int => parse_int(raw),
        SqlType::Float => parse_float(raw),
        SqlType::Str | SqlType::Nothing => parse_str(raw),
        SqlType::Bool => parse_bool(raw),
        SqlType::Date => parse_date(raw),
        SqlType::DateTime | SqlType::DateTime64(_) => parse_timestamp(raw),
        SqlType::Decimal { .. } => parse_decimal(raw),
        SqlType::Bytes => parse_bytes(raw),
        SqlType::Array(inner) => parse_array(raw, inner),
        SqlType::Struct(fields) => parse_struct(raw, fields),
    }
}

fn parse_int(raw: &Json) -> Result<Value> {
    match raw {
        Json::Number(n) => {
            if let Some(v) = n.as_i64() {
                return Ok(Value::Int(v));
            }
            // Legacy servers may send integers as float literals; truncate
            // toward zero as the language conversion would.
            if let Some(v) = n.as_f64() {
                return Ok(Value::Int(v.trunc() as i64));
            }
            Err(TypeError::invalid("int", n, "out of range"))
        }
        Json::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| TypeError::invalid("int", s, e.to_string())),
        other => Err(TypeError::invalid("int", other, "number or string expected")),
    }
}

fn parse_float(raw: &Json) -> Result<Value> {
    match raw {
        Json::Number(n) => n
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| TypeError::invalid("float", n, "not representable")),
        // `inf`, `-inf`, `nan` and `-nan` arrive as strings.
        Json::String(s) => f64::from_str(s.trim())
            .map(Value::Float)
            .map_err(|e| TypeError::invalid("float", s, e.to_string())),
        other => Err(TypeError::invalid("float", other, "number or string expected")),
    }
}

fn parse_str(raw: &Json) -> Result<Value> {
    match raw {
        Json::String(s) => Ok(Value::Str(s.clone())),
        // Unknown types surface as text; render scalar cells back to their
        // token form.
        other => Ok(Value::Str(other.to_string())),
    }
}

fn parse_bool(raw: &Json) -> Result<Value> {
    match raw {
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(v) => Ok(Value::Bool(v != 0)),
            None => Err(TypeError::invalid("bool", n, "integer expected")),
        },
        other => Err(TypeError::invalid("bool", other, "bool or int expected")),
    }
}

fn parse_date(raw: &Json) -> Result<Value> {
    let Json::String(s) = raw else {
        return Err(TypeError::invalid("date", raw, "str expected"));
    };
    // A full timestamp is accepted and truncated to its date part.
    match parse_datetime(s)? {
        ParsedDateTime::Naive(dt) => Ok(Value::Date(dt.date())),
        ParsedDateTime::Fixed(dt) => Ok(Value::Date(dt.date_naive())),
    }
}

fn parse_timestamp(raw: &Json) -> Result<Value> {
    let Json::String(s) = raw else {
        return Err(TypeError::invalid("datetime", raw, "str expected"));
    };
    match parse_datetime(s)? {
        ParsedDateTime::Naive(dt) => Ok(Value::DateTime(dt)),
        ParsedDateTime::Fixed(dt) => Ok(Value::DateTimeTz(dt)),
    }
}

fn parse_decimal(raw: &Json) -> Result<Value> {
    let token = match raw {
        Json::String(s) => s.clone(),
        // Numeric tokens keep their raw text thanks to arbitrary-precision
        // decoding, so even float-typed legacy payloads stay lossless.
        Json::Number(n) => n.to_string(),
        other => return Err(TypeError::InvalidDecimal(other.to_string())),
    };
    BigDecimal::from_str(token.trim())
        .map(Value::Decimal)
        .map_err(|_| TypeError::InvalidDecimal(token))
}

fn parse_bytes(raw: &Json) -> Result<Value> {
    let Json::String(s) = raw else {
        return Err(TypeError::InvalidBytes(raw.to_string()));
    };
    let mut out = Vec::with_capacity(s.len() / 4);
    let mut rest = s.as_str();
    while !rest.is_empty() {
        let Some(hex) = rest.strip_prefix("\\x") else {
            return Err(TypeError::InvalidBytes(s.clone()));
        };
        let Some(pair) = hex.get(..2) else {
            return Err(TypeError::InvalidBytes(s.clone()));
        };
        let byte = u8::from_str_radix(pair, 16)
            .map_err(|_| TypeError::InvalidBytes(s.clone()))?;
        out.push(byte);
        rest = &hex[2..];
    }
    Ok(Value::Bytes(Bytes::from(out)))
}

fn parse_array(raw: &Json, inner: &SqlType) -> Result<Value> {
    let Json::Array(items) = raw else {
        return Err(TypeError::invalid("array", raw, "list expected"));
    };
    let values = items
        .iter()
        .map(|item| parse_value(item, inner))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(values))
}

fn parse_struct(raw: &Json, fields: &[(String, SqlType)]) -> Result<Value> {
    let Json::Object(map) = raw else {
        return Err(TypeError::invalid("struct", raw, "object expected"));
    };
    let values = fields
        .iter()
        .map(|(name, ty)| {
            let cell = map.get(name).unwrap_or(&Json::Null);
            Ok((name.clone(), parse_value(cell, ty)?))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Struct(values))
}

/// Parse a server-formatted timestamp string.
///
/// Accepted shape: `YYYY-MM-DD[ |T]HH:MM:SS[.frac][±HH[:MM[:SS]]|Z]`, or a
/// bare date. Offsets carry second granularity (historical timezones such as
/// `+05:30:12` occur in the wild).
pub fn parse_datetime(s: &str) -> Result<ParsedDateTime> {
    let s = s.trim();
    let bad = || TypeError::InvalidDateTime(s.to_owned());

    if s.len() < 10 || !s.is_char_boundary(10) {
        return Err(bad());
    }
    let date = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d").map_err(|_| bad())?;
    let rest = &s[10..];
    if rest.is_empty() {
        return Ok(ParsedDateTime::Naive(date.and_time(NaiveTime::MIN)));
    }
    if !rest.starts_with(' ') && !rest.starts_with('T') {
        return Err(bad());
    }
    let rest = &rest[1..];

    let (time_part, offset_part) = split_offset(rest);
    let time = NaiveTime::parse_from_str(time_part, "%H:%M:%S%.f").map_err(|_| bad())?;
    let naive = date.and_time(time);

    match offset_part {
        None => Ok(ParsedDateTime::Naive(naive)),
        Some(raw) => {
            let offset = parse_offset(raw).ok_or_else(bad)?;
            naive
                .and_local_timezone(offset)
                .single()
                .map(ParsedDateTime::Fixed)
                .ok_or_else(bad)
        }
    }
}

/// Split `HH:MM:SS[.frac]` from a trailing offset. The time portion uses only
/// digits, `:` and `.`, so the first `+`, `-` or `Z` starts the offset.
fn split_offset(rest: &str) -> (&str, Option<&str>) {
    for (idx, ch) in rest.char_indices() {
        if matches!(ch, '+' | '-' | 'Z' | 'z') {
            return (&rest[..idx], Some(&rest[idx..]));
        }
    }
    (rest, None)
}

fn parse_offset(raw: &str) -> Option<FixedOffset> {
    if raw.eq_ignore_ascii_case("Z") {
        return FixedOffset::east_opt(0);
    }
    let (sign, body) = match raw.as_bytes().first()? {
        b'+' => (1i32, &raw[1..]),
        b'-' => (-1i32, &raw[1..]),
        _ => return None,
    };
    let mut parts = body.split(':');
    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    let seconds: i32 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || !(0..24).contains(&hours) || !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60 + seconds))
}
