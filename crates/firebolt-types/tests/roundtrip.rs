//! Round-trip properties between the literal formatter and the value parser.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use firebolt_types::{EscapeStyle, SqlType, Value, format_value, parse_value};
use proptest::prelude::*;
use serde_json::json;
use std::str::FromStr;

fn fmt(value: &Value) -> String {
    format_value(value, EscapeStyle::V2).expect("formattable")
}

/// Strip the outer quotes of a formatted literal and undo quote doubling,
/// recovering the raw text the server would store.
fn unquote_literal(literal: &str) -> String {
    assert!(literal.starts_with('\'') && literal.ends_with('\''));
    literal[1..literal.len() - 1].replace("''", "'")
}

proptest! {
    #[test]
    fn int_literals_roundtrip(x in any::<i64>()) {
        let literal = fmt(&Value::Int(x));
        let parsed = parse_value(&json!(literal), &SqlType::Int).expect("parse");
        prop_assert_eq!(parsed, Value::Int(x));
    }

    #[test]
    fn string_literals_roundtrip(s in "[^\\x00]*") {
        let literal = fmt(&Value::Str(s.clone()));
        let raw = unquote_literal(&literal);
        let parsed = parse_value(&json!(raw), &SqlType::Str).expect("parse");
        prop_assert_eq!(parsed, Value::Str(s));
    }

    #[test]
    fn date_literals_roundtrip(days in -719_162i64..2_932_896) {
        // Covers 0001-01-01 through 9999-12-31.
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch");
        let Some(date) = epoch.checked_add_signed(chrono::Duration::days(days)) else {
            return Ok(());
        };
        let literal = fmt(&Value::Date(date));
        let raw = unquote_literal(&literal);
        let parsed = parse_value(&json!(raw), &SqlType::Date).expect("parse");
        prop_assert_eq!(parsed, Value::Date(date));
    }

    #[test]
    fn datetime_literals_roundtrip(secs in 0i64..253_402_300_799) {
        let Some(datetime) = chrono::DateTime::from_timestamp(secs, 0) else {
            return Ok(());
        };
        let datetime = datetime.naive_utc();
        let literal = fmt(&Value::DateTime(datetime));
        let raw = unquote_literal(&literal);
        let parsed = parse_value(&json!(raw), &SqlType::DateTime).expect("parse");
        prop_assert_eq!(parsed, Value::DateTime(datetime));
    }

    #[test]
    fn decimal_literals_roundtrip(digits in "[1-9][0-9]{0,7}", frac in "[0-9]{1,30}") {
        let raw = format!("{digits}.{frac}");
        let decimal = BigDecimal::from_str(&raw).expect("decimal");
        let literal = fmt(&Value::Decimal(decimal.clone()));
        let parsed = parse_value(
            &json!(literal),
            &SqlType::Decimal { precision: 38, scale: 30 },
        )
        .expect("parse");
        prop_assert_eq!(parsed, Value::Decimal(decimal));
    }

    #[test]
    fn int_array_literals_roundtrip(xs in proptest::collection::vec(any::<i64>(), 0..16)) {
        let value = Value::Array(xs.iter().copied().map(Value::Int).collect());
        let literal = fmt(&value);
        prop_assert!(literal.starts_with('[') && literal.ends_with(']'));
        // Each element renders exactly as its scalar literal.
        let rendered: Vec<String> = xs.iter().map(|x| x.to_string()).collect();
        prop_assert_eq!(literal, format!("[{}]", rendered.join(", ")));
    }
}

#[test]
fn boundary_dates_roundtrip() {
    for raw in ["0001-01-01", "9999-12-31"] {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date");
        let literal = fmt(&Value::Date(date));
        assert_eq!(literal, format!("'{raw}'"));
        let parsed = parse_value(&json!(raw), &SqlType::Date).expect("parse");
        assert_eq!(parsed, Value::Date(date));
    }
}

#[test]
fn full_precision_decimal_roundtrips() {
    let raw = "12345678.901234567890123456789012345678";
    let decimal = BigDecimal::from_str(raw).expect("decimal");
    assert_eq!(fmt(&Value::Decimal(decimal.clone())), raw);
    let parsed = parse_value(
        &json!(raw),
        &SqlType::Decimal { precision: 38, scale: 30 },
    )
    .expect("parse");
    assert_eq!(parsed, Value::Decimal(decimal));
}
