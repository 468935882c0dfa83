//! Property value normalization
//!
//! Raw values extracted from a document are brought into the canonical
//! representation of the property they are mapped to. Normalization never
//! fails: values that cannot be coerced become null and a warning is logged,
//! since partial or malformed source data is expected.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Number, Value};

use crate::schema::{DatetimeType, PrimitiveType, PropertyType};

/// Date/time layouts carrying an explicit offset
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
];

/// Date/time layouts without offset, read as UTC
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Date-only layouts, read as midnight UTC
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%b %d, %Y",
];

/// Normalize one raw property value.
///
/// Null stays null. References and structured values pass through unchanged.
pub fn normalize(property_type: PropertyType, datetime_type: DatetimeType, value: Value) -> Value {
    if value.is_null() {
        return value;
    }

    let normalized = match property_type {
        PropertyType::Primitive(primitive) => cast_primitive(primitive, &value),
        PropertyType::DateTimeIso8601 => to_timestamp(&value).and_then(|ts| {
            DateTime::<Utc>::from_timestamp(ts, 0)
                .map(|dt| Value::String(dt.format(datetime_type.storage_format()).to_string()))
        }),
        PropertyType::Timestamp => to_timestamp(&value).map(|ts| Value::Number(ts.into())),
        PropertyType::Reference | PropertyType::Complex => return value,
    };

    normalized.unwrap_or_else(|| {
        tracing::warn!(%value, ?property_type, "could not normalize property value, using null");
        Value::Null
    })
}

/// Epoch seconds of a numeric value, a numeric string or a date/time string
pub fn to_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ts) = s.parse::<i64>() {
                return Some(ts);
            }
            if let Ok(ts) = s.parse::<f64>()
                && ts.is_finite()
            {
                return Some(ts as i64);
            }
            parse_datetime(s).map(|dt| dt.timestamp())
        }
        _ => None,
    }
}

/// Best-effort parsing of a date/time string; values without offset are UTC
pub fn parse_datetime(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(input, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(input, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

fn cast_primitive(primitive: PrimitiveType, value: &Value) -> Option<Value> {
    match primitive {
        PrimitiveType::String | PrimitiveType::Uri => Some(Value::String(cast_string(value))),
        PrimitiveType::Integer => cast_integer(value).map(|i| Value::Number(i.into())),
        PrimitiveType::Float => cast_float(value).and_then(Number::from_f64).map(Value::Number),
        PrimitiveType::Boolean => Some(Value::Bool(is_truthy(value))),
    }
}

fn cast_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn cast_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn cast_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const DATE: DatetimeType = DatetimeType::Date;
    const DATETIME: DatetimeType = DatetimeType::Datetime;

    #[test]
    fn test_date_only_has_no_zone_shift() {
        let value = normalize(PropertyType::DateTimeIso8601, DATE, json!("2023-05-01T10:00:00Z"));
        assert_eq!(value, json!("2023-05-01"));
    }

    #[test]
    fn test_offset_is_converted_to_utc() {
        let value = normalize(
            PropertyType::DateTimeIso8601,
            DATETIME,
            json!("2023-05-01T01:30:00+02:00"),
        );
        assert_eq!(value, json!("2023-04-30T23:30:00"));
    }

    #[rstest]
    #[case(json!(1682935200), "2023-05-01T10:00:00")]
    #[case(json!("1682935200"), "2023-05-01T10:00:00")]
    #[case(json!("2023-05-01 10:00:00"), "2023-05-01T10:00:00")]
    #[case(json!("2023-05-01"), "2023-05-01T00:00:00")]
    #[case(json!("Mon, 01 May 2023 10:00:00 +0000"), "2023-05-01T10:00:00")]
    #[case(json!("05/01/2023"), "2023-05-01T00:00:00")]
    #[case(json!("1 May 2023"), "2023-05-01T00:00:00")]
    fn test_datetime_inputs(#[case] raw: Value, #[case] expected: &str) {
        assert_eq!(normalize(PropertyType::DateTimeIso8601, DATETIME, raw), json!(expected));
    }

    #[test]
    fn test_unparseable_date_becomes_null() {
        let value = normalize(PropertyType::DateTimeIso8601, DATE, json!("not a date"));
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_timestamp_property() {
        assert_eq!(
            normalize(PropertyType::Timestamp, DATETIME, json!("2023-05-01T10:00:00Z")),
            json!(1682935200)
        );
        assert_eq!(normalize(PropertyType::Timestamp, DATETIME, json!(12.9)), json!(12));
    }

    #[rstest]
    #[case(PrimitiveType::Boolean, json!(true), json!(true))]
    #[case(PrimitiveType::Boolean, json!("0"), json!(false))]
    #[case(PrimitiveType::Boolean, json!(""), json!(false))]
    #[case(PrimitiveType::Boolean, json!("yes"), json!(true))]
    #[case(PrimitiveType::Boolean, json!(0), json!(false))]
    #[case(PrimitiveType::Boolean, json!(2), json!(true))]
    #[case(PrimitiveType::Integer, json!("42"), json!(42))]
    #[case(PrimitiveType::Integer, json!(" 7 "), json!(7))]
    #[case(PrimitiveType::Integer, json!(3.7), json!(3))]
    #[case(PrimitiveType::Integer, json!(true), json!(1))]
    #[case(PrimitiveType::Integer, json!("abc"), Value::Null)]
    #[case(PrimitiveType::Float, json!("2.5"), json!(2.5))]
    #[case(PrimitiveType::Float, json!(3), json!(3.0))]
    #[case(PrimitiveType::String, json!(12), json!("12"))]
    #[case(PrimitiveType::String, json!(false), json!("0"))]
    #[case(PrimitiveType::String, json!({"a": 1}), json!("{\"a\":1}"))]
    #[case(PrimitiveType::Uri, json!("https://example.com"), json!("https://example.com"))]
    fn test_primitive_casting(
        #[case] primitive: PrimitiveType,
        #[case] raw: Value,
        #[case] expected: Value,
    ) {
        assert_eq!(normalize(PropertyType::Primitive(primitive), DATETIME, raw), expected);
    }

    #[test]
    fn test_null_is_kept() {
        let value = normalize(PropertyType::Primitive(PrimitiveType::Boolean), DATETIME, Value::Null);
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_reference_passes_through() {
        let raw = json!({"nested": [1, 2]});
        assert_eq!(normalize(PropertyType::Reference, DATETIME, raw.clone()), raw);
        assert_eq!(normalize(PropertyType::Reference, DATETIME, json!(17)), json!(17));
    }
}
