//! Binding record values to PostgreSQL parameters
//!
//! Sources hand over loosely typed values (CSV fields are all text), while the
//! prepared insert statement knows each column's real type. `Value` therefore
//! accepts every parameter type and converts at bind time, so `"42"` can land
//! in an `int8` column and `"2024-01-31"` in a `date` column.

use crate::domain::record::Value;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if self.is_null() {
            return Ok(IsNull::Yes);
        }

        match *ty {
            Type::BOOL => to_bool(self)?.to_sql(ty, out),
            Type::INT2 => i16::try_from(to_i64(self)?)
                .map_err(|_| out_of_range(self, ty))?
                .to_sql(ty, out),
            Type::INT4 => i32::try_from(to_i64(self)?)
                .map_err(|_| out_of_range(self, ty))?
                .to_sql(ty, out),
            Type::INT8 => to_i64(self)?.to_sql(ty, out),
            Type::FLOAT4 => (to_f64(self)? as f32).to_sql(ty, out),
            Type::FLOAT8 => to_f64(self)?.to_sql(ty, out),
            Type::NUMERIC => to_decimal(self)?.to_sql(ty, out),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                match self {
                    Value::Text(s) => s.as_str().to_sql(ty, out),
                    other => other.to_string().to_sql(ty, out),
                }
            }
            Type::DATE => to_date(self)?.to_sql(ty, out),
            Type::TIMESTAMP => to_timestamp(self)?.naive_utc().to_sql(ty, out),
            Type::TIMESTAMPTZ => to_timestamp(self)?.to_sql(ty, out),
            Type::UUID => to_uuid(self)?.to_sql(ty, out),
            Type::JSON | Type::JSONB => to_json(self).to_sql(ty, out),
            _ => Err(format!("cannot bind {self:?} to a column of type {ty}").into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot convert {value} to {ty}").into()
}

fn out_of_range(value: &Value, ty: &Type) -> BoxError {
    format!("{value} is out of range for {ty}").into()
}

fn to_bool(value: &Value) -> Result<bool, BoxError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(i) => Ok(*i != 0),
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
            "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
            _ => Err(mismatch(value, &Type::BOOL)),
        },
        _ => Err(mismatch(value, &Type::BOOL)),
    }
}

fn to_i64(value: &Value) -> Result<i64, BoxError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i64),
        Value::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| mismatch(value, &Type::INT8)),
        _ => Err(mismatch(value, &Type::INT8)),
    }
}

fn to_f64(value: &Value) -> Result<f64, BoxError> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        Value::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| mismatch(value, &Type::FLOAT8)),
        _ => Err(mismatch(value, &Type::FLOAT8)),
    }
}

fn to_date(value: &Value) -> Result<NaiveDate, BoxError> {
    match value {
        Value::Date(d) => Ok(*d),
        Value::Timestamp(ts) => Ok(ts.date_naive()),
        Value::Text(s) => parse_timestamp(s)
            .map(|ts| ts.date_naive())
            .ok_or_else(|| mismatch(value, &Type::DATE)),
        _ => Err(mismatch(value, &Type::DATE)),
    }
}

fn to_timestamp(value: &Value) -> Result<DateTime<Utc>, BoxError> {
    match value {
        Value::Timestamp(ts) => Ok(*ts),
        Value::Date(d) => Ok(d.and_time(NaiveTime::MIN).and_utc()),
        Value::Text(s) => parse_timestamp(s).ok_or_else(|| mismatch(value, &Type::TIMESTAMPTZ)),
        _ => Err(mismatch(value, &Type::TIMESTAMPTZ)),
    }
}

fn to_uuid(value: &Value) -> Result<Uuid, BoxError> {
    match value {
        Value::Uuid(u) => Ok(*u),
        Value::Text(s) => Uuid::parse_str(s.trim()).map_err(|_| mismatch(value, &Type::UUID)),
        _ => Err(mismatch(value, &Type::UUID)),
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Json(j) => j.clone(),
        // Text that already holds a JSON document is stored as that document
        Value::Text(s) => serde_json::from_str(s).unwrap_or_else(|_| s.clone().into()),
        other => serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
    }
}

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (taken as UTC) or a bare date
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Parses decimal text exactly, accepting exponent notation
///
/// Values that `Decimal` can't hold without rounding (more than 28
/// significant digits) are rejected rather than truncated.
pub(crate) fn parse_decimal(text: &str) -> Result<Decimal, BoxError> {
    let invalid = || -> BoxError { format!("'{text}' is not a valid numeric").into() };
    let (mantissa, exponent) = match text.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i64>().map_err(|_| invalid())?),
        None => (text, 0),
    };
    let mut decimal = Decimal::from_str_exact(mantissa).map_err(|_| invalid())?;

    let scale = i64::from(decimal.scale())
        .checked_sub(exponent)
        .ok_or_else(invalid)?;
    if scale >= 0 {
        let scale = u32::try_from(scale).map_err(|_| invalid())?;
        decimal
            .set_scale(scale)
            .map_err(|e| format!("'{text}' exceeds numeric precision: {e}"))?;
    } else {
        decimal.set_scale(0).map_err(|_| invalid())?;
        for _ in 0..-scale {
            decimal = decimal
                .checked_mul(Decimal::TEN)
                .ok_or_else(|| format!("'{text}' exceeds numeric precision"))?;
        }
    }
    Ok(decimal)
}

fn to_decimal(value: &Value) -> Result<Decimal, BoxError> {
    match value {
        Value::Int(i) => Ok(Decimal::from(*i)),
        // Display gives the shortest text that round-trips the float
        Value::Float(f) if f.is_finite() => parse_decimal(&f.to_string()),
        Value::Text(s) => parse_decimal(s.trim()),
        _ => Err(mismatch(value, &Type::NUMERIC)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decimal(text: &str) -> String {
        parse_decimal(text).unwrap().to_string()
    }

    #[test]
    fn test_decimal_keeps_every_digit() {
        assert_eq!(decimal("12345678901234567890.12345"), "12345678901234567890.12345");
        assert_eq!(decimal("1.234567890123456789012345e19"), "12345678901234567890.12345");
    }

    #[test]
    fn test_decimal_exponents() {
        assert_eq!(decimal("1.5E3"), "1500");
        assert_eq!(decimal("-25e-4"), "-0.0025");
        assert_eq!(decimal("0.00"), "0.00");
    }

    #[test]
    fn test_decimal_rejects_lossy_and_garbage_input() {
        assert!(parse_decimal("1234567890123456789012345678901234567890").is_err());
        assert!(parse_decimal("1e40").is_err());
        assert!(parse_decimal("1e-40").is_err());
        assert!(parse_decimal("12a").is_err());
        assert!(parse_decimal("1e").is_err());
    }

    #[test]
    fn test_numeric_binds_like_decimal() {
        let mut ours = BytesMut::new();
        Value::Text("123.45".to_string())
            .to_sql(&Type::NUMERIC, &mut ours)
            .unwrap();
        let mut expected = BytesMut::new();
        Decimal::new(12345, 2)
            .to_sql(&Type::NUMERIC, &mut expected)
            .unwrap();
        assert_eq!(ours, expected);

        let mut from_float = BytesMut::new();
        Value::Float(0.1)
            .to_sql(&Type::NUMERIC, &mut from_float)
            .unwrap();
        let mut tenth = BytesMut::new();
        Decimal::new(1, 1).to_sql(&Type::NUMERIC, &mut tenth).unwrap();
        assert_eq!(from_float, tenth);
    }

    #[test]
    fn test_text_converts_to_integer_column() {
        let mut out = BytesMut::new();
        let value = Value::Text(" 42 ".to_string());
        let is_null = value.to_sql(&Type::INT4, &mut out).unwrap();
        assert!(matches!(is_null, IsNull::No));
        assert_eq!(&out[..], &42i32.to_be_bytes());
    }

    #[test]
    fn test_integer_out_of_range() {
        let mut out = BytesMut::new();
        assert!(Value::Int(70_000).to_sql(&Type::INT2, &mut out).is_err());
    }

    #[test]
    fn test_null_binds_as_null() {
        let mut out = BytesMut::new();
        let is_null = Value::Null.to_sql(&Type::UUID, &mut out).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(out.is_empty());
    }

    #[test]
    fn test_bool_spellings() {
        assert!(to_bool(&Value::Text("Yes".to_string())).unwrap());
        assert!(!to_bool(&Value::Text("f".to_string())).unwrap());
        assert!(to_bool(&Value::Text("maybe".to_string())).is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
            .and_utc();
        assert_eq!(parse_timestamp("2024-03-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-01"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_json_text_is_parsed() {
        let value = Value::Text("{\"a\":1}".to_string());
        assert_eq!(to_json(&value), serde_json::json!({"a": 1}));
        let plain = Value::Text("hello".to_string());
        assert_eq!(to_json(&plain), serde_json::json!("hello"));
    }
}
