// ABOUTME: Scalar value bridge between SQLite storage classes and PostgreSQL wire types
// ABOUTME: Carries row values through the flag coercion and type-aware bind-time encoding

use std::error::Error;
use std::fmt;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::ValueRef;
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

use crate::config;

/// A scalar value read from the source database.
///
/// SQLite has five storage classes (NULL, INTEGER, REAL, TEXT, BLOB).
/// `Bool` is produced by the flag-column coercion before binding; the
/// source itself never yields it.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "'{}'", s),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Apply the flag-column coercion for 0/1 integer encodings.
///
/// Listed `(table, column)` pairs come out as real booleans, nulls pass
/// through as true nulls, and everything else is unchanged.
pub fn transform_value(table: &str, column: &str, value: SqlValue) -> SqlValue {
    if config::is_bool_column(table, column) {
        return match value {
            SqlValue::Integer(i) => SqlValue::Bool(i != 0),
            other => other,
        };
    }
    value
}

/// Render a full row as `column=value` pairs for insertion-failure reports.
pub fn format_row(columns: &[String], values: &[SqlValue]) -> String {
    columns
        .iter()
        .zip(values)
        .map(|(column, value)| format!("{}={}", column, value))
        .collect::<Vec<_>>()
        .join(", ")
}

type BoxedError = Box<dyn Error + Sync + Send>;

fn mismatch(value: &SqlValue, ty: &Type) -> BoxedError {
    format!("cannot encode {} as destination type {}", value, ty).into()
}

fn encode_bool(b: bool, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
    if *ty == Type::BOOL {
        b.to_sql(ty, out)
    } else if *ty == Type::INT2 {
        (b as i16).to_sql(ty, out)
    } else if *ty == Type::INT4 {
        (b as i32).to_sql(ty, out)
    } else if *ty == Type::INT8 {
        (b as i64).to_sql(ty, out)
    } else {
        Err(mismatch(&SqlValue::Bool(b), ty))
    }
}

fn encode_integer(i: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
    if *ty == Type::BOOL {
        (i != 0).to_sql(ty, out)
    } else if *ty == Type::INT2 {
        i16::try_from(i)?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(i)?.to_sql(ty, out)
    } else if *ty == Type::INT8 {
        i.to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (i as f32).to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        (i as f64).to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from(i).to_sql(ty, out)
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR {
        i.to_string().to_sql(ty, out)
    } else {
        Err(mismatch(&SqlValue::Integer(i), ty))
    }
}

fn encode_real(r: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
    if *ty == Type::FLOAT4 {
        (r as f32).to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        r.to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from_f64_retain(r)
            .ok_or_else(|| -> BoxedError {
                format!("cannot represent {} as numeric", r).into()
            })?
            .to_sql(ty, out)
    } else {
        Err(mismatch(&SqlValue::Real(r), ty))
    }
}

fn encode_text(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
    if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR {
        s.to_sql(ty, out)
    } else if *ty == Type::TIMESTAMP {
        parse_timestamp(s)?.to_sql(ty, out)
    } else if *ty == Type::TIMESTAMPTZ {
        parse_timestamp(s)?.and_utc().to_sql(ty, out)
    } else if *ty == Type::DATE {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| -> BoxedError { format!("cannot parse '{}' as a date: {}", s, e).into() })?
            .to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        // SQLite columns are dynamically typed; numbers occasionally
        // arrive as text.
        s.parse::<Decimal>()
            .map_err(|e| -> BoxedError {
                format!("cannot parse '{}' as numeric: {}", s, e).into()
            })?
            .to_sql(ty, out)
    } else {
        Err(mismatch(&SqlValue::Text(s.to_string()), ty))
    }
}

fn encode_blob(b: &[u8], ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
    if *ty == Type::BYTEA {
        b.to_sql(ty, out)
    } else {
        Err(mismatch(&SqlValue::Blob(b.to_vec()), ty))
    }
}

/// Parse the timestamp text shapes SQLite stores: the space-separated
/// form `datetime()` emits, the ISO-8601 `T` form, and RFC 3339.
fn parse_timestamp(s: &str) -> Result<NaiveDateTime, BoxedError> {
    const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    for format in FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.naive_utc());
    }
    Err(format!("cannot parse '{}' as a timestamp", s).into())
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxedError> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(b) => encode_bool(*b, ty, out),
            SqlValue::Integer(i) => encode_integer(*i, ty, out),
            SqlValue::Real(r) => encode_real(*r, ty, out),
            SqlValue::Text(s) => encode_text(s, ty, out),
            SqlValue::Blob(b) => encode_blob(b, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // The destination column type drives the conversion at encode
        // time, so every prepared-statement parameter type is accepted.
        true
    }

    to_sql_checked!();
}
