//! Cell representations used between the drivers and the converter.
//!
//! A cell travels through three forms:
//!
//! - [`RawValue`]: what a driver handed back, usually the textual/byte wire form
//! - [`CanonicalValue`]: the converter's normalized form, shared by the write
//!   and compare paths
//! - [`TargetParam`]: a value ready to be bound to a YashanDB statement

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// A cell as returned by a driver.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    /// Textual or binary wire form.
    Bytes(Vec<u8>),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Bytes(s.as_bytes().to_vec())
    }
}

impl From<Option<&str>> for RawValue {
    fn from(s: Option<&str>) -> Self {
        s.map(RawValue::from).unwrap_or(RawValue::Null)
    }
}

/// One source or target row, in column order.
pub type Row = Vec<RawValue>;

/// Rows streamed together through a channel.
pub type RowBatch = Vec<Row>;

/// Parsed numeric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    F32(f32),
    F64(f64),
    Decimal(Decimal),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::F32(v) => write!(f, "{}", v),
            Number::F64(v) => write!(f, "{}", v),
            Number::Decimal(v) => write!(f, "{}", v.normalize()),
        }
    }
}

/// Which temporal column type produced a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    Date,
    DateTime,
    Time,
}

/// Normalized cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Null,
    Text(String),
    Bytes(Vec<u8>),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Numeric reparsed from text; `text` keeps the exact source digits, or
    /// the zero rendering when the text did not parse.
    Numeric { value: Number, text: String },
    /// Temporal value anchored in the reference zone.
    Temporal {
        at: DateTime<FixedOffset>,
        kind: TemporalKind,
    },
    /// BIT field as binary digits plus the original bytes.
    Bit { digits: String, bytes: Vec<u8> },
    /// Re-encoded JSON document (or the original text if it did not parse).
    Json(String),
}

impl CanonicalValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CanonicalValue::Null)
    }

    /// Short type label used in mismatch logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            CanonicalValue::Null => "null",
            CanonicalValue::Text(_) => "text",
            CanonicalValue::Bytes(_) => "bytes",
            CanonicalValue::Int(_) => "int",
            CanonicalValue::UInt(_) => "uint",
            CanonicalValue::Float(_) => "float",
            CanonicalValue::Numeric { value, .. } => match value {
                Number::F32(_) => "float32",
                Number::F64(_) => "float64",
                Number::Decimal(_) => "decimal",
            },
            CanonicalValue::Temporal { kind, .. } => match kind {
                TemporalKind::Date => "date",
                TemporalKind::DateTime => "datetime",
                TemporalKind::Time => "time",
            },
            CanonicalValue::Bit { .. } => "bit",
            CanonicalValue::Json(_) => "json",
        }
    }
}

impl fmt::Display for CanonicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalValue::Null => f.write_str("NULL"),
            CanonicalValue::Text(s) | CanonicalValue::Json(s) => f.write_str(s),
            CanonicalValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            CanonicalValue::Int(v) => write!(f, "{}", v),
            CanonicalValue::UInt(v) => write!(f, "{}", v),
            CanonicalValue::Float(v) => write!(f, "{}", v),
            CanonicalValue::Numeric { value, .. } => write!(f, "{}", value),
            CanonicalValue::Temporal { at, kind } => match kind {
                TemporalKind::Date => write!(f, "{}", at.format("%Y-%m-%d")),
                TemporalKind::DateTime => write!(f, "{}", at.format("%Y-%m-%d %H:%M:%S%.f")),
                TemporalKind::Time => write!(f, "{}", at.format("%H:%M:%S%.f")),
            },
            CanonicalValue::Bit { digits, .. } => f.write_str(digits),
        }
    }
}

/// A value bound to a YashanDB statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetParam {
    Null,
    Text(String),
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Time(NaiveTime),
}

impl fmt::Display for TargetParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetParam::Null => f.write_str("NULL"),
            TargetParam::Text(s) => write!(f, "'{}'", s),
            TargetParam::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            TargetParam::Int(v) => write!(f, "{}", v),
            TargetParam::Float(v) => write!(f, "{}", v),
            TargetParam::Date(d) => write!(f, "{}", d),
            TargetParam::Timestamp(ts) => write!(f, "{}", ts),
            TargetParam::Time(t) => write!(f, "{}", t),
        }
    }
}

/// Render bound parameters for a log line.
pub fn format_params(params: &[TargetParam]) -> String {
    let rendered: Vec<String> = params.iter().map(|p| p.to_string()).collect();
    format!("[{}]", rendered.join(", "))
}
