//! Value conversion between MySQL cells and YashanDB parameters.
//!
//! [`to_canonical`] turns a raw driver cell into a [`CanonicalValue`] given the
//! column's declared source type. [`to_target_param`] turns that into a value
//! bindable to a target statement. [`values_equal`] compares two canonical
//! values the way the verification pass needs.
//!
//! Conversion rules by kind:
//!
//! - NULL stays NULL for every type
//! - DATE / DATETIME / TIMESTAMP / TIME are parsed from text and anchored in
//!   the reference zone (UTC+08:00) with the wall clock kept as-is
//! - TIME values outside a single day (MySQL allows -838:59:59 to 838:59:59)
//!   are kept as text
//! - YEAR passes integers through and parses text
//! - BIT becomes a binary digit string with leading zeros stripped
//! - binary kinds pass through as bytes
//! - JSON is decoded and re-encoded (malformed documents are forwarded as-is)
//! - FLOAT, DOUBLE, DECIMAL and BIGINT are reparsed to numbers
//! - everything else decodes bytes to a string
//!
//! Malformed temporal and numeric text does not fail the row: it converts to
//! the zero value of its kind and a warning is logged.

mod compare;

pub use compare::values_equal;

use std::str::FromStr;

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use rust_decimal::Decimal;
use tracing::warn;

use crate::core::value::{CanonicalValue, Number, RawValue, TargetParam, TemporalKind};
use crate::typemap::{SourceType, ValueKind};

/// Offset of the reference zone (Asia/Shanghai, no DST since 1991).
const REFERENCE_OFFSET_SECS: i32 = 8 * 3600;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// The fixed zone temporal values are anchored in.
pub fn reference_zone() -> FixedOffset {
    FixedOffset::east_opt(REFERENCE_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Convert a raw source cell to its canonical form.
pub fn to_canonical(raw: &RawValue, source_type: &SourceType) -> CanonicalValue {
    if raw.is_null() {
        return CanonicalValue::Null;
    }

    match source_type.kind() {
        ValueKind::Date => temporal(raw, TemporalKind::Date),
        ValueKind::DateTime => temporal(raw, TemporalKind::DateTime),
        ValueKind::Time => temporal(raw, TemporalKind::Time),
        ValueKind::Year => year(raw),
        ValueKind::Bit => bit(raw),
        ValueKind::Binary => match raw {
            RawValue::Bytes(b) => CanonicalValue::Bytes(b.clone()),
            other => passthrough(other),
        },
        ValueKind::Json => json(raw),
        kind @ (ValueKind::Float32 | ValueKind::Float64 | ValueKind::Exact) => numeric(raw, kind),
        ValueKind::Text => passthrough(raw),
    }
}

/// Convert a cell read back from the target, interpreted with the source
/// column's type.
///
/// Identical to [`to_canonical`] except for BIT columns, which YashanDB returns
/// as text rather than raw bytes.
pub fn target_to_canonical(raw: &RawValue, source_type: &SourceType) -> CanonicalValue {
    match (source_type.kind(), raw) {
        (ValueKind::Bit, RawValue::Bytes(b)) => bit_from_text(&String::from_utf8_lossy(b)),
        _ => to_canonical(raw, source_type),
    }
}

/// Convert a canonical value to a bindable target parameter.
pub fn to_target_param(value: &CanonicalValue) -> TargetParam {
    match value {
        CanonicalValue::Null => TargetParam::Null,
        CanonicalValue::Text(s) | CanonicalValue::Json(s) => TargetParam::Text(s.clone()),
        CanonicalValue::Bytes(b) => TargetParam::Bytes(b.clone()),
        CanonicalValue::Int(v) => TargetParam::Int(*v),
        CanonicalValue::UInt(v) => unsigned_param(*v),
        CanonicalValue::Float(v) => TargetParam::Float(*v),
        // Bind the source digits so DECIMAL precision survives.
        CanonicalValue::Numeric { text, .. } => TargetParam::Text(text.trim().to_string()),
        CanonicalValue::Temporal { at, kind } => {
            let local = at.naive_local();
            match kind {
                TemporalKind::Date => TargetParam::Date(local.date()),
                TemporalKind::DateTime => TargetParam::Timestamp(local),
                TemporalKind::Time => TargetParam::Time(local.time()),
            }
        }
        CanonicalValue::Bit { digits, bytes } => {
            let folded = if bytes.is_empty() {
                u64::from_str_radix(digits, 2).ok()
            } else if bytes.len() <= 8 {
                Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
            } else {
                None
            };
            match folded {
                Some(v) => unsigned_param(v),
                None => TargetParam::Text(digits.clone()),
            }
        }
    }
}

fn unsigned_param(v: u64) -> TargetParam {
    i64::try_from(v)
        .map(TargetParam::Int)
        .unwrap_or_else(|_| TargetParam::Text(v.to_string()))
}

fn passthrough(raw: &RawValue) -> CanonicalValue {
    match raw {
        RawValue::Null => CanonicalValue::Null,
        RawValue::Bytes(b) => CanonicalValue::Text(String::from_utf8_lossy(b).into_owned()),
        RawValue::Int(v) => CanonicalValue::Int(*v),
        RawValue::UInt(v) => CanonicalValue::UInt(*v),
        RawValue::Float(v) => CanonicalValue::Float(*v),
    }
}

fn raw_text(raw: &RawValue) -> String {
    match raw {
        RawValue::Null => String::new(),
        RawValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        RawValue::Int(v) => v.to_string(),
        RawValue::UInt(v) => v.to_string(),
        RawValue::Float(v) => v.to_string(),
    }
}

/// `0001-01-01 00:00:00` in the reference zone.
fn zero_instant() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

fn anchor(local: NaiveDateTime) -> DateTime<FixedOffset> {
    let zone = reference_zone();
    zone.from_local_datetime(&local)
        .single()
        .unwrap_or_else(|| zone.from_utc_datetime(&local))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn parse_temporal(text: &str, kind: TemporalKind) -> Option<NaiveDateTime> {
    match kind {
        TemporalKind::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN))
            .or_else(|| parse_datetime(text).map(|dt| dt.date().and_time(NaiveTime::MIN))),
        TemporalKind::DateTime => parse_datetime(text),
        TemporalKind::Time => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
            NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
                .ok()
                .map(|t| epoch.and_time(t))
        }
    }
}

/// Whether `text` is a MySQL TIME literal, e.g. `-01:00:00` or `838:59:59.5`.
fn is_time_interval(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let mut parts = unsigned.splitn(3, ':');
    let (Some(hours), Some(minutes), Some(seconds)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let (whole, fraction) = seconds.split_once('.').unwrap_or((seconds, "0"));
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    all_digits(hours)
        && hours.len() <= 3
        && hours.parse::<u32>().is_ok_and(|h| h <= 838)
        && minutes.len() == 2
        && minutes.parse::<u32>().is_ok_and(|m| m < 60)
        && whole.len() == 2
        && whole.parse::<u32>().is_ok_and(|s| s < 60)
        && all_digits(fraction)
}

fn temporal(raw: &RawValue, kind: TemporalKind) -> CanonicalValue {
    let text = raw_text(raw);
    let trimmed = text.trim();
    let local = match parse_temporal(trimmed, kind) {
        Some(local) => local,
        None if kind == TemporalKind::Time && is_time_interval(trimmed) => {
            return CanonicalValue::Text(trimmed.to_string());
        }
        None => {
            // Lenient: keep the row, substitute the zero instant.
            warn!("unparseable {:?} value {:?}, using zero value", kind, text);
            zero_instant()
        }
    };
    CanonicalValue::Temporal {
        at: anchor(local),
        kind,
    }
}

fn year(raw: &RawValue) -> CanonicalValue {
    match raw {
        RawValue::Int(v) => CanonicalValue::Int(*v),
        RawValue::UInt(v) => CanonicalValue::UInt(*v),
        other => {
            let text = raw_text(other);
            let trimmed = text.trim();
            let parsed = trimmed.parse::<i64>().ok().or_else(|| {
                // DATE columns holding a year come back as a full date.
                let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
                (digits.len() == 4).then(|| digits.parse::<i64>().ok()).flatten()
            });
            match parsed {
                Some(v) => CanonicalValue::Int(v),
                None => {
                    warn!("unparseable YEAR value {:?}, using zero value", text);
                    CanonicalValue::Int(0)
                }
            }
        }
    }
}

/// Binary digits of a big-endian byte string, leading zeros stripped.
pub fn bit_digits(bytes: &[u8]) -> String {
    let full: String = bytes.iter().map(|b| format!("{:08b}", b)).collect();
    let trimmed = full.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn bit(raw: &RawValue) -> CanonicalValue {
    match raw {
        RawValue::Bytes(b) => CanonicalValue::Bit {
            digits: bit_digits(b),
            bytes: b.clone(),
        },
        RawValue::Int(v) => CanonicalValue::Bit {
            digits: format!("{:b}", v),
            bytes: Vec::new(),
        },
        RawValue::UInt(v) => CanonicalValue::Bit {
            digits: format!("{:b}", v),
            bytes: Vec::new(),
        },
        other => passthrough(other),
    }
}

fn bit_from_text(text: &str) -> CanonicalValue {
    let trimmed = text.trim();
    let digits = if !trimmed.is_empty() && trimmed.chars().all(|c| c == '0' || c == '1') {
        let stripped = trimmed.trim_start_matches('0');
        if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        }
    } else {
        match trimmed.parse::<u64>() {
            Ok(v) => format!("{:b}", v),
            Err(_) => return CanonicalValue::Text(text.to_string()),
        }
    };
    CanonicalValue::Bit {
        digits,
        bytes: Vec::new(),
    }
}

fn json(raw: &RawValue) -> CanonicalValue {
    let RawValue::Bytes(bytes) = raw else {
        return passthrough(raw);
    };
    let text = String::from_utf8_lossy(bytes).into_owned();
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(doc) => CanonicalValue::Json(doc.to_string()),
        Err(e) => {
            warn!("malformed JSON value forwarded unchanged: {}", e);
            CanonicalValue::Json(text)
        }
    }
}

fn numeric(raw: &RawValue, kind: ValueKind) -> CanonicalValue {
    let RawValue::Bytes(bytes) = raw else {
        return passthrough(raw);
    };
    let text = String::from_utf8_lossy(bytes).into_owned();
    let trimmed = text.trim();

    let parsed = match kind {
        ValueKind::Float32 => trimmed.parse::<f32>().ok().map(Number::F32),
        ValueKind::Float64 => trimmed.parse::<f64>().ok().map(Number::F64),
        _ => Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .ok()
            .map(Number::Decimal)
            .or_else(|| trimmed.parse::<f64>().ok().map(Number::F64)),
    };

    match parsed {
        Some(value) => CanonicalValue::Numeric { value, text },
        None => {
            // Lenient: both the written and the compared value become zero.
            warn!("unparseable numeric value {:?}, using zero value", text);
            let value = match kind {
                ValueKind::Float32 => Number::F32(0.0),
                ValueKind::Float64 => Number::F64(0.0),
                _ => Number::Decimal(Decimal::ZERO),
            };
            CanonicalValue::Numeric {
                text: value.to_string(),
                value,
            }
        }
    }
}
