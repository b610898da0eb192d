//! Row-level coercion of extracted batches.
//!
//! Every value is brought to the type of its destination column before load.
//! Anomalies never fail the batch: a value that cannot be represented in its
//! column's type becomes null. Offset-carrying timestamps are normalized
//! through the [`TimezonePolicy`] wherever they appear.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sync_core::{DestinationSchema, DestinationType, RowBatch, Value};
use tracing::debug;

use crate::timezone::TimezonePolicy;

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Whether a string is a placeholder for a missing number: empty,
/// whitespace-only, or `null`/`none` in any case.
pub fn is_null_placeholder(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("none")
}

/// Coerce every row of `batch` in place against `schema`.
///
/// Columns absent from the schema only get timezone normalization.
/// Returns the number of non-null values that had to be nulled.
pub fn coerce_batch(
    batch: &mut RowBatch,
    schema: &DestinationSchema,
    policy: &TimezonePolicy,
) -> usize {
    let mut nulled = 0;
    for row in batch.rows_mut() {
        let columns: Vec<String> = row.columns().map(str::to_string).collect();
        for column in columns {
            let Some(slot) = row.get_mut(&column) else {
                continue;
            };
            let value = std::mem::replace(slot, Value::Null);
            let was_null = value.is_null();
            *slot = match schema.get(&column) {
                Some(ty) => coerce_value(value, ty, policy),
                None => normalize_timezone(value, policy),
            };
            if !was_null && slot.is_null() {
                nulled += 1;
            }
        }
    }
    if nulled > 0 {
        debug!("Coercion nulled {} value(s) that did not fit their column type", nulled);
    }
    nulled
}

/// Coerce a single value to a destination type.
pub fn coerce_value(value: Value, ty: DestinationType, policy: &TimezonePolicy) -> Value {
    let value = normalize_timezone(value, policy);
    if ty.is_numeric() {
        if let Value::String(s) = &value {
            if is_null_placeholder(s) {
                return Value::Null;
            }
        }
    }
    if value.is_null() {
        return Value::Null;
    }

    let coerced = match ty {
        DestinationType::Int64 => to_int(value),
        DestinationType::Float64 => to_float(value),
        DestinationType::Numeric => to_numeric(value),
        DestinationType::String => Some(to_text(value)),
        DestinationType::Bytes => to_bytes(value),
        DestinationType::Bool => to_bool(value),
        DestinationType::Date => to_date(value, policy),
        DestinationType::Time => to_time(value),
        DestinationType::Timestamp => to_timestamp(value, policy),
        DestinationType::Json => Some(to_json(value)),
    };
    coerced.unwrap_or(Value::Null)
}

fn normalize_timezone(value: Value, policy: &TimezonePolicy) -> Value {
    match value {
        Value::TimestampTz(ts) => Value::Timestamp(policy.normalize(&ts)),
        other => other,
    }
}

fn to_int(value: Value) -> Option<Value> {
    let i = match value {
        Value::Int(i) => i,
        Value::Bool(b) => i64::from(b),
        Value::Float(f) if f.fract() == 0.0 => Decimal::try_from(f).ok()?.to_i64()?,
        Value::Decimal(d) if d.fract().is_zero() => d.to_i64()?,
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => i,
                Err(_) => {
                    let d = s.parse::<Decimal>().ok()?;
                    if !d.fract().is_zero() {
                        return None;
                    }
                    d.to_i64()?
                }
            }
        }
        _ => return None,
    };
    Some(Value::Int(i))
}

fn to_float(value: Value) -> Option<Value> {
    let f = match value {
        Value::Float(f) => f,
        Value::Int(i) => i as f64,
        Value::Bool(b) => f64::from(u8::from(b)),
        Value::Decimal(d) => d.to_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(Value::Float(f))
}

fn to_numeric(value: Value) -> Option<Value> {
    let d = match value {
        Value::Decimal(d) => d,
        Value::Int(i) => Decimal::from(i),
        Value::Bool(b) => Decimal::from(u8::from(b)),
        Value::Float(f) => Decimal::try_from(f).ok()?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<Decimal>()
                .or_else(|_| Decimal::from_scientific(s))
                .ok()?
        }
        _ => return None,
    };
    Some(Value::Decimal(d))
}

fn to_text(value: Value) -> Value {
    let s = match value {
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Bytes(b) => String::from_utf8_lossy(&b).into_owned(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
        Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        Value::TimestampTz(ts) => ts.to_rfc3339(),
        Value::Json(j) => j.to_string(),
        Value::Null => return Value::Null,
    };
    Value::String(s)
}

fn to_bytes(value: Value) -> Option<Value> {
    match value {
        Value::Bytes(b) => Some(Value::Bytes(b)),
        Value::String(s) => Some(Value::Bytes(s.into_bytes())),
        _ => None,
    }
}

fn to_bool(value: Value) -> Option<Value> {
    let b = match value {
        Value::Bool(b) => b,
        Value::Int(i) => i != 0,
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "t" | "yes" | "y" => true,
            "0" | "false" | "f" | "no" | "n" => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(Value::Bool(b))
}

fn to_date(value: Value, policy: &TimezonePolicy) -> Option<Value> {
    let d = match value {
        Value::Date(d) => d,
        Value::Timestamp(ts) => ts.date(),
        Value::String(s) => {
            let s = s.trim();
            match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(d) => d,
                Err(_) => parse_timestamp(s, policy)?.date(),
            }
        }
        _ => return None,
    };
    Some(Value::Date(d))
}

fn to_time(value: Value) -> Option<Value> {
    let t = match value {
        Value::Time(t) => t,
        Value::Timestamp(ts) => ts.time(),
        Value::String(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f").ok()?,
        _ => return None,
    };
    Some(Value::Time(t))
}

fn to_timestamp(value: Value, policy: &TimezonePolicy) -> Option<Value> {
    let ts = match value {
        Value::Timestamp(ts) => ts,
        Value::Date(d) => d.and_hms_opt(0, 0, 0)?,
        Value::String(s) => parse_timestamp(s.trim(), policy)?,
        _ => return None,
    };
    Some(Value::Timestamp(ts))
}

fn to_json(value: Value) -> Value {
    let json = match value {
        Value::Json(j) => j,
        Value::String(s) => {
            serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s))
        }
        Value::Bool(b) => serde_json::Value::Bool(b),
        Value::Int(i) => serde_json::Value::from(i),
        Value::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        other => match to_text(other) {
            Value::String(s) => serde_json::Value::String(s),
            _ => serde_json::Value::Null,
        },
    };
    Value::Json(json)
}

/// Naive timestamps are taken as already in the reference timezone; strings
/// with an offset are converted into it.
fn parse_timestamp(s: &str, policy: &TimezonePolicy) -> Option<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(policy.normalize(&ts));
    }
    if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(policy.normalize(&ts));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
}
