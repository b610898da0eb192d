//! Reverse conversion: MySQL values → Value
//!
//! Extraction uses prepared statements, so values arrive in the binary
//! protocol: integers and floats typed, temporal values as `Date`/`Time`,
//! and everything else (DECIMAL, text, JSON, ENUM, SET, blobs) as bytes.
//! Decoding here is loose and never fails; [`crate::coerce`] brings each
//! value to its destination column type afterwards.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mysql_async::Value as MySqlValue;
use sync_core::{Row, Value};
use tracing::debug;

/// Convert one MySQL value to a [`Value`].
///
/// Zero dates (`0000-00-00`) decode to null, matching how MySQL clients
/// usually surface them. So do dates non-strict `sql_mode` lets through
/// with a zero part (`2024-00-00`) or no calendar day (`2024-02-31`).
pub fn mysql_value_to_value(value: MySqlValue) -> Value {
    match value {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Int(i) => Value::Int(i),
        MySqlValue::UInt(u) => extract_uint(u),
        MySqlValue::Float(f) => Value::Float(f64::from(f)),
        MySqlValue::Double(d) => Value::Float(d),
        MySqlValue::Bytes(b) => extract_bytes(b),
        MySqlValue::Date(0, 0, 0, _, _, _, _) => Value::Null,
        MySqlValue::Date(year, month, day, hour, min, sec, micro) => {
            match extract_datetime(year, month, day, hour, min, sec, micro) {
                Some(dt) => Value::Timestamp(dt),
                None => {
                    debug!(
                        "Invalid date/time {:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06} decoded as null",
                        year, month, day, hour, min, sec, micro
                    );
                    Value::Null
                }
            }
        }
        MySqlValue::Time(negative, days, hour, min, sec, micro) => {
            extract_time(negative, days, hour, min, sec, micro)
        }
    }
}

/// Names of the result-set columns of a row, in select order.
pub fn column_names(row: &mysql_async::Row) -> Vec<String> {
    row.columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect()
}

/// Convert a whole MySQL row.
pub fn row_to_values(mut row: mysql_async::Row) -> Row {
    let names = column_names(&row);
    let mut out = Row::new();
    for (idx, name) in names.into_iter().enumerate() {
        let raw = row
            .take::<MySqlValue, _>(idx)
            .unwrap_or(MySqlValue::NULL);
        out.insert(name, mysql_value_to_value(raw));
    }
    out
}

/// BIGINT UNSIGNED values above `i64::MAX` are kept as their decimal text.
fn extract_uint(u: u64) -> Value {
    match i64::try_from(u) {
        Ok(i) => Value::Int(i),
        Err(_) => Value::String(u.to_string()),
    }
}

/// Text when the bytes are UTF-8, raw bytes otherwise.
fn extract_bytes(b: Vec<u8>) -> Value {
    match String::from_utf8(b) {
        Ok(s) => Value::String(s),
        Err(e) => Value::Bytes(e.into_bytes()),
    }
}

fn extract_datetime(
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    min: u8,
    sec: u8,
    micro: u32,
) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))?;
    let time =
        NaiveTime::from_hms_micro_opt(u32::from(hour), u32::from(min), u32::from(sec), micro)?;
    Some(NaiveDateTime::new(date, time))
}

/// TIME values outside a single day (MySQL allows ±838 hours) have no
/// time-of-day form and are kept as their text.
fn extract_time(negative: bool, days: u32, hour: u8, min: u8, sec: u8, micro: u32) -> Value {
    if !negative && days == 0 {
        if let Some(t) =
            NaiveTime::from_hms_micro_opt(u32::from(hour), u32::from(min), u32::from(sec), micro)
        {
            return Value::Time(t);
        }
    }
    let hours = days * 24 + u32::from(hour);
    let sign = if negative { "-" } else { "" };
    Value::String(format!("{sign}{hours:02}:{min:02}:{sec:02}"))
}
