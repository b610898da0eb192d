//! Value representations for extracted rows.
//!
//! Rows leave the source as loosely typed `Value`s, get coerced to their
//! destination column types by the translator, and are consumed once by the
//! staging loader.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Watermark position of a table: a naive timestamp in the reference timezone.
pub type Watermark = NaiveDateTime;

/// Watermark returned for a table that was never synced (`1970-01-01T00:00:00`).
pub fn epoch_watermark() -> Watermark {
    NaiveDateTime::default()
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value
    Null,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point
    Float(f64),

    /// Arbitrary-precision decimal
    Decimal(Decimal),

    /// Text value
    String(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Date only
    Date(NaiveDate),

    /// Time of day only
    Time(NaiveTime),

    /// Naive timestamp (reference timezone)
    Timestamp(NaiveDateTime),

    /// Timestamp carrying an offset; never survives coercion
    TimestampTz(DateTime<FixedOffset>),

    /// JSON document
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Interpret this value as a watermark position.
    ///
    /// Dates count as midnight. Offset-carrying timestamps are not accepted:
    /// they must be normalized before a watermark is taken.
    pub fn as_watermark(&self) -> Option<Watermark> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }

    /// Order two values of the same family.
    ///
    /// Returns `None` for nulls and for values of unrelated families. Integers,
    /// floats and decimals compare numerically; dates compare with timestamps
    /// at midnight.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Int(b)) => Some(a.cmp(&Decimal::from(*b))),
            (Value::Int(a), Value::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::TimestampTz(a), Value::TimestampTz(b)) => Some(a.cmp(b)),
            (Value::Timestamp(_) | Value::Date(_), Value::Timestamp(_) | Value::Date(_)) => {
                Some(self.as_watermark()?.cmp(&other.as_watermark()?))
            }
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One extracted record: column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Set a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    /// Get a column value. Absent columns read as `None`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Mutable access to a column value.
    pub fn get_mut(&mut self, column: &str) -> Option<&mut Value> {
        self.values.get_mut(column)
    }

    /// Column names present in this row, in no particular order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterate over (column, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Error raised when a batch violates the watermark invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("Row {row} has no value for watermark column '{column}'")]
    MissingWatermark { row: usize, column: String },

    #[error("Row {row} has a non-temporal value in watermark column '{column}'")]
    InvalidWatermark { row: usize, column: String },
}

/// Rows extracted for one table in one run.
///
/// Either empty, or every row carries a non-null watermark value
/// (checked by [`RowBatch::max_watermark`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBatch {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl RowBatch {
    /// Create a batch from result-set column names and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// An empty batch (no new rows).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Result-set column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The extracted rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Mutable access for in-place coercion.
    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Highest watermark value in the batch, `None` for an empty batch.
    ///
    /// Fails if any row lacks a usable watermark value.
    pub fn max_watermark(&self, column: &str) -> Result<Option<Watermark>, BatchError> {
        let mut max: Option<Watermark> = None;
        for (idx, row) in self.rows.iter().enumerate() {
            let value = match row.get(column) {
                None | Some(Value::Null) => {
                    return Err(BatchError::MissingWatermark {
                        row: idx,
                        column: column.to_string(),
                    })
                }
                Some(v) => v,
            };
            let wm = value
                .as_watermark()
                .ok_or_else(|| BatchError::InvalidWatermark {
                    row: idx,
                    column: column.to_string(),
                })?;
            max = Some(max.map_or(wm, |m| m.max(wm)));
        }
        Ok(max)
    }
}
