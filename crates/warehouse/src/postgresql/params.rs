//! Conversion of row values into bind parameters.

use sync_core::{DestinationType, Value};
use tokio_postgres::types::ToSql;

use crate::error::WarehouseError;

/// Boxed bind parameter.
pub type Param = Box<dyn ToSql + Sync + Send>;

/// Convert a coerced value into a parameter of its column's type.
///
/// Nulls are typed by the column so they bind against the placeholder cast.
pub fn to_param(column: &str, value: &Value, ty: DestinationType) -> Result<Param, WarehouseError> {
    let param: Param = match (ty, value) {
        (_, Value::Null) => typed_null(ty),
        (DestinationType::Int64, Value::Int(i)) => Box::new(*i),
        (DestinationType::Float64, Value::Float(f)) => Box::new(*f),
        (DestinationType::Float64, Value::Int(i)) => Box::new(*i as f64),
        (DestinationType::Numeric, Value::Decimal(d)) => Box::new(*d),
        (DestinationType::Numeric, Value::Int(i)) => Box::new(rust_decimal::Decimal::from(*i)),
        (DestinationType::String, Value::String(s)) => Box::new(s.clone()),
        (DestinationType::Bytes, Value::Bytes(b)) => Box::new(b.clone()),
        (DestinationType::Bool, Value::Bool(b)) => Box::new(*b),
        (DestinationType::Date, Value::Date(d)) => Box::new(*d),
        (DestinationType::Time, Value::Time(t)) => Box::new(*t),
        (DestinationType::Timestamp, Value::Timestamp(ts)) => Box::new(*ts),
        (DestinationType::Json, Value::Json(j)) => Box::new(j.clone()),
        (expected, actual) => {
            return Err(WarehouseError::TypeMismatch {
                column: column.to_string(),
                expected,
                actual: format!("{actual:?}"),
            })
        }
    };
    Ok(param)
}

fn typed_null(ty: DestinationType) -> Param {
    match ty {
        DestinationType::Int64 => Box::new(None::<i64>),
        DestinationType::Float64 => Box::new(None::<f64>),
        DestinationType::Numeric => Box::new(None::<rust_decimal::Decimal>),
        DestinationType::String => Box::new(None::<String>),
        DestinationType::Bytes => Box::new(None::<Vec<u8>>),
        DestinationType::Bool => Box::new(None::<bool>),
        DestinationType::Date => Box::new(None::<chrono::NaiveDate>),
        DestinationType::Time => Box::new(None::<chrono::NaiveTime>),
        DestinationType::Timestamp => Box::new(None::<chrono::NaiveDateTime>),
        DestinationType::Json => Box::new(None::<serde_json::Value>),
    }
}
