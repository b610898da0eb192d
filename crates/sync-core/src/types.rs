//! Destination column types.
//!
//! `DestinationType` is the closed set of column types the warehouse side of a
//! sync understands. Every source column type is mapped onto exactly one of
//! these by the schema translator; the warehouse backends then derive their
//! own DDL from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column type of a destination (or staging) table.
///
/// # YAML / JSON Format
///
/// Serialized as the upper-case warehouse tag:
/// ```yaml
/// type: INT64
/// type: TIMESTAMP
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationType {
    /// 64-bit signed integer
    Int64,

    /// 64-bit IEEE 754 floating point
    Float64,

    /// Arbitrary-precision decimal
    Numeric,

    /// Unlimited text
    String,

    /// Binary data
    Bytes,

    /// Boolean value
    Bool,

    /// Date only (YYYY-MM-DD)
    Date,

    /// Time of day only (HH:MM:SS[.ffffff])
    Time,

    /// Timestamp stored naive, implicitly in the reference timezone
    Timestamp,

    /// JSON document
    Json,
}

impl DestinationType {
    /// Upper-case tag used in logs, reports and the YAML format.
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::Int64 => "INT64",
            DestinationType::Float64 => "FLOAT64",
            DestinationType::Numeric => "NUMERIC",
            DestinationType::String => "STRING",
            DestinationType::Bytes => "BYTES",
            DestinationType::Bool => "BOOL",
            DestinationType::Date => "DATE",
            DestinationType::Time => "TIME",
            DestinationType::Timestamp => "TIMESTAMP",
            DestinationType::Json => "JSON",
        }
    }

    /// Whether values of this type are numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DestinationType::Int64 | DestinationType::Float64 | DestinationType::Numeric
        )
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown destination type tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown destination type: {0}")]
pub struct UnknownDestinationType(pub String);

impl FromStr for DestinationType {
    type Err = UnknownDestinationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "INT64" => Ok(DestinationType::Int64),
            "FLOAT64" => Ok(DestinationType::Float64),
            "NUMERIC" => Ok(DestinationType::Numeric),
            "STRING" => Ok(DestinationType::String),
            "BYTES" => Ok(DestinationType::Bytes),
            "BOOL" => Ok(DestinationType::Bool),
            "DATE" => Ok(DestinationType::Date),
            "TIME" => Ok(DestinationType::Time),
            "TIMESTAMP" => Ok(DestinationType::Timestamp),
            "JSON" => Ok(DestinationType::Json),
            other => Err(UnknownDestinationType(other.to_string())),
        }
    }
}
