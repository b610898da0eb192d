//! PostgreSQL DDL generation from DestinationType.
//!
//! Maps destination types to PostgreSQL column types and back, so a live
//! table's columns can be compared with an incoming schema.

use sync_core::DestinationType;

/// Trait for generating DDL type strings.
pub trait ToDdl {
    /// Convert a DestinationType to a DDL type string.
    fn to_ddl(&self, column_type: DestinationType) -> &'static str;

    /// Convert a catalog type name back to a DestinationType.
    fn from_catalog(&self, data_type: &str) -> DestinationType;
}

/// PostgreSQL DDL generator.
pub struct PostgreSQLDdl;

impl ToDdl for PostgreSQLDdl {
    fn to_ddl(&self, column_type: DestinationType) -> &'static str {
        match column_type {
            DestinationType::Int64 => "BIGINT",
            DestinationType::Float64 => "DOUBLE PRECISION",
            DestinationType::Numeric => "NUMERIC",
            DestinationType::String => "TEXT",
            DestinationType::Bytes => "BYTEA",
            DestinationType::Bool => "BOOLEAN",
            DestinationType::Date => "DATE",
            DestinationType::Time => "TIME",
            DestinationType::Timestamp => "TIMESTAMP",
            DestinationType::Json => "JSONB",
        }
    }

    /// `information_schema.columns.data_type` spelling.
    fn from_catalog(&self, data_type: &str) -> DestinationType {
        match data_type.to_lowercase().as_str() {
            "bigint" | "integer" | "smallint" => DestinationType::Int64,
            "double precision" | "real" => DestinationType::Float64,
            "numeric" => DestinationType::Numeric,
            "bytea" => DestinationType::Bytes,
            "boolean" => DestinationType::Bool,
            "date" => DestinationType::Date,
            "time without time zone" | "time with time zone" => DestinationType::Time,
            "timestamp without time zone" | "timestamp with time zone" => {
                DestinationType::Timestamp
            }
            "json" | "jsonb" => DestinationType::Json,
            // text, character varying, character and anything exotic
            _ => DestinationType::String,
        }
    }
}
