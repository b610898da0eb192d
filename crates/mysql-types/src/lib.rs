//! MySQL type handling for warehouse-sync.
//!
//! This crate is the schema translator of the pipeline: it maps MySQL column
//! types onto [`sync_core::DestinationType`], decodes MySQL wire values into
//! [`sync_core::Value`], and coerces extracted rows to their destination
//! column types before they are staged.
//!
//! # Structure
//!
//! - `schema`: MySQL column type string → `DestinationType`
//! - `reverse`: MySQL values → `Value` (for reading extracted rows)
//! - `timezone`: the single timezone normalization policy
//! - `coerce`: row-level coercion of a `RowBatch` against a `DestinationSchema`
//!
//! # Example
//!
//! ```rust
//! use mysql_types::translate;
//! use sync_core::DestinationType;
//!
//! assert_eq!(translate("int(11) unsigned"), DestinationType::Int64);
//! assert_eq!(translate("decimal(10,2)"), DestinationType::Numeric);
//! assert_eq!(translate("geometry"), DestinationType::String);
//! ```

pub mod coerce;
pub mod reverse;
pub mod schema;
pub mod timezone;

pub use coerce::{coerce_batch, coerce_value, is_null_placeholder};
pub use reverse::{column_names, mysql_value_to_value, row_to_values};
pub use schema::{base_type, is_numeric_source, translate, translate_columns};
pub use timezone::{ConversionError, TimezonePolicy};
