//! Core types for the warehouse-sync framework.
//!
//! This crate provides the foundational types used across the sync
//! framework, including:
//!
//! - [`TableSyncSpec`] - One configured table
//! - [`ColumnDescriptor`] - Source column metadata from introspection
//! - [`DestinationType`] / [`DestinationSchema`] - Destination column types
//! - [`Value`] / [`Row`] / [`RowBatch`] - Extracted data
//! - [`Extractor`] - The source seam the orchestrator pulls rows through
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── mysql-types    (source type translation and row coercion)
//!    ├─── mysql-source   (implements Extractor for MySQL)
//!    ├─── warehouse      (destination table manager, staging loader/merger)
//!    └─── ledger         (per-table sync progress)
//! ```

pub mod schema;
pub mod source;
pub mod types;
pub mod values;

pub use schema::{
    ColumnDescriptor, DestinationColumn, DestinationSchema, TableRef, TableSyncSpec,
    DEFAULT_PRIMARY_KEY, DEFAULT_WATERMARK_COLUMN,
};
pub use source::{ExtractError, Extractor};
pub use types::{DestinationType, UnknownDestinationType};
pub use values::{epoch_watermark, BatchError, Row, RowBatch, Value, Watermark};
