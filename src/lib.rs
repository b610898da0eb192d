//! warehouse-sync library
//!
//! Incrementally replicates MySQL tables into a PostgreSQL warehouse. Each
//! configured table is synced by watermark: rows whose watermark column is
//! past the last successfully merged value are extracted, coerced, staged
//! and merged into the destination, and the outcome is recorded in a ledger.
//!
//! # Crates
//!
//! - `sync_core` - table specs, schemas, values and the `Extractor` seam
//! - `mysql_types` - type translation, timezone policy and row coercion
//! - `warehouse_sync_mysql_source` - MySQL extractor over an optional SSH tunnel
//! - `warehouse` - destination table manager and staging loader/merger
//! - `ledger` - per-table sync progress
//!
//! # CLI Usage
//!
//! ```bash
//! # Sync every configured table
//! warehouse-sync run --config sync.yaml
//!
//! # Sync selected tables only
//! warehouse-sync run --config sync.yaml --table orders --table customers
//!
//! # Inspect the ledger
//! warehouse-sync status --config sync.yaml
//!
//! # Show how source column types translate
//! warehouse-sync translate "int(11) unsigned" "decimal(10,2)" datetime
//! ```

pub mod config;
pub mod context;
pub mod report;
pub mod sync;
pub mod testing;

pub use config::{Config, ConfigError, LedgerBackend};
pub use context::{DatasetLayout, SyncContext};
pub use report::{
    JsonReportSink, LogReportSink, OutcomeReport, ReportError, ReportSink, RunStatus,
    TableOutcome,
};
pub use sync::{run, sync_table, SyncError, SyncState};
