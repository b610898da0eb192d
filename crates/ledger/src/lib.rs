//! Sync ledger for warehouse-sync
//!
//! Durable per-table record of the latest run and of the watermark reached
//! by the latest successful run. It is the only place that decides where
//! the next extraction window starts.
//!
//! ## Storage Backends
//!
//! - `PostgresLedgerStore` - A table in the destination warehouse
//! - `FilesystemLedgerStore` - One JSON file per table in a directory
//! - `MemoryLedgerStore` - In-process, for tests

mod entry;
mod filesystem;
mod memory;
mod postgresql;
pub mod store;


use std::sync::Arc;

use sync_core::{epoch_watermark, Watermark};

pub use entry::{LedgerEntry, SyncStatus};
pub use filesystem::FilesystemLedgerStore;
pub use memory::MemoryLedgerStore;
pub use postgresql::{PostgresLedgerStore, DEFAULT_LEDGER_TABLE};
pub use store::{LedgerError, LedgerStore};

/// Reads and records sync progress through a [`LedgerStore`].
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Watermark to resume `table_name` from.
    ///
    /// Only successful runs write a watermark, so the stored value belongs
    /// to the latest successful run even when the latest run failed. A
    /// table never synced successfully resumes from the epoch.
    pub async fn get_watermark(&self, table_name: &str) -> Result<Watermark, LedgerError> {
        let watermark = self
            .store
            .read(table_name)
            .await?
            .and_then(|entry| entry.last_success_watermark);
        Ok(watermark.unwrap_or_else(epoch_watermark))
    }

    /// Upsert the entry of `entry.table_name`.
    ///
    /// A `None` watermark preserves the stored one.
    pub async fn record(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
        tracing::debug!(
            "Recording {} for {} via {} ledger",
            entry.status,
            entry.table_name,
            self.store.backend()
        );
        self.store.upsert(&entry).await
    }

    /// Entry of one table, if any.
    pub async fn entry(&self, table_name: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        self.store.read(table_name).await
    }

    /// All entries, ordered by table name.
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.store.entries().await
    }
}
