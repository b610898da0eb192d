//! Ledger storage trait and errors
//!
//! This module defines the LedgerStore trait for backend-agnostic
//! ledger operations.

use async_trait::async_trait;

use crate::entry::LedgerEntry;

/// Errors raised by ledger storage.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger database error: {0}")]
    Database(String),

    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown sync status '{0}' in ledger")]
    InvalidStatus(String),

    #[error("Ledger write rejected: {0}")]
    Rejected(String),
}

impl From<tokio_postgres::Error> for LedgerError {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.as_db_error() {
            Some(db) => LedgerError::Database(format!("{}: {}", db.code().code(), db.message())),
            None => LedgerError::Database(e.to_string()),
        }
    }
}

impl From<warehouse::WarehouseError> for LedgerError {
    fn from(e: warehouse::WarehouseError) -> Self {
        LedgerError::Database(e.to_string())
    }
}

/// Trait for ledger storage operations.
///
/// This trait abstracts the storage backend, allowing the same ledger
/// logic to work with:
/// - The destination warehouse (`PostgresLedgerStore`)
/// - Filesystem storage (`FilesystemLedgerStore`)
/// - In-process storage for tests (`MemoryLedgerStore`)
///
/// `upsert` must be atomic per table and follow
/// [`LedgerEntry::merged_over`]: the stored watermark never moves backwards
/// and is never cleared by a failed run.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Backend identifier for logs
    fn backend(&self) -> &'static str;

    /// Read the entry of one table; `None` if it was never recorded.
    async fn read(&self, table_name: &str) -> Result<Option<LedgerEntry>, LedgerError>;

    /// Insert or update the entry of `entry.table_name`.
    async fn upsert(&self, entry: &LedgerEntry) -> Result<(), LedgerError>;

    /// All entries, ordered by table name.
    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError>;
}
