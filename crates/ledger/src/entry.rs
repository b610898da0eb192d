//! Ledger entry and run status.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sync_core::Watermark;

use crate::store::LedgerError;

/// Terminal status of one table run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Extraction, load and merge all completed.
    Success,
    /// Some stage failed; the watermark was not advanced.
    Failed,
}

impl SyncStatus {
    /// Get the string representation stored in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "SUCCESS",
            SyncStatus::Failed => "FAILED",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SyncStatus::Success)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(SyncStatus::Success),
            "FAILED" => Ok(SyncStatus::Failed),
            other => Err(LedgerError::InvalidStatus(other.to_string())),
        }
    }
}

/// The single ledger record of one destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Destination table name (unique key)
    pub table_name: String,
    /// When the latest run started
    pub last_run_time: NaiveDateTime,
    /// Highest watermark landed by a successful run
    pub last_success_watermark: Option<Watermark>,
    pub status: SyncStatus,
    pub row_count: u64,
    pub column_count: u64,
    pub remark: String,
}

impl LedgerEntry {
    /// Apply this entry on top of the stored one.
    ///
    /// Every field is overwritten except the watermark, which becomes the
    /// maximum of both; a `None` here keeps the stored value.
    pub fn merged_over(mut self, existing: Option<&LedgerEntry>) -> LedgerEntry {
        let previous = existing.and_then(|e| e.last_success_watermark);
        self.last_success_watermark = match (previous, self.last_success_watermark) {
            (Some(old), Some(new)) => Some(old.max(new)),
            (old, new) => new.or(old),
        };
        self
    }
}
