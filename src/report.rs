//! Outcome report and report sinks.
//!
//! The report is what a run hands to notification collaborators: one record
//! per configured table. Sinks only format and deliver it.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use ledger::SyncStatus;
use serde::Serialize;
use sync_core::Watermark;
use tracing::{info, warn};

use crate::sync::SyncState;

/// Report record of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableOutcome {
    pub table_name: String,
    pub status: SyncStatus,
    pub row_count: u64,
    pub column_count: u64,
    pub new_columns: Vec<String>,
    pub remark: String,
    pub sync_time: NaiveDateTime,
    /// Watermark the ledger advanced to; `None` when it stayed put
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_watermark: Option<Watermark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_state: Option<SyncState>,
    /// The ledger write failed; the status above is still accurate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_error: Option<String>,
}

/// Overall result of a run, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every table succeeded and was recorded
    Success,
    /// Every table succeeded but some ledger writes failed
    LedgerDegraded,
    /// Some tables failed
    Partial,
    /// Every table failed
    Failed,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Partial => 2,
            RunStatus::Failed => 3,
            RunStatus::LedgerDegraded => 4,
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeReport {
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub status: RunStatus,
    pub recipients: Vec<String>,
    pub tables: Vec<TableOutcome>,
}

impl OutcomeReport {
    pub fn new(
        started_at: NaiveDateTime,
        finished_at: NaiveDateTime,
        tables: Vec<TableOutcome>,
    ) -> Self {
        let failed = tables.iter().filter(|t| !t.status.is_success()).count();
        let status = if failed > 0 && failed == tables.len() {
            RunStatus::Failed
        } else if failed > 0 {
            RunStatus::Partial
        } else if tables.iter().any(|t| t.ledger_error.is_some()) {
            RunStatus::LedgerDegraded
        } else {
            RunStatus::Success
        };
        Self {
            started_at,
            finished_at,
            status,
            recipients: Vec::new(),
            tables,
        }
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn succeeded(&self) -> usize {
        self.tables.iter().filter(|t| t.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.tables.len() - self.succeeded()
    }

    pub fn table(&self, name: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|t| t.table_name == name)
    }
}

/// Error delivering a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Hand-off point to notification collaborators.
#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, report: &OutcomeReport) -> Result<(), ReportError>;
}

/// Logs a summary line and one line per table.
pub struct LogReportSink;

#[async_trait]
impl ReportSink for LogReportSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, report: &OutcomeReport) -> Result<(), ReportError> {
        info!(
            "Sync finished: {} table(s), {} succeeded, {} failed",
            report.tables.len(),
            report.succeeded(),
            report.failed()
        );
        for table in &report.tables {
            if table.status.is_success() {
                info!(
                    "  {} {}: {} row(s), {} column(s). {}",
                    table.status, table.table_name, table.row_count, table.column_count, table.remark
                );
            } else {
                warn!("  {} {}: {}", table.status, table.table_name, table.remark);
            }
            if let Some(e) = &table.ledger_error {
                warn!("  {}: progress not recorded: {}", table.table_name, e);
            }
        }
        Ok(())
    }
}

/// Writes the report as pretty-printed JSON.
pub struct JsonReportSink {
    path: PathBuf,
}

impl JsonReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReportSink for JsonReportSink {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn deliver(&self, report: &OutcomeReport) -> Result<(), ReportError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, serde_json::to_string_pretty(report)?).await?;
        info!("Wrote outcome report to {}", self.path.display());
        Ok(())
    }
}
