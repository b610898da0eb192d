//! Orchestrator: the per-table sync state machine.
//!
//! # Flow
//!
//! ```text
//! INIT -> SCHEMA_CHECK -> EXTRACT -> TRANSLATE -> STAGE_LOAD -> MERGE -> LEDGER_UPDATE -> SUCCESS
//!   \__________\____________\__________\_____________\___________\______-> LEDGER_UPDATE -> FAILED
//! ```
//!
//! Any stage error jumps to `LEDGER_UPDATE` with status FAILED; the ledger is
//! always written so the remark survives. Tables run one after another in
//! configuration order and never affect each other's outcome.
//!
//! The watermark handed to the ledger is `Some` only when a non-empty batch
//! was merged. The ledger keeps the previous value otherwise, so a failed
//! run re-extracts the same window next time and the watermark-guarded merge
//! makes that safe.

use std::fmt;

use ledger::{LedgerEntry, LedgerError, SyncStatus};
use mysql_types::{coerce_batch, translate_columns};
use serde::Serialize;
use sync_core::{
    BatchError, DestinationColumn, DestinationType, ExtractError, RowBatch, TableSyncSpec,
    Watermark,
};
use tracing::{debug, error, info, warn};
use warehouse::{StagingLoader, TableManager, WarehouseError};

use crate::context::SyncContext;
use crate::report::{OutcomeReport, TableOutcome};

/// Stages of one table run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Init,
    SchemaCheck,
    Extract,
    Translate,
    StageLoad,
    Merge,
    LedgerUpdate,
    Success,
    Failed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Init => "INIT",
            SyncState::SchemaCheck => "SCHEMA_CHECK",
            SyncState::Extract => "EXTRACT",
            SyncState::Translate => "TRANSLATE",
            SyncState::StageLoad => "STAGE_LOAD",
            SyncState::Merge => "MERGE",
            SyncState::LedgerUpdate => "LEDGER_UPDATE",
            SyncState::Success => "SUCCESS",
            SyncState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a table run failed.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Source unreachable, rejected credentials, missing table or failed query
    #[error("Extraction failed: {source}")]
    Extraction {
        state: SyncState,
        #[source]
        source: ExtractError,
    },

    /// Destination or staging table could not be created or altered
    #[error("Schema update failed: {source}")]
    Schema {
        state: SyncState,
        #[source]
        source: WarehouseError,
    },

    /// A row without a usable watermark value
    #[error("Invalid batch: {0}")]
    InvalidBatch(#[source] BatchError),

    #[error("Load failed: {0}")]
    Load(#[source] WarehouseError),

    #[error("Merge failed: {0}")]
    Merge(#[source] WarehouseError),

    #[error("Ledger error: {source}")]
    Ledger {
        state: SyncState,
        #[source]
        source: LedgerError,
    },
}

impl SyncError {
    /// The stage the error occurred in.
    pub fn state(&self) -> SyncState {
        match self {
            SyncError::Extraction { state, .. }
            | SyncError::Schema { state, .. }
            | SyncError::Ledger { state, .. } => *state,
            SyncError::InvalidBatch(_) => SyncState::Translate,
            SyncError::Load(_) => SyncState::StageLoad,
            SyncError::Merge(_) => SyncState::Merge,
        }
    }
}

/// Progress of one table run, kept across an early failure.
struct TableRun<'a> {
    table: &'a str,
    state: SyncState,
    remarks: Vec<String>,
    new_columns: Vec<String>,
    row_count: u64,
    column_count: u64,
}

impl<'a> TableRun<'a> {
    fn new(table: &'a str) -> Self {
        Self {
            table,
            state: SyncState::Init,
            remarks: Vec::new(),
            new_columns: Vec::new(),
            row_count: 0,
            column_count: 0,
        }
    }

    fn enter(&mut self, state: SyncState) {
        debug!("{}: {} -> {}", self.table, self.state, state);
        self.state = state;
    }
}

/// Sync every table in order and collect one outcome per table.
pub async fn run(ctx: &SyncContext, specs: &[TableSyncSpec]) -> OutcomeReport {
    let started_at = ctx.timezone.now();
    let mut tables = Vec::with_capacity(specs.len());
    for spec in specs {
        tables.push(sync_table(ctx, spec).await);
    }
    OutcomeReport::new(started_at, ctx.timezone.now(), tables)
}

/// Run one table through the state machine. Never fails: every error ends
/// up in the returned outcome.
pub async fn sync_table(ctx: &SyncContext, spec: &TableSyncSpec) -> TableOutcome {
    let sync_time = ctx.timezone.now();
    let mut run = TableRun::new(&spec.destination_table);
    info!(
        "Syncing {} -> {}",
        spec.source_table,
        ctx.layout.destination(spec)
    );

    let (status, new_watermark, failed_state) = match run_stages(ctx, spec, &mut run).await {
        Ok(watermark) => (SyncStatus::Success, watermark, None),
        Err(e) => {
            warn!("{} failed in {}: {}", spec.destination_table, e.state(), e);
            run.remarks.push(e.to_string());
            (SyncStatus::Failed, None, Some(e.state()))
        }
    };
    let remark = run.remarks.join(" ");

    run.enter(SyncState::LedgerUpdate);
    let entry = LedgerEntry {
        table_name: spec.destination_table.clone(),
        last_run_time: sync_time,
        last_success_watermark: new_watermark,
        status,
        row_count: run.row_count,
        column_count: run.column_count,
        remark: remark.clone(),
    };
    let ledger_error = match ctx.ledger.record(entry).await {
        Ok(()) => None,
        Err(source) => {
            let e = SyncError::Ledger {
                state: SyncState::LedgerUpdate,
                source,
            };
            // The table outcome stands; resumption is what is at risk
            error!(
                "{}: {}; next run may re-extract rows already merged",
                spec.destination_table, e
            );
            Some(e.to_string())
        }
    };

    run.enter(if status.is_success() {
        SyncState::Success
    } else {
        SyncState::Failed
    });
    if status.is_success() {
        info!(
            "{} synced: {} row(s), {} column(s)",
            spec.destination_table, run.row_count, run.column_count
        );
    }

    TableOutcome {
        table_name: spec.destination_table.clone(),
        status,
        row_count: run.row_count,
        column_count: run.column_count,
        new_columns: run.new_columns,
        remark,
        sync_time,
        new_watermark,
        failed_state,
        ledger_error,
    }
}

async fn run_stages(
    ctx: &SyncContext,
    spec: &TableSyncSpec,
    run: &mut TableRun<'_>,
) -> Result<Option<Watermark>, SyncError> {
    let destination = ctx.layout.destination(spec);
    let staging = ctx.layout.staging(spec);
    let manager = TableManager::new(ctx.warehouse.as_ref());
    let loader = StagingLoader::new(ctx.warehouse.as_ref());

    let since = ctx
        .ledger
        .get_watermark(&spec.destination_table)
        .await
        .map_err(|source| SyncError::Ledger {
            state: SyncState::Init,
            source,
        })?;
    debug!("{} resumes after {}", destination, since);

    run.enter(SyncState::SchemaCheck);
    let columns = ctx
        .extractor
        .describe_schema(&spec.source_table)
        .await
        .map_err(|source| SyncError::Extraction {
            state: SyncState::SchemaCheck,
            source,
        })?;
    let mut incoming = translate_columns(&columns);
    let ensured = manager
        .ensure_exists(&destination, &incoming)
        .await
        .map_err(|source| SyncError::Schema {
            state: SyncState::SchemaCheck,
            source,
        })?;
    if ensured.created {
        run.remarks.push("Table created from source schema.".to_string());
    }
    let mut live = ensured.schema;
    run.column_count = live.len() as u64;

    run.enter(SyncState::Extract);
    let mut batch = ctx
        .extractor
        .extract(&spec.source_table, &spec.watermark_column, since)
        .await
        .map_err(|source| SyncError::Extraction {
            state: SyncState::Extract,
            source,
        })?;
    run.row_count = batch.len() as u64;
    info!(
        "Extracted {} row(s) from {} past {}",
        batch.len(),
        spec.source_table,
        since
    );

    run.enter(SyncState::Translate);
    // Columns that appeared between introspection and extraction land as text
    let observed = observed_columns(&batch);
    for column in &observed {
        if !incoming.contains(column) {
            warn!(
                "{}: column '{}' missing from source catalog, adding as {}",
                spec.source_table,
                column,
                DestinationType::String
            );
            incoming.push(DestinationColumn::new(column.clone(), DestinationType::String));
        }
    }

    let added = manager
        .reconcile_columns(&destination, &incoming)
        .await
        .map_err(|source| SyncError::Schema {
            state: SyncState::Translate,
            source,
        })?;
    for name in &added {
        if let Some(ty) = incoming.get(name) {
            live.push(DestinationColumn::new(name.clone(), ty));
        }
    }
    if !added.is_empty() {
        run.remarks.push(format!("Added columns: {}.", added.join(", ")));
        run.new_columns = added;
    }
    run.column_count = live.len() as u64;

    coerce_batch(&mut batch, &live, &ctx.timezone);
    let Some(new_watermark) = batch
        .max_watermark(&spec.watermark_column)
        .map_err(SyncError::InvalidBatch)?
    else {
        run.remarks.push("No new or updated rows".to_string());
        return Ok(None);
    };

    let staging_schema = manager
        .ensure_staging(&staging, &live)
        .await
        .map_err(|source| SyncError::Schema {
            state: SyncState::Translate,
            source,
        })?;

    run.enter(SyncState::StageLoad);
    let loaded = loader
        .load(&batch, &staging, &staging_schema)
        .await
        .map_err(SyncError::Load)?;
    debug!("Staged {} row(s) in {}", loaded, staging);

    run.enter(SyncState::Merge);
    // Staging mirrors the destination, so every destination column is copied;
    // columns the batch no longer carries are staged as null.
    let merge_columns: Vec<String> = live.names().map(str::to_string).collect();
    let merged = loader
        .merge(spec, &staging, &destination, merge_columns)
        .await
        .map_err(SyncError::Merge)?;
    info!(
        "Merged {} staged row(s) into {} ({} inserted or updated)",
        loaded, destination, merged.affected
    );
    run.remarks.push("Merge completed successfully".to_string());
    if let Some(e) = &merged.clear_error {
        run.remarks
            .push(format!("(staging table {staging} not cleared: {e})"));
    }

    Ok(Some(new_watermark))
}

/// Result-set columns followed by any extra keys found in rows.
fn observed_columns(batch: &RowBatch) -> Vec<String> {
    let mut columns: Vec<String> = batch.columns().to_vec();
    for row in batch.rows() {
        for column in row.columns() {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}
