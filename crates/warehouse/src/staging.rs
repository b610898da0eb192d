//! Staging loader and merger.
//!
//! A batch lands in the staging table with full-replace semantics, then is
//! merged into the destination keyed by primary key and guarded by the
//! watermark. Staging is cleared after a successful merge and left intact
//! after a failed one.

use sync_core::{DestinationSchema, RowBatch, TableRef, TableSyncSpec};
use tracing::{debug, warn};

use crate::error::WarehouseError;
use crate::statement::MergePlan;
use crate::traits::Warehouse;

/// What a merge did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Destination rows inserted or updated
    pub affected: u64,
    /// Why staging could not be cleared afterwards, if it could not
    pub clear_error: Option<String>,
}

impl MergeOutcome {
    pub fn staging_cleared(&self) -> bool {
        self.clear_error.is_none()
    }
}

/// Loads batches into staging and merges them into the destination.
pub struct StagingLoader<'a, W: Warehouse + ?Sized> {
    warehouse: &'a W,
}

impl<'a, W: Warehouse + ?Sized> StagingLoader<'a, W> {
    pub fn new(warehouse: &'a W) -> Self {
        Self { warehouse }
    }

    /// Replace the contents of `staging` with `batch`.
    ///
    /// An empty batch is a no-op returning zero; staging is not touched.
    pub async fn load(
        &self,
        batch: &RowBatch,
        staging: &TableRef,
        schema: &DestinationSchema,
    ) -> Result<u64, WarehouseError> {
        if batch.is_empty() {
            debug!("Nothing to stage for {}", staging);
            return Ok(0);
        }
        self.warehouse
            .load_replace(staging, schema, batch.rows())
            .await
    }

    /// Upsert `staging` into `destination` and clear staging.
    ///
    /// `columns` are the columns copied from staging; they must include the
    /// table's key and watermark columns. A failed truncate after a committed
    /// merge does not fail the call; it is carried in
    /// [`MergeOutcome::clear_error`] since the next load replaces staging.
    pub async fn merge(
        &self,
        spec: &TableSyncSpec,
        staging: &TableRef,
        destination: &TableRef,
        columns: Vec<String>,
    ) -> Result<MergeOutcome, WarehouseError> {
        let plan = MergePlan::new(
            destination.clone(),
            staging.clone(),
            spec.primary_key.clone(),
            spec.watermark_column.clone(),
            columns,
        )?;
        let affected = self.warehouse.merge(&plan).await?;
        debug!("Merge into {} affected {} row(s)", destination, affected);

        let clear_error = match self.warehouse.truncate(staging).await {
            Ok(()) => None,
            Err(e) => {
                warn!("Failed to clear staging {} after merge: {}", staging, e);
                Some(e.to_string())
            }
        };
        Ok(MergeOutcome {
            affected,
            clear_error,
        })
    }
}
