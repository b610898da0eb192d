//! Destination table manager.
//!
//! Tables only ever grow: creation uses the translated schema, and
//! reconciliation appends missing nullable columns. Nothing is dropped or
//! retyped.

use sync_core::{DestinationSchema, TableRef};
use tracing::{debug, info};

use crate::error::WarehouseError;
use crate::traits::Warehouse;

/// Result of [`TableManager::ensure_exists`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredTable {
    /// Live schema after the call
    pub schema: DestinationSchema,
    /// Whether this call created the table
    pub created: bool,
}

/// Creates and reconciles destination and staging tables.
pub struct TableManager<'a, W: Warehouse + ?Sized> {
    warehouse: &'a W,
}

impl<'a, W: Warehouse + ?Sized> TableManager<'a, W> {
    pub fn new(warehouse: &'a W) -> Self {
        Self { warehouse }
    }

    /// Create `table` from `schema` if it is absent.
    ///
    /// An existing table is left exactly as it is; its live schema is
    /// returned instead.
    pub async fn ensure_exists(
        &self,
        table: &TableRef,
        schema: &DestinationSchema,
    ) -> Result<EnsuredTable, WarehouseError> {
        if self.warehouse.table_exists(table).await? {
            debug!("{} exists", table);
            return Ok(EnsuredTable {
                schema: self.warehouse.table_schema(table).await?,
                created: false,
            });
        }

        self.warehouse.create_table(table, schema).await?;
        info!("Created {} with {} column(s)", table, schema.len());
        Ok(EnsuredTable {
            schema: schema.clone(),
            created: true,
        })
    }

    /// Append every column of `incoming` that `table` lacks, in one schema
    /// update. Returns the added column names in `incoming` order.
    ///
    /// Idempotent: a second call with the same `incoming` adds nothing.
    pub async fn reconcile_columns(
        &self,
        table: &TableRef,
        incoming: &DestinationSchema,
    ) -> Result<Vec<String>, WarehouseError> {
        let live = self.warehouse.table_schema(table).await?;
        let missing = live.missing_from(incoming);
        if missing.is_empty() {
            return Ok(Vec::new());
        }

        self.warehouse.add_columns(table, &missing).await?;
        let added: Vec<String> = missing.into_iter().map(|c| c.name).collect();
        info!("Added column(s) to {}: {}", table, added.join(", "));
        Ok(added)
    }

    /// Make `staging` mirror the destination's columns.
    ///
    /// Creates it from `destination_schema` when absent, otherwise reconciles
    /// it against that schema. Returns the staging schema to load with.
    pub async fn ensure_staging(
        &self,
        staging: &TableRef,
        destination_schema: &DestinationSchema,
    ) -> Result<DestinationSchema, WarehouseError> {
        let ensured = self.ensure_exists(staging, destination_schema).await?;
        if !ensured.created {
            let added = self.reconcile_columns(staging, destination_schema).await?;
            if !added.is_empty() {
                debug!("Staging {} caught up with {} column(s)", staging, added.len());
            }
        }
        Ok(destination_schema.clone())
    }
}
