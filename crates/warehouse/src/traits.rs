//! Warehouse trait definition.
//!
//! The sync core needs exactly five destination capabilities: existence
//! check, creation with an explicit column list, column append, full-replace
//! bulk load, and a set-based merge plus truncate. Reading the live column
//! list backs the existence check for reconciliation.

use async_trait::async_trait;
use sync_core::{DestinationColumn, DestinationSchema, Row, TableRef};

use crate::error::WarehouseError;
use crate::statement::MergePlan;

/// Trait for a destination warehouse.
///
/// # Usage Pattern
///
/// The table manager and staging loader are generic over this trait:
///
/// ```ignore
/// let manager = TableManager::new(&warehouse);
/// let created = manager.ensure_exists(&destination, &schema).await?;
/// ```
///
/// The CLI picks the implementation once; tests use
/// [`crate::MemoryWarehouse`].
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Get the warehouse type identifier
    fn warehouse_type(&self) -> &'static str;

    /// Whether the table exists.
    async fn table_exists(&self, table: &TableRef) -> Result<bool, WarehouseError>;

    /// Create a table with the given columns, all nullable.
    ///
    /// Creating a table that already exists is not an error and leaves it
    /// untouched.
    async fn create_table(
        &self,
        table: &TableRef,
        schema: &DestinationSchema,
    ) -> Result<(), WarehouseError>;

    /// Current columns of an existing table, in ordinal order.
    async fn table_schema(&self, table: &TableRef) -> Result<DestinationSchema, WarehouseError>;

    /// Append nullable columns in a single schema update.
    async fn add_columns(
        &self,
        table: &TableRef,
        columns: &[DestinationColumn],
    ) -> Result<(), WarehouseError>;

    /// Replace the entire contents of `table` with `rows`.
    ///
    /// Every column of `schema` is written; a row without a value for a
    /// column writes null. Returns the number of rows written.
    async fn load_replace(
        &self,
        table: &TableRef,
        schema: &DestinationSchema,
        rows: &[Row],
    ) -> Result<u64, WarehouseError>;

    /// Execute a keyed upsert as one atomic statement. Returns the number of
    /// destination rows inserted or updated.
    async fn merge(&self, plan: &MergePlan) -> Result<u64, WarehouseError>;

    /// Remove every row of `table`.
    async fn truncate(&self, table: &TableRef) -> Result<(), WarehouseError>;
}
