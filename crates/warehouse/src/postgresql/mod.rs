//! PostgreSQL warehouse backend.
//!
//! Requires PostgreSQL 15 or later for `MERGE`. Datasets map to schemas.
//! Every operation opens its own connection and closes it before returning.

mod client;
mod params;

pub use client::{connect, sanitize_connection_string};

use async_trait::async_trait;
use sync_core::{DestinationColumn, DestinationSchema, Row, TableRef};
use tokio_postgres::types::ToSql;
use tracing::debug;

use crate::ddl::{PostgreSQLDdl, ToDdl};
use crate::error::WarehouseError;
use crate::statement::{self, MergePlan};
use crate::traits::Warehouse;
use params::{to_param, Param};

/// Default number of rows per INSERT statement during load.
pub const DEFAULT_BATCH_SIZE: usize = 500;

// PostgreSQL caps bind parameters per statement at 65535
const MAX_PARAMS: usize = 65_535;

/// Warehouse backed by a PostgreSQL database
pub struct PostgresWarehouse {
    connection_string: String,
    batch_size: usize,
}

impl PostgresWarehouse {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the number of rows per INSERT statement.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Rows per statement, capped so one statement stays under the
    /// parameter limit.
    fn rows_per_statement(&self, column_count: usize) -> usize {
        let cap = MAX_PARAMS / column_count.max(1);
        self.batch_size.min(cap).max(1)
    }
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    fn warehouse_type(&self) -> &'static str {
        "postgresql"
    }

    async fn table_exists(&self, table: &TableRef) -> Result<bool, WarehouseError> {
        let client = connect(&self.connection_string).await?;
        let row = client
            .query_opt(
                "SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2",
                &[&table.dataset, &table.table],
            )
            .await?;
        Ok(row.is_some())
    }

    async fn create_table(
        &self,
        table: &TableRef,
        schema: &DestinationSchema,
    ) -> Result<(), WarehouseError> {
        let client = connect(&self.connection_string).await?;
        client
            .batch_execute(&statement::create_schema(&table.dataset))
            .await?;
        let sql = statement::create_table(table, schema);
        debug!("Creating {}: {}", table, sql);
        client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn table_schema(&self, table: &TableRef) -> Result<DestinationSchema, WarehouseError> {
        let client = connect(&self.connection_string).await?;
        let rows = client
            .query(
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
                &[&table.dataset, &table.table],
            )
            .await?;
        if rows.is_empty() {
            return Err(WarehouseError::TableNotFound(table.to_string()));
        }

        let mut schema = DestinationSchema::new();
        for row in rows {
            let name: String = row.try_get(0)?;
            let data_type: String = row.try_get(1)?;
            schema.push(DestinationColumn::new(
                name,
                PostgreSQLDdl.from_catalog(&data_type),
            ));
        }
        Ok(schema)
    }

    async fn add_columns(
        &self,
        table: &TableRef,
        columns: &[DestinationColumn],
    ) -> Result<(), WarehouseError> {
        if columns.is_empty() {
            return Ok(());
        }
        let client = connect(&self.connection_string).await?;
        let sql = statement::add_columns(table, columns);
        debug!("Altering {}: {}", table, sql);
        client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn load_replace(
        &self,
        table: &TableRef,
        schema: &DestinationSchema,
        rows: &[Row],
    ) -> Result<u64, WarehouseError> {
        let mut client = connect(&self.connection_string).await?;
        let tx = client.transaction().await?;
        tx.batch_execute(&statement::truncate(table)).await?;

        let mut written = 0u64;
        for chunk in rows.chunks(self.rows_per_statement(schema.len())) {
            let sql = statement::insert_rows(table, schema, chunk.len());
            let mut params: Vec<Param> = Vec::with_capacity(chunk.len() * schema.len());
            for row in chunk {
                for column in schema.columns() {
                    let value = row.get(&column.name).unwrap_or(&sync_core::Value::Null);
                    params.push(to_param(&column.name, value, column.column_type)?);
                }
            }

            // Convert to references for execution
            let param_refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();
            written += tx.execute(&sql, &param_refs).await?;
        }

        tx.commit().await?;
        debug!("Loaded {} row(s) into {}", written, table);
        Ok(written)
    }

    async fn merge(&self, plan: &MergePlan) -> Result<u64, WarehouseError> {
        let client = connect(&self.connection_string).await?;
        let sql = plan.to_sql();
        debug!("Merging {} into {}: {}", plan.staging, plan.destination, sql);
        Ok(client.execute(&sql, &[]).await?)
    }

    async fn truncate(&self, table: &TableRef) -> Result<(), WarehouseError> {
        let client = connect(&self.connection_string).await?;
        client.batch_execute(&statement::truncate(table)).await?;
        Ok(())
    }
}
