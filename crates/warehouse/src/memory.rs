//! In-memory warehouse for tests and dry runs.
//!
//! Mirrors the PostgreSQL backend's semantics: nullable columns, full
//! replace on load, watermark-guarded merge. Failures can be injected per
//! operation to exercise the orchestrator's error paths.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sync_core::{DestinationColumn, DestinationSchema, Row, TableRef, Value};
use tokio::sync::Mutex;

use crate::error::WarehouseError;
use crate::statement::MergePlan;
use crate::traits::Warehouse;

/// Warehouse operations, for failure injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    TableExists,
    CreateTable,
    TableSchema,
    AddColumns,
    LoadReplace,
    Merge,
    Truncate,
}

/// Contents of one in-memory table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    pub schema: DestinationSchema,
    pub rows: Vec<Row>,
}

#[derive(Default)]
struct State {
    tables: BTreeMap<TableRef, MemoryTable>,
    failures: HashMap<(Operation, TableRef), String>,
    calls: Vec<(Operation, TableRef)>,
}

/// In-memory [`Warehouse`].
#[derive(Default)]
pub struct MemoryWarehouse {
    state: Mutex<State>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `operation` on `table` fail with `message` until cleared.
    pub async fn fail_on(&self, operation: Operation, table: &TableRef, message: &str) {
        self.state
            .lock()
            .await
            .failures
            .insert((operation, table.clone()), message.to_string());
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    /// Create a table with rows already in it.
    pub async fn seed(&self, table: &TableRef, schema: DestinationSchema, rows: Vec<Row>) {
        self.state
            .lock()
            .await
            .tables
            .insert(table.clone(), MemoryTable { schema, rows });
    }

    /// Snapshot of a table.
    pub async fn table(&self, table: &TableRef) -> Option<MemoryTable> {
        self.state.lock().await.tables.get(table).cloned()
    }

    /// How many times `operation` ran against `table`.
    pub async fn call_count(&self, operation: Operation, table: &TableRef) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|(op, t)| *op == operation && t == table)
            .count()
    }
}

impl State {
    fn enter(&mut self, operation: Operation, table: &TableRef) -> Result<(), WarehouseError> {
        self.calls.push((operation, table.clone()));
        match self.failures.get(&(operation, table.clone())) {
            Some(message) => Err(WarehouseError::Query(message.clone())),
            None => Ok(()),
        }
    }

    fn existing(&mut self, table: &TableRef) -> Result<&mut MemoryTable, WarehouseError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| WarehouseError::TableNotFound(table.to_string()))
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    fn warehouse_type(&self) -> &'static str {
        "memory"
    }

    async fn table_exists(&self, table: &TableRef) -> Result<bool, WarehouseError> {
        let mut state = self.state.lock().await;
        state.enter(Operation::TableExists, table)?;
        Ok(state.tables.contains_key(table))
    }

    async fn create_table(
        &self,
        table: &TableRef,
        schema: &DestinationSchema,
    ) -> Result<(), WarehouseError> {
        let mut state = self.state.lock().await;
        state.enter(Operation::CreateTable, table)?;
        state
            .tables
            .entry(table.clone())
            .or_insert_with(|| MemoryTable {
                schema: schema.clone(),
                rows: Vec::new(),
            });
        Ok(())
    }

    async fn table_schema(&self, table: &TableRef) -> Result<DestinationSchema, WarehouseError> {
        let mut state = self.state.lock().await;
        state.enter(Operation::TableSchema, table)?;
        Ok(state.existing(table)?.schema.clone())
    }

    async fn add_columns(
        &self,
        table: &TableRef,
        columns: &[DestinationColumn],
    ) -> Result<(), WarehouseError> {
        let mut state = self.state.lock().await;
        state.enter(Operation::AddColumns, table)?;
        let existing = state.existing(table)?;
        for column in columns {
            existing.schema.push(column.clone());
        }
        Ok(())
    }

    async fn load_replace(
        &self,
        table: &TableRef,
        schema: &DestinationSchema,
        rows: &[Row],
    ) -> Result<u64, WarehouseError> {
        let mut state = self.state.lock().await;
        state.enter(Operation::LoadReplace, table)?;
        let existing = state.existing(table)?;

        let mut loaded = Vec::with_capacity(rows.len());
        for row in rows {
            let mut projected = Row::new();
            for column in schema.columns() {
                if !existing.schema.contains(&column.name) {
                    return Err(WarehouseError::Query(format!(
                        "column \"{}\" of relation {} does not exist",
                        column.name, table
                    )));
                }
                let value = row.get(&column.name).cloned().unwrap_or(Value::Null);
                projected.insert(column.name.clone(), value);
            }
            loaded.push(projected);
        }
        existing.rows = loaded;
        Ok(rows.len() as u64)
    }

    async fn merge(&self, plan: &MergePlan) -> Result<u64, WarehouseError> {
        let mut state = self.state.lock().await;
        state.enter(Operation::Merge, &plan.destination)?;
        let staged = state.existing(&plan.staging)?.rows.clone();
        let destination = state.existing(&plan.destination)?;

        let mut affected = 0;
        for incoming in staged {
            let key = incoming.get(&plan.primary_key).cloned().unwrap_or(Value::Null);
            let matched = destination.rows.iter_mut().find(|row| {
                row.get(&plan.primary_key)
                    .and_then(|k| k.compare(&key))
                    == Some(Ordering::Equal)
            });

            match matched {
                Some(row) => {
                    let current = row.get(&plan.watermark_column).cloned().unwrap_or(Value::Null);
                    let newer = incoming
                        .get(&plan.watermark_column)
                        .and_then(|wm| current.compare(wm))
                        == Some(Ordering::Less);
                    if newer {
                        for column in plan.update_columns() {
                            let value = incoming.get(column).cloned().unwrap_or(Value::Null);
                            row.insert(column, value);
                        }
                        affected += 1;
                    }
                }
                None => {
                    let mut inserted = Row::new();
                    for column in &plan.columns {
                        let value = incoming.get(column).cloned().unwrap_or(Value::Null);
                        inserted.insert(column.clone(), value);
                    }
                    destination.rows.push(inserted);
                    affected += 1;
                }
            }
        }
        Ok(affected)
    }

    async fn truncate(&self, table: &TableRef) -> Result<(), WarehouseError> {
        let mut state = self.state.lock().await;
        state.enter(Operation::Truncate, table)?;
        state.existing(table)?.rows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use sync_core::DestinationType;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn schema() -> DestinationSchema {
        DestinationSchema::from_columns([
            DestinationColumn::new("id", DestinationType::Int64),
            DestinationColumn::new("amount", DestinationType::Int64),
            DestinationColumn::new("updated_at", DestinationType::Timestamp),
        ])
    }

    fn plan(destination: &TableRef, staging: &TableRef) -> MergePlan {
        MergePlan::new(
            destination.clone(),
            staging.clone(),
            "id",
            "updated_at",
            vec!["id".into(), "amount".into(), "updated_at".into()],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_merge_is_watermark_guarded() {
        let warehouse = MemoryWarehouse::new();
        let destination = TableRef::new("ds", "orders");
        let staging = TableRef::new("ds", "orders_staging");
        warehouse
            .seed(
                &destination,
                schema(),
                vec![
                    Row::new().with("id", 7).with("amount", 100).with("updated_at", ts("2024-03-01 10:00:00")),
                    Row::new().with("id", 8).with("amount", 5).with("updated_at", ts("2024-03-01 10:00:00")),
                ],
            )
            .await;
        warehouse.create_table(&staging, &schema()).await.unwrap();
        warehouse
            .load_replace(
                &staging,
                &schema(),
                &[
                    // Same watermark: stale duplicate
                    Row::new().with("id", 7).with("amount", 999).with("updated_at", ts("2024-03-01 10:00:00")),
                    // Newer
                    Row::new().with("id", 8).with("amount", 6).with("updated_at", ts("2024-03-02 10:00:00")),
                    // New key
                    Row::new().with("id", 9).with("amount", 1).with("updated_at", ts("2024-03-02 10:00:00")),
                ],
            )
            .await
            .unwrap();

        assert_eq!(warehouse.merge(&plan(&destination, &staging)).await.unwrap(), 2);
        // Re-applying the same staging contents changes nothing
        assert_eq!(warehouse.merge(&plan(&destination, &staging)).await.unwrap(), 0);

        let rows = warehouse.table(&destination).await.unwrap().rows;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("amount"), Some(&Value::Int(100)));
        assert_eq!(rows[1].get("amount"), Some(&Value::Int(6)));
        assert_eq!(rows[2].get("id"), Some(&Value::Int(9)));
    }

    #[tokio::test]
    async fn test_load_replace_discards_previous_contents() {
        let warehouse = MemoryWarehouse::new();
        let staging = TableRef::new("ds", "orders_staging");
        warehouse
            .seed(
                &staging,
                schema(),
                vec![Row::new().with("id", 1).with("updated_at", ts("2024-01-01 00:00:00"))],
            )
            .await;
        warehouse
            .load_replace(
                &staging,
                &schema(),
                &[Row::new().with("id", 2).with("updated_at", ts("2024-01-02 00:00:00"))],
            )
            .await
            .unwrap();

        let rows = warehouse.table(&staging).await.unwrap().rows;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(2)));
        assert_eq!(rows[0].get("amount"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let warehouse = MemoryWarehouse::new();
        let table = TableRef::new("ds", "orders");
        warehouse
            .fail_on(Operation::CreateTable, &table, "quota exceeded")
            .await;
        let err = warehouse.create_table(&table, &schema()).await.unwrap_err();
        assert_eq!(err.to_string(), "Query failed: quota exceeded");
        assert!(!warehouse.table_exists(&table).await.unwrap());
        assert_eq!(warehouse.call_count(Operation::CreateTable, &table).await, 1);
    }
}
