//! Test doubles for running the pipeline without external services.
//!
//! Pair [`StaticExtractor`] with `warehouse::MemoryWarehouse` and
//! `ledger::MemoryLedgerStore` to drive whole runs in-process.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use sync_core::{ColumnDescriptor, ExtractError, Extractor, Row, RowBatch, Value, Watermark};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct StaticTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, StaticTable>,
    unreachable: HashMap<String, String>,
    extract_calls: Vec<(String, Watermark)>,
}

/// In-memory source database.
///
/// Tables are a catalog (column descriptors) plus rows. `extract` applies
/// the same strict `watermark > since` filter a real source would.
#[derive(Default)]
pub struct StaticExtractor {
    state: Mutex<State>,
}

impl StaticExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a table.
    pub async fn create_table(&self, table: &str, columns: Vec<ColumnDescriptor>) {
        self.state.lock().await.tables.insert(
            table.to_string(),
            StaticTable {
                columns,
                rows: Vec::new(),
            },
        );
    }

    /// Append a column to the catalog of `table`.
    pub async fn add_column(&self, table: &str, column: ColumnDescriptor) {
        if let Some(t) = self.state.lock().await.tables.get_mut(table) {
            t.columns.push(column);
        }
    }

    pub async fn insert_rows(&self, table: &str, rows: Vec<Row>) {
        if let Some(t) = self.state.lock().await.tables.get_mut(table) {
            t.rows.extend(rows);
        }
    }

    /// Make every call for `table` fail with a connection error.
    pub async fn make_unreachable(&self, table: &str, message: &str) {
        self.state
            .lock()
            .await
            .unreachable
            .insert(table.to_string(), message.to_string());
    }

    pub async fn make_reachable(&self, table: &str) {
        self.state.lock().await.unreachable.remove(table);
    }

    /// `(table, since)` of every extract call so far.
    pub async fn extract_calls(&self) -> Vec<(String, Watermark)> {
        self.state.lock().await.extract_calls.clone()
    }
}

impl State {
    fn table(&self, table: &str) -> Result<&StaticTable, ExtractError> {
        if let Some(message) = self.unreachable.get(table) {
            return Err(ExtractError::Connection(message.clone()));
        }
        self.tables
            .get(table)
            .ok_or_else(|| ExtractError::TableNotFound(table.to_string()))
    }
}

#[async_trait]
impl Extractor for StaticExtractor {
    fn source_type(&self) -> &'static str {
        "static"
    }

    async fn describe_schema(&self, table: &str) -> Result<Vec<ColumnDescriptor>, ExtractError> {
        Ok(self.state.lock().await.table(table)?.columns.clone())
    }

    async fn extract(
        &self,
        table: &str,
        watermark_column: &str,
        since: Watermark,
    ) -> Result<RowBatch, ExtractError> {
        let mut state = self.state.lock().await;
        state.extract_calls.push((table.to_string(), since));
        let t = state.table(table)?;

        if !t.columns.iter().any(|c| c.name == watermark_column) {
            return Err(ExtractError::Query(format!(
                "Unknown column '{watermark_column}' in 'where clause'"
            )));
        }
        let since = Value::Timestamp(since);
        let rows: Vec<Row> = t
            .rows
            .iter()
            .filter(|row| {
                row.get(watermark_column)
                    .and_then(|wm| wm.compare(&since))
                    == Some(Ordering::Greater)
            })
            .cloned()
            .collect();
        let columns = t.columns.iter().map(|c| c.name.clone()).collect();
        Ok(RowBatch::new(columns, rows))
    }
}
