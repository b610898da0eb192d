use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use ledger::{Ledger, MemoryLedgerStore};
use sync_core::{
    ColumnDescriptor, ExtractError, Extractor, Row, RowBatch, TableRef, TableSyncSpec, Watermark,
};
use warehouse::MemoryWarehouse;
use warehouse_sync::testing::StaticExtractor;
use warehouse_sync::{DatasetLayout, SyncContext};

pub const DATASET: &str = "analytics";
pub const STAGING_DATASET: &str = "analytics_staging";

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn order(id: i64, amount: i64, updated_at: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("amount", amount)
        .with("updated_at", ts(updated_at))
}

pub fn order_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", "int(11)", false),
        ColumnDescriptor::new("amount", "bigint(20)", true),
        ColumnDescriptor::new("updated_at", "datetime", false),
    ]
}

pub fn destination(table: &str) -> TableRef {
    TableRef::new(DATASET, table)
}

pub fn staging(table: &str) -> TableRef {
    TableRef::new(STAGING_DATASET, format!("{table}_staging"))
}

pub struct Harness {
    pub source: Arc<StaticExtractor>,
    pub warehouse: Arc<MemoryWarehouse>,
    pub ledger_store: Arc<MemoryLedgerStore>,
    pub ctx: SyncContext,
}

impl Harness {
    pub fn new() -> Self {
        let source = Arc::new(StaticExtractor::new());
        Self::with_extractor(source.clone(), source)
    }

    /// Harness whose context extracts through `extractor` instead of the
    /// static source.
    pub fn with_extractor(source: Arc<StaticExtractor>, extractor: Arc<dyn Extractor>) -> Self {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let ledger_store = Arc::new(MemoryLedgerStore::new());
        let ctx = SyncContext::new(
            extractor,
            warehouse.clone(),
            Ledger::new(ledger_store.clone()),
            DatasetLayout::new(DATASET).with_staging_dataset(STAGING_DATASET),
        );
        Self {
            source,
            warehouse,
            ledger_store,
            ctx,
        }
    }

    /// Source table `orders` with the given rows.
    pub async fn with_orders(self, rows: Vec<Row>) -> Self {
        self.source.create_table("orders", order_columns()).await;
        self.source.insert_rows("orders", rows).await;
        self
    }

    pub async fn watermark(&self, table: &str) -> Watermark {
        self.ctx.ledger.get_watermark(table).await.unwrap()
    }

    pub async fn destination_rows(&self, table: &str) -> Vec<Row> {
        self.warehouse
            .table(&destination(table))
            .await
            .map(|t| t.rows)
            .unwrap_or_default()
    }
}

pub fn orders_spec() -> TableSyncSpec {
    TableSyncSpec::new("orders", "orders")
}

/// Source that always returns one fixed catalog and batch.
pub struct FixedBatch {
    pub columns: Vec<ColumnDescriptor>,
    pub batch: RowBatch,
}

#[async_trait]
impl Extractor for FixedBatch {
    fn source_type(&self) -> &'static str {
        "fixed"
    }

    async fn describe_schema(&self, _table: &str) -> Result<Vec<ColumnDescriptor>, ExtractError> {
        Ok(self.columns.clone())
    }

    async fn extract(
        &self,
        _table: &str,
        _watermark_column: &str,
        _since: Watermark,
    ) -> Result<RowBatch, ExtractError> {
        Ok(self.batch.clone())
    }
}
