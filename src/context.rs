//! Per-run context.
//!
//! Built once per invocation and borrowed by the orchestrator. It owns the
//! collaborators of a run; nothing in the pipeline reaches for globals.

use std::sync::Arc;

use ledger::{FilesystemLedgerStore, Ledger, LedgerStore, PostgresLedgerStore};
use mysql_types::TimezonePolicy;
use sync_core::{Extractor, TableRef, TableSyncSpec};
use warehouse::{PostgresWarehouse, Warehouse};
use warehouse_sync_mysql_source::MySqlExtractor;

use crate::config::{Config, ConfigError, LedgerBackend};

/// Where destination and staging tables live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub dataset: String,
    pub staging_dataset: String,
    pub staging_suffix: String,
}

impl DatasetLayout {
    /// Destination and staging in one dataset, staging suffixed `_staging`.
    pub fn new(dataset: impl Into<String>) -> Self {
        let dataset = dataset.into();
        Self {
            staging_dataset: dataset.clone(),
            dataset,
            staging_suffix: "_staging".to_string(),
        }
    }

    pub fn with_staging_dataset(mut self, staging_dataset: impl Into<String>) -> Self {
        self.staging_dataset = staging_dataset.into();
        self
    }

    pub fn destination(&self, spec: &TableSyncSpec) -> TableRef {
        TableRef::new(self.dataset.clone(), spec.destination_table.clone())
    }

    pub fn staging(&self, spec: &TableSyncSpec) -> TableRef {
        TableRef::new(
            self.staging_dataset.clone(),
            format!("{}{}", spec.destination_table, self.staging_suffix),
        )
    }
}

/// Collaborators of one run.
pub struct SyncContext {
    pub extractor: Arc<dyn Extractor>,
    pub warehouse: Arc<dyn Warehouse>,
    pub ledger: Ledger,
    pub layout: DatasetLayout,
    pub timezone: TimezonePolicy,
}

impl SyncContext {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        warehouse: Arc<dyn Warehouse>,
        ledger: Ledger,
        layout: DatasetLayout,
    ) -> Self {
        Self {
            extractor,
            warehouse,
            ledger,
            layout,
            timezone: TimezonePolicy::utc(),
        }
    }

    pub fn with_timezone(mut self, timezone: TimezonePolicy) -> Self {
        self.timezone = timezone;
        self
    }

    /// Wire the MySQL source, PostgreSQL warehouse and configured ledger.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let extractor = Arc::new(MySqlExtractor::new(config.source.connection.clone()));
        let warehouse = Arc::new(
            PostgresWarehouse::new(config.destination.connection_string.clone())
                .with_batch_size(config.destination.batch_size),
        );
        let store: Arc<dyn LedgerStore> = match config.ledger.backend {
            LedgerBackend::Warehouse => Arc::new(PostgresLedgerStore::new(
                config.destination.connection_string.clone(),
                config.ledger_table(),
            )),
            LedgerBackend::Filesystem => {
                Arc::new(FilesystemLedgerStore::new(config.ledger.dir.clone()))
            }
        };
        let layout = DatasetLayout {
            dataset: config.destination.dataset.clone(),
            staging_dataset: config.staging_dataset().to_string(),
            staging_suffix: config.destination.staging_suffix.clone(),
        };

        Ok(Self::new(extractor, warehouse, Ledger::new(store), layout)
            .with_timezone(config.timezone_policy()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_refs() {
        let layout = DatasetLayout::new("analytics").with_staging_dataset("scratch");
        let spec = TableSyncSpec::new("orders", "fct_orders");
        assert_eq!(layout.destination(&spec), TableRef::new("analytics", "fct_orders"));
        assert_eq!(
            layout.staging(&spec),
            TableRef::new("scratch", "fct_orders_staging")
        );
    }
}
