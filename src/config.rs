//! Run configuration.
//!
//! Loaded from YAML, then overridden from the environment for secrets, then
//! validated. Everything downstream reads the resolved [`TableSyncSpec`]s and
//! never the raw document.

use mysql_types::TimezonePolicy;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use sync_core::{TableRef, TableSyncSpec, DEFAULT_PRIMARY_KEY, DEFAULT_WATERMARK_COLUMN};
use warehouse::DEFAULT_BATCH_SIZE;
use warehouse_sync_mysql_source::SourceOpts;

/// Overrides `source.password`.
pub const SOURCE_PASSWORD_ENV: &str = "WAREHOUSE_SYNC_SOURCE_PASSWORD";

/// Overrides `destination.connection_string`.
pub const DESTINATION_URL_ENV: &str = "WAREHOUSE_SYNC_DESTINATION_URL";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error reading config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Well-formed but unusable configuration
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IANA name of the reference timezone timestamps are stored in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    pub source: SourceConfig,

    pub destination: DestinationConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    pub tables: Vec<TableConfig>,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Source connection plus the global watermark default.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(flatten)]
    pub connection: SourceOpts,

    /// Watermark column for tables that do not name one
    #[serde(default = "default_watermark_column")]
    pub watermark_column: String,
}

#[derive(Clone, Deserialize)]
pub struct DestinationConfig {
    /// libpq connection string or URL
    #[serde(default)]
    pub connection_string: String,

    /// Schema holding destination tables
    pub dataset: String,

    /// Schema holding staging tables and the ledger; defaults to `dataset`
    #[serde(default)]
    pub staging_dataset: Option<String>,

    #[serde(default = "default_staging_suffix")]
    pub staging_suffix: String,

    /// Rows per INSERT statement while loading staging
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl std::fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationConfig")
            .field(
                "connection_string",
                &warehouse::postgresql::sanitize_connection_string(&self.connection_string),
            )
            .field("dataset", &self.dataset)
            .field("staging_dataset", &self.staging_dataset)
            .field("staging_suffix", &self.staging_suffix)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

/// Where the ledger is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// A table in the staging dataset of the destination warehouse
    #[default]
    Warehouse,
    /// A JSON document on local disk
    Filesystem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: LedgerBackend,

    /// Ledger table name (warehouse backend)
    #[serde(default = "default_ledger_table")]
    pub table: String,

    /// Ledger directory (filesystem backend)
    #[serde(default = "default_ledger_dir")]
    pub dir: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            table: default_ledger_table(),
            dir: default_ledger_dir(),
        }
    }
}

/// One configured table; unset fields fall back to global defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub source_table: String,
    #[serde(default)]
    pub destination_table: Option<String>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub watermark_column: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// Write the outcome report here as JSON
    #[serde(default)]
    pub json_path: Option<PathBuf>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_watermark_column() -> String {
    DEFAULT_WATERMARK_COLUMN.to_string()
}

fn default_staging_suffix() -> String {
    "_staging".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_ledger_table() -> String {
    ledger::DEFAULT_LEDGER_TABLE.to_string()
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from(".warehouse-sync")
}

impl Config {
    /// Load, apply environment overrides and validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?.with_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document without validating it.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Replace secrets with values from `lookup` where it has them.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(password) = lookup(SOURCE_PASSWORD_ENV) {
            self.source.connection.password = password;
        }
        if let Some(url) = lookup(DESTINATION_URL_ENV) {
            self.destination.connection_string = url;
        }
        self
    }

    /// Check the invariants the rest of the run relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tables.is_empty() {
            return Err(ConfigError::Invalid("no tables configured".to_string()));
        }
        if self.destination.dataset.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "destination.dataset must not be empty".to_string(),
            ));
        }
        if self.destination.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "destination.batch_size must be positive".to_string(),
            ));
        }
        if self.destination.staging_suffix.is_empty()
            && self.staging_dataset() == self.destination.dataset
        {
            return Err(ConfigError::Invalid(
                "staging tables would overwrite destination tables: set staging_suffix or staging_dataset"
                    .to_string(),
            ));
        }
        if self.ledger.backend == LedgerBackend::Warehouse && self.ledger.table.trim().is_empty() {
            return Err(ConfigError::Invalid("ledger.table must not be empty".to_string()));
        }
        self.timezone_policy()?;

        let mut seen = HashSet::new();
        for spec in self.table_specs() {
            if !seen.insert(spec.destination_table.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "destination table '{}' is configured more than once",
                    spec.destination_table
                )));
            }
            if spec.primary_key == spec.watermark_column {
                return Err(ConfigError::Invalid(format!(
                    "table '{}' uses '{}' as both primary key and watermark",
                    spec.source_table, spec.primary_key
                )));
            }
        }
        Ok(())
    }

    /// Resolved table specs in configuration order.
    pub fn table_specs(&self) -> Vec<TableSyncSpec> {
        self.tables
            .iter()
            .map(|t| {
                let destination = t
                    .destination_table
                    .clone()
                    .unwrap_or_else(|| t.source_table.clone());
                TableSyncSpec::new(t.source_table.clone(), destination)
                    .with_primary_key(
                        t.primary_key
                            .clone()
                            .unwrap_or_else(|| DEFAULT_PRIMARY_KEY.to_string()),
                    )
                    .with_watermark_column(
                        t.watermark_column
                            .clone()
                            .unwrap_or_else(|| self.source.watermark_column.clone()),
                    )
            })
            .collect()
    }

    pub fn staging_dataset(&self) -> &str {
        self.destination
            .staging_dataset
            .as_deref()
            .unwrap_or(&self.destination.dataset)
    }

    /// Ledger table reference (warehouse backend).
    pub fn ledger_table(&self) -> TableRef {
        TableRef::new(self.staging_dataset(), self.ledger.table.clone())
    }

    pub fn timezone_policy(&self) -> Result<TimezonePolicy, ConfigError> {
        TimezonePolicy::from_name(&self.timezone).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
