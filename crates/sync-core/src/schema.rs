//! Schema definitions shared by every stage of a table sync.
//!
//! ## Type Hierarchy
//!
//! - `TableSyncSpec` - one configured table (source, destination, key, watermark)
//! - `ColumnDescriptor` - a source column as reported by catalog introspection
//! - `DestinationColumn` - a destination column with its translated type
//! - `DestinationSchema` - ordered, name-unique set of destination columns
//! - `TableRef` - a dataset-qualified warehouse table name

use crate::types::DestinationType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default primary key column name.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Default watermark column name.
pub const DEFAULT_WATERMARK_COLUMN: &str = "updated_at";

// ============================================================================
// Table specs
// ============================================================================

/// Configuration unit for one synced table.
///
/// Immutable once loaded. No two specs of one configuration share a
/// destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSyncSpec {
    /// Table name in the source database
    pub source_table: String,

    /// Table name in the destination dataset
    pub destination_table: String,

    /// Column used to match staging rows to destination rows
    pub primary_key: String,

    /// Monotonically increasing column that decides what is "new"
    pub watermark_column: String,
}

impl TableSyncSpec {
    /// Create a table mapping with the default key (`id`) and watermark (`updated_at`) columns.
    pub fn new(source_table: impl Into<String>, destination_table: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            destination_table: destination_table.into(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            watermark_column: DEFAULT_WATERMARK_COLUMN.to_string(),
        }
    }

    /// Override the primary key column.
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Override the watermark column.
    pub fn with_watermark_column(mut self, watermark_column: impl Into<String>) -> Self {
        self.watermark_column = watermark_column.into();
        self
    }
}

// ============================================================================
// Source columns
// ============================================================================

/// A source column as reported by catalog introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,

    /// Full source type string (e.g. `int(11) unsigned`, `varchar(255)`)
    pub source_type: String,

    /// Whether the source declares the column nullable
    pub nullable: bool,
}

impl ColumnDescriptor {
    /// Create a new column descriptor.
    pub fn new(name: impl Into<String>, source_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            nullable,
        }
    }
}

// ============================================================================
// Destination columns
// ============================================================================

/// A destination column. Destination columns are always nullable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationColumn {
    /// Column name
    pub name: String,

    /// Column type
    #[serde(rename = "type")]
    pub column_type: DestinationType,
}

impl DestinationColumn {
    /// Create a new destination column.
    pub fn new(name: impl Into<String>, column_type: DestinationType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered set of destination columns, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationSchema {
    columns: Vec<DestinationColumn>,
}

impl DestinationSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from columns. Later duplicates of a name are ignored.
    pub fn from_columns(columns: impl IntoIterator<Item = DestinationColumn>) -> Self {
        let mut schema = Self::new();
        for column in columns {
            schema.push(column);
        }
        schema
    }

    /// Append a column. Returns `false` (and leaves the schema untouched)
    /// when a column of that name already exists.
    pub fn push(&mut self, column: DestinationColumn) -> bool {
        if self.contains(&column.name) {
            return false;
        }
        self.columns.push(column);
        true
    }

    /// Whether a column with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Look up a column type by name.
    pub fn get(&self, name: &str) -> Option<DestinationType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
    }

    /// Columns in order.
    pub fn columns(&self) -> &[DestinationColumn] {
        &self.columns
    }

    /// Column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns of `incoming` whose names are absent from this schema, in
    /// `incoming` order.
    pub fn missing_from(&self, incoming: &DestinationSchema) -> Vec<DestinationColumn> {
        incoming
            .columns
            .iter()
            .filter(|c| !self.contains(&c.name))
            .cloned()
            .collect()
    }
}

// ============================================================================
// Table references
// ============================================================================

/// Dataset-qualified warehouse table name.
///
/// `Display` renders the unquoted `dataset.table` form for logs; SQL
/// rendering quotes each part separately (see the warehouse crate).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    /// Dataset (schema) name
    pub dataset: String,

    /// Table name
    pub table: String,
}

impl TableRef {
    /// Create a new table reference.
    pub fn new(dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec = TableSyncSpec::new("orders", "orders_dst");
        assert_eq!(spec.primary_key, "id");
        assert_eq!(spec.watermark_column, "updated_at");

        let spec = spec
            .with_primary_key("order_id")
            .with_watermark_column("modified");
        assert_eq!(spec.primary_key, "order_id");
        assert_eq!(spec.watermark_column, "modified");
    }

    #[test]
    fn test_schema_names_are_unique() {
        let mut schema = DestinationSchema::new();
        assert!(schema.push(DestinationColumn::new("id", DestinationType::Int64)));
        assert!(!schema.push(DestinationColumn::new("id", DestinationType::String)));
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.get("id"), Some(DestinationType::Int64));
    }

    #[test]
    fn test_missing_from_keeps_incoming_order() {
        let live = DestinationSchema::from_columns([
            DestinationColumn::new("id", DestinationType::Int64),
            DestinationColumn::new("amount", DestinationType::Numeric),
        ]);
        let incoming = DestinationSchema::from_columns([
            DestinationColumn::new("referral_code", DestinationType::String),
            DestinationColumn::new("id", DestinationType::Int64),
            DestinationColumn::new("channel", DestinationType::String),
        ]);

        let missing: Vec<String> = live
            .missing_from(&incoming)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(missing, vec!["referral_code", "channel"]);
    }

    #[test]
    fn test_table_ref_display() {
        assert_eq!(
            TableRef::new("analytics", "orders").to_string(),
            "analytics.orders"
        );
    }
}
