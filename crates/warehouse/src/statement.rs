//! SQL statement builders.
//!
//! Every statement is rendered from typed descriptors. Identifiers are
//! quoted here and nowhere else; values always travel as bind parameters.

use sync_core::{DestinationColumn, DestinationSchema, TableRef};

use crate::ddl::{PostgreSQLDdl, ToDdl};
use crate::error::WarehouseError;

/// Quote a PostgreSQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"dataset"."table"`
pub fn qualified(table: &TableRef) -> String {
    format!("{}.{}", quote_ident(&table.dataset), quote_ident(&table.table))
}

pub fn create_schema(dataset: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(dataset))
}

/// `CREATE TABLE IF NOT EXISTS` with every column nullable.
pub fn create_table(table: &TableRef, schema: &DestinationSchema) -> String {
    let columns: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), PostgreSQLDdl.to_ddl(c.column_type)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified(table),
        columns.join(", ")
    )
}

/// One `ALTER TABLE` carrying all new columns.
pub fn add_columns(table: &TableRef, columns: &[DestinationColumn]) -> String {
    let clauses: Vec<String> = columns
        .iter()
        .map(|c| {
            format!(
                "ADD COLUMN IF NOT EXISTS {} {}",
                quote_ident(&c.name),
                PostgreSQLDdl.to_ddl(c.column_type)
            )
        })
        .collect();
    format!("ALTER TABLE {} {}", qualified(table), clauses.join(", "))
}

pub fn truncate(table: &TableRef) -> String {
    format!("TRUNCATE TABLE {}", qualified(table))
}

/// Multi-row `INSERT` with `row_count` groups of typed placeholders.
///
/// Placeholders carry an explicit cast so parameters bind by destination
/// type regardless of how the live column was declared.
pub fn insert_rows(table: &TableRef, schema: &DestinationSchema, row_count: usize) -> String {
    let names: Vec<String> = schema.names().map(quote_ident).collect();
    let mut groups = Vec::with_capacity(row_count);
    let mut param_idx = 1;
    for _ in 0..row_count {
        let placeholders: Vec<String> = schema
            .columns()
            .iter()
            .map(|c| {
                let p = format!("${param_idx}::{}", PostgreSQLDdl.to_ddl(c.column_type));
                param_idx += 1;
                p
            })
            .collect();
        groups.push(format!("({})", placeholders.join(", ")));
    }
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified(table),
        names.join(", "),
        groups.join(", ")
    )
}

/// A keyed, watermark-guarded upsert from staging into the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub destination: TableRef,
    pub staging: TableRef,
    pub primary_key: String,
    pub watermark_column: String,
    /// Columns copied from staging, including key and watermark
    pub columns: Vec<String>,
}

impl MergePlan {
    /// Build a plan, checking that key and watermark are distinct columns
    /// that are part of the copied set.
    pub fn new(
        destination: TableRef,
        staging: TableRef,
        primary_key: impl Into<String>,
        watermark_column: impl Into<String>,
        columns: Vec<String>,
    ) -> Result<Self, WarehouseError> {
        let plan = Self {
            destination,
            staging,
            primary_key: primary_key.into(),
            watermark_column: watermark_column.into(),
            columns,
        };
        if plan.primary_key == plan.watermark_column {
            return Err(WarehouseError::InvalidMerge(format!(
                "primary key and watermark are the same column '{}'",
                plan.primary_key
            )));
        }
        for required in [&plan.primary_key, &plan.watermark_column] {
            if !plan.columns.contains(required) {
                return Err(WarehouseError::InvalidMerge(format!(
                    "column '{required}' is not among the merged columns"
                )));
            }
        }
        Ok(plan)
    }

    /// Columns updated on a match: everything except the key.
    pub fn update_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(move |c| *c != self.primary_key)
    }

    /// Render as a PostgreSQL 15+ `MERGE`.
    pub fn to_sql(&self) -> String {
        let key = quote_ident(&self.primary_key);
        let wm = quote_ident(&self.watermark_column);
        let updates: Vec<String> = self
            .update_columns()
            .map(|c| format!("{0} = s.{0}", quote_ident(c)))
            .collect();
        let names: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
        let values: Vec<String> = names.iter().map(|c| format!("s.{c}")).collect();

        format!(
            "MERGE INTO {dst} AS t USING {stg} AS s ON t.{key} = s.{key} \
             WHEN MATCHED AND t.{wm} < s.{wm} THEN UPDATE SET {updates} \
             WHEN NOT MATCHED THEN INSERT ({names}) VALUES ({values})",
            dst = qualified(&self.destination),
            stg = qualified(&self.staging),
            updates = updates.join(", "),
            names = names.join(", "),
            values = values.join(", "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::DestinationType;

    fn orders() -> TableRef {
        TableRef::new("analytics", "orders")
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("orders"), "\"orders\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(
            qualified(&TableRef::new("my ds", "x\"; DROP TABLE y; --")),
            "\"my ds\".\"x\"\"; DROP TABLE y; --\""
        );
    }

    #[test]
    fn test_create_table() {
        let schema = DestinationSchema::from_columns([
            DestinationColumn::new("id", DestinationType::Int64),
            DestinationColumn::new("updated_at", DestinationType::Timestamp),
        ]);
        assert_eq!(
            create_table(&orders(), &schema),
            "CREATE TABLE IF NOT EXISTS \"analytics\".\"orders\" (\"id\" BIGINT, \"updated_at\" TIMESTAMP)"
        );
    }

    #[test]
    fn test_add_columns_is_single_statement() {
        let sql = add_columns(
            &orders(),
            &[
                DestinationColumn::new("referral_code", DestinationType::String),
                DestinationColumn::new("score", DestinationType::Float64),
            ],
        );
        assert_eq!(
            sql,
            "ALTER TABLE \"analytics\".\"orders\" \
             ADD COLUMN IF NOT EXISTS \"referral_code\" TEXT, \
             ADD COLUMN IF NOT EXISTS \"score\" DOUBLE PRECISION"
        );
    }

    #[test]
    fn test_insert_rows_placeholders() {
        let schema = DestinationSchema::from_columns([
            DestinationColumn::new("id", DestinationType::Int64),
            DestinationColumn::new("doc", DestinationType::Json),
        ]);
        assert_eq!(
            insert_rows(&orders(), &schema, 2),
            "INSERT INTO \"analytics\".\"orders\" (\"id\", \"doc\") \
             VALUES ($1::BIGINT, $2::JSONB), ($3::BIGINT, $4::JSONB)"
        );
    }

    #[test]
    fn test_merge_sql() {
        let plan = MergePlan::new(
            orders(),
            TableRef::new("staging", "orders_staging"),
            "id",
            "updated_at",
            vec!["id".into(), "amount".into(), "updated_at".into()],
        )
        .unwrap();
        assert_eq!(
            plan.to_sql(),
            "MERGE INTO \"analytics\".\"orders\" AS t \
             USING \"staging\".\"orders_staging\" AS s \
             ON t.\"id\" = s.\"id\" \
             WHEN MATCHED AND t.\"updated_at\" < s.\"updated_at\" \
             THEN UPDATE SET \"amount\" = s.\"amount\", \"updated_at\" = s.\"updated_at\" \
             WHEN NOT MATCHED THEN INSERT (\"id\", \"amount\", \"updated_at\") \
             VALUES (s.\"id\", s.\"amount\", s.\"updated_at\")"
        );
    }

    #[test]
    fn test_merge_plan_requires_key_and_watermark() {
        let err = MergePlan::new(
            orders(),
            TableRef::new("staging", "orders_staging"),
            "id",
            "updated_at",
            vec!["id".into(), "amount".into()],
        )
        .unwrap_err();
        assert!(matches!(err, WarehouseError::InvalidMerge(_)));

        let err = MergePlan::new(
            orders(),
            TableRef::new("staging", "orders_staging"),
            "id",
            "id",
            vec!["id".into()],
        )
        .unwrap_err();
        assert!(matches!(err, WarehouseError::InvalidMerge(_)));
    }
}
