//! Ledger stored as a table in the destination warehouse.

use async_trait::async_trait;
use sync_core::TableRef;
use tokio::sync::OnceCell;
use tokio_postgres::Row;
use tracing::info;
use warehouse::postgresql::connect;
use warehouse::statement::{create_schema, qualified};

use crate::entry::LedgerEntry;
use crate::store::{LedgerError, LedgerStore};

/// Default ledger table name.
pub const DEFAULT_LEDGER_TABLE: &str = "sync_ledger";

const COLUMNS: &str =
    "table_name, last_run_time, last_success_watermark, status, row_count, column_count, remark";

/// PostgreSQL implementation of LedgerStore trait.
///
/// The table is created on first use, after checking the catalog for it.
/// Each call opens its own connection.
pub struct PostgresLedgerStore {
    connection_string: String,
    table: TableRef,
    ready: OnceCell<()>,
}

impl PostgresLedgerStore {
    pub fn new(connection_string: impl Into<String>, table: TableRef) -> Self {
        Self {
            connection_string: connection_string.into(),
            table,
            ready: OnceCell::new(),
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    async fn client(&self) -> Result<tokio_postgres::Client, LedgerError> {
        let client = connect(&self.connection_string).await?;
        self.ready
            .get_or_try_init(|| async {
                let exists = client
                    .query_opt(
                        "SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2",
                        &[&self.table.dataset, &self.table.table],
                    )
                    .await?
                    .is_some();
                if !exists {
                    client.batch_execute(&create_schema(&self.table.dataset)).await?;
                    client.batch_execute(&create_table_sql(&self.table)).await?;
                    info!("Created ledger table {}", self.table);
                }
                Ok::<_, LedgerError>(())
            })
            .await?;
        Ok(client)
    }
}

fn create_table_sql(table: &TableRef) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         table_name TEXT PRIMARY KEY, \
         last_run_time TIMESTAMP NOT NULL, \
         last_success_watermark TIMESTAMP, \
         status TEXT NOT NULL, \
         row_count BIGINT NOT NULL, \
         column_count BIGINT NOT NULL, \
         remark TEXT NOT NULL)",
        qualified(table)
    )
}

/// Single-statement upsert. GREATEST ignores NULL arguments, so a failed
/// run keeps the stored watermark and a successful one never lowers it.
fn upsert_sql(table: &TableRef) -> String {
    let target = qualified(table);
    format!(
        "INSERT INTO {target} AS l ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (table_name) DO UPDATE SET \
         last_run_time = EXCLUDED.last_run_time, \
         last_success_watermark = GREATEST(l.last_success_watermark, EXCLUDED.last_success_watermark), \
         status = EXCLUDED.status, \
         row_count = EXCLUDED.row_count, \
         column_count = EXCLUDED.column_count, \
         remark = EXCLUDED.remark"
    )
}

fn entry_from_row(row: &Row) -> Result<LedgerEntry, LedgerError> {
    let status: String = row.try_get(3)?;
    let row_count: i64 = row.try_get(4)?;
    let column_count: i64 = row.try_get(5)?;
    Ok(LedgerEntry {
        table_name: row.try_get(0)?,
        last_run_time: row.try_get(1)?,
        last_success_watermark: row.try_get(2)?,
        status: status.parse()?,
        row_count: row_count.max(0) as u64,
        column_count: column_count.max(0) as u64,
        remark: row.try_get(6)?,
    })
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    fn backend(&self) -> &'static str {
        "postgresql"
    }

    async fn read(&self, table_name: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE table_name = $1",
            qualified(&self.table)
        );
        match client.query_opt(&sql, &[&table_name]).await? {
            Some(row) => Ok(Some(entry_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let client = self.client().await?;
        let row_count = entry.row_count as i64;
        let column_count = entry.column_count as i64;
        client
            .execute(
                &upsert_sql(&self.table),
                &[
                    &entry.table_name,
                    &entry.last_run_time,
                    &entry.last_success_watermark,
                    &entry.status.as_str(),
                    &row_count,
                    &column_count,
                    &entry.remark,
                ],
            )
            .await?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {COLUMNS} FROM {} ORDER BY table_name",
            qualified(&self.table)
        );
        client
            .query(&sql, &[])
            .await?
            .iter()
            .map(entry_from_row)
            .collect()
    }
}
