//! `Extractor` implementation for MySQL
//!
//! Each call runs inside its own session: optional tunnel, pool, one
//! connection. The session is torn down whether the query succeeded or not.

use std::num::TryFromIntError;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Timelike};
use mysql_async::prelude::*;
use mysql_async::Pool;
use mysql_types::{column_names, row_to_values};
use sync_core::{ColumnDescriptor, ExtractError, Extractor, RowBatch, Watermark};
use tracing::{debug, info, warn};

use crate::client::{classify_error, new_mysql_pool, quote_identifier};
use crate::tunnel::{SshTunnel, DEFAULT_READY_TIMEOUT};
use crate::SourceOpts;

const DESCRIBE_QUERY: &str = "
    SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION";

/// MySQL source reached directly or through an SSH tunnel
pub struct MySqlExtractor {
    opts: SourceOpts,
    tunnel_timeout: Duration,
}

/// Transport resources scoped to one extractor call
struct Session {
    pool: Pool,
    tunnel: Option<SshTunnel>,
}

impl Session {
    async fn close(self) {
        if let Err(e) = self.pool.disconnect().await {
            debug!("Failed to disconnect MySQL pool: {}", e);
        }
        if let Some(tunnel) = self.tunnel {
            tunnel.close().await;
        }
    }
}

impl MySqlExtractor {
    pub fn new(opts: SourceOpts) -> Self {
        Self {
            opts,
            tunnel_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    /// Override how long to wait for the SSH forward.
    pub fn with_tunnel_timeout(mut self, timeout: Duration) -> Self {
        self.tunnel_timeout = timeout;
        self
    }

    async fn open_session(&self) -> Result<Session, ExtractError> {
        match &self.opts.tunnel {
            Some(tunnel_opts) => {
                let tunnel =
                    SshTunnel::open(tunnel_opts, self.opts.port, self.tunnel_timeout).await?;
                let pool = new_mysql_pool(&self.opts, "127.0.0.1", tunnel.local_port());
                Ok(Session {
                    pool,
                    tunnel: Some(tunnel),
                })
            }
            None => Ok(Session {
                pool: new_mysql_pool(&self.opts, &self.opts.host, self.opts.port),
                tunnel: None,
            }),
        }
    }

    async fn query_schema(
        &self,
        pool: &Pool,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>, ExtractError> {
        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| classify_error(e, table))?;

        let rows: Vec<(String, String, String)> = conn
            .exec(DESCRIBE_QUERY, (self.opts.database.as_str(), table))
            .await
            .map_err(|e| classify_error(e, table))?;

        if rows.is_empty() {
            return Err(ExtractError::TableNotFound(table.to_string()));
        }

        Ok(rows
            .into_iter()
            .map(|(name, column_type, nullable)| {
                ColumnDescriptor::new(name, column_type, nullable.eq_ignore_ascii_case("YES"))
            })
            .collect())
    }

    async fn query_rows(
        &self,
        pool: &Pool,
        table: &str,
        watermark_column: &str,
        since: Watermark,
    ) -> Result<RowBatch, ExtractError> {
        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| classify_error(e, table))?;

        let query = format!(
            "SELECT * FROM {} WHERE {} > ?",
            quote_identifier(table),
            quote_identifier(watermark_column)
        );
        let rows: Vec<mysql_async::Row> = conn
            .exec(query, (watermark_param(since)?,))
            .await
            .map_err(|e| classify_error(e, table))?;

        let columns = rows.first().map(column_names).unwrap_or_default();
        let values = rows.into_iter().map(row_to_values).collect();

        Ok(RowBatch::new(columns, values))
    }
}

#[async_trait]
impl Extractor for MySqlExtractor {
    fn source_type(&self) -> &'static str {
        "mysql"
    }

    async fn describe_schema(&self, table: &str) -> Result<Vec<ColumnDescriptor>, ExtractError> {
        debug!("Describing {} on {}", table, self.opts.display_uri());
        let session = self.open_session().await?;
        let result = self.query_schema(&session.pool, table).await;
        session.close().await;
        result
    }

    async fn extract(
        &self,
        table: &str,
        watermark_column: &str,
        since: Watermark,
    ) -> Result<RowBatch, ExtractError> {
        let session = self.open_session().await?;
        let result = self
            .query_rows(&session.pool, table, watermark_column, since)
            .await;
        session.close().await;

        match &result {
            Ok(batch) => info!(
                "Extracted {} row(s) from {} where {} > {}",
                batch.len(),
                table,
                watermark_column,
                since
            ),
            Err(e) => warn!("Extraction from {} failed: {}", table, e),
        }
        result
    }
}

/// `since` as a MySQL DATETIME parameter.
fn watermark_param(since: Watermark) -> Result<mysql_async::Value, ExtractError> {
    let out_of_range = |_: TryFromIntError| {
        ExtractError::Query(format!(
            "Watermark {since} is outside the MySQL DATETIME range"
        ))
    };
    Ok(mysql_async::Value::Date(
        u16::try_from(since.year()).map_err(out_of_range)?,
        u8::try_from(since.month()).map_err(out_of_range)?,
        u8::try_from(since.day()).map_err(out_of_range)?,
        u8::try_from(since.hour()).map_err(out_of_range)?,
        u8::try_from(since.minute()).map_err(out_of_range)?,
        u8::try_from(since.second()).map_err(out_of_range)?,
        since.nanosecond() / 1000, // MySQL uses microseconds
    ))
}
