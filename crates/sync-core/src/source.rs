//! Source seam: the interface the orchestrator pulls rows through.
//!
//! Source crates implement [`Extractor`]; the orchestrator is generic over it
//! so tests can substitute an in-memory source.

use crate::schema::ColumnDescriptor;
use crate::values::{RowBatch, Watermark};
use async_trait::async_trait;

/// Typed failure of an extraction or introspection call.
///
/// Every transport, authentication and query failure is folded into one of
/// these; nothing escapes an [`Extractor`] as a panic.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The transport (tunnel, socket, pool) could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The source rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The table does not exist in the source catalog.
    #[error("Table '{0}' not found in source catalog")]
    TableNotFound(String),

    /// The query itself failed.
    #[error("Query failed: {0}")]
    Query(String),
}

/// Trait for pulling rows out of the source database.
///
/// Implementations acquire and release their transport within each call;
/// no connection outlives the call that created it.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Get the source database type identifier
    fn source_type(&self) -> &'static str;

    /// Describe the columns of `table` from the source catalog, in ordinal order.
    async fn describe_schema(&self, table: &str) -> Result<Vec<ColumnDescriptor>, ExtractError>;

    /// Pull every row of `table` whose `watermark_column` is strictly greater
    /// than `since`, fully materialized.
    async fn extract(
        &self,
        table: &str,
        watermark_column: &str,
        since: Watermark,
    ) -> Result<RowBatch, ExtractError>;
}
