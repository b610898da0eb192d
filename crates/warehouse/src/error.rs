//! Error types for warehouse operations.

use sync_core::DestinationType;
use thiserror::Error;

/// Errors that can occur while talking to the destination warehouse.
#[derive(Error, Debug)]
pub enum WarehouseError {
    /// The warehouse could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A statement was rejected or failed while executing.
    #[error("Query failed: {0}")]
    Query(String),

    /// The referenced table does not exist.
    #[error("Table {0} does not exist")]
    TableNotFound(String),

    /// A row value does not match its column type.
    #[error("Column '{column}' expects {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: DestinationType,
        actual: String,
    },

    /// A merge plan that cannot be executed.
    #[error("Invalid merge plan: {0}")]
    InvalidMerge(String),
}

impl From<tokio_postgres::Error> for WarehouseError {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.as_db_error() {
            Some(db) => WarehouseError::Query(format!("{}: {}", db.code().code(), db.message())),
            None if e.is_closed() => WarehouseError::Connection(e.to_string()),
            None => WarehouseError::Query(e.to_string()),
        }
    }
}
