//! Destination side of warehouse-sync.
//!
//! This crate provides the [`Warehouse`] trait (the destination primitives
//! the sync core needs), two implementations, and the two components built
//! on top of it:
//!
//! - [`TableManager`] - ensures destination/staging tables exist and
//!   reconciles their columns forward-only
//! - [`StagingLoader`] - full-replace staging load and watermark-guarded
//!   merge into the destination
//!
//! # Backends
//!
//! - [`PostgresWarehouse`] - PostgreSQL 15+ (`MERGE`), via tokio-postgres
//! - [`MemoryWarehouse`] - in-process, with failure injection for tests

pub mod ddl;
pub mod error;
pub mod manager;
pub mod memory;
pub mod postgresql;
pub mod staging;
pub mod statement;
pub mod traits;

pub use error::WarehouseError;
pub use manager::{EnsuredTable, TableManager};
pub use memory::{MemoryTable, MemoryWarehouse, Operation};
pub use postgresql::{PostgresWarehouse, DEFAULT_BATCH_SIZE};
pub use staging::{MergeOutcome, StagingLoader};
pub use statement::MergePlan;
pub use traits::Warehouse;
