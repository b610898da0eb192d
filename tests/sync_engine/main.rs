//! Sync engine tests
//!
//! Drive whole runs against in-memory doubles: `StaticExtractor` as the
//! source, `MemoryWarehouse` as the destination and `MemoryLedgerStore` as
//! the ledger. No external services are needed.

mod harness;
mod properties;
mod scenarios;
