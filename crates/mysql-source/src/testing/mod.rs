//! Testing utilities for the MySQL source
//!
//! This module provides Docker container management for extraction tests.

pub mod container;

pub use container::MySqlContainer;
