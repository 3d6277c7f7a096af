//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pools for the primary and the reader
//! - Query execution against pools and open transactions
//! - Type mappings
//! - Database dispatch macros for reducing code duplication

pub mod executor;
#[macro_use]
pub mod macros;
pub mod params;
pub mod pool;
pub mod transaction;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::DbPool;
pub use transaction::DbTransaction;
