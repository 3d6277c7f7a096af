//! DB Read Router Library
//!
//! Routes read queries between a primary database and a read replica
//! (SQLite, PostgreSQL, MySQL). Reads inside an open primary transaction, or
//! inside a `force_primary` scope, go to the primary.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routing;

pub use config::{Config, RouterConfig};
pub use error::{DbError, DbResult};
pub use routing::{
    ReadRouter, ReaderState, Route, RoutedTransaction, RoutingContext, RoutingOverride,
};
