//! Data models shared by the router, the executor and the CLI.

pub mod connection;
pub mod query;

pub use connection::{DatabaseRole, DatabaseType};
pub use query::{
    ColumnMetadata, DEFAULT_QUERY_TIMEOUT_SECS, MAX_QUERY_TIMEOUT_SECS, QueryParam, QueryRequest,
    QueryResult, WriteResult,
};
