//! Query execution engine.
//!
//! Runs reads and writes against either a pool or an open transaction with:
//! - Parameterized queries
//! - Optional row limits (enforced via streaming - only fetches needed rows)
//! - Query timeouts
//!
//! # Architecture
//!
//! Database-specific implementations live in the `mysql`, `postgres` and
//! `sqlite` submodules. Each is generic over the sqlx `Executor`, so the same
//! code serves a pool and a transaction's dedicated connection.

use crate::db::pool::DbPool;
use crate::db::transaction::DbTransaction;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{
    DEFAULT_QUERY_TIMEOUT_SECS, MAX_QUERY_TIMEOUT_SECS, QueryParam, QueryRequest, QueryResult,
    WriteResult,
};
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Query executor that handles database query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryExecutor {
    default_timeout_secs: u32,
    default_limit: Option<u32>,
}

impl QueryExecutor {
    pub fn new() -> Self {
        Self {
            default_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            default_limit: None,
        }
    }

    /// Create a new query executor with custom settings.
    ///
    /// The timeout is capped at `MAX_QUERY_TIMEOUT_SECS`. `None` leaves reads unbounded.
    pub fn with_defaults(timeout_secs: u32, row_limit: Option<u32>) -> Self {
        Self {
            default_timeout_secs: timeout_secs.min(MAX_QUERY_TIMEOUT_SECS),
            default_limit: row_limit,
        }
    }

    fn limits(&self, request: &QueryRequest) -> DbResult<(Option<u32>, Duration)> {
        if request.sql.trim().is_empty() {
            return Err(DbError::invalid_input("SQL query cannot be empty"));
        }
        let row_limit = request.effective_limit(self.default_limit);
        let query_timeout = Duration::from_secs(self.default_timeout_secs as u64);
        debug!(
            sql = %request.sql,
            params = request.params.len(),
            limit = ?row_limit,
            timeout_secs = query_timeout.as_secs(),
            "Executing query"
        );
        Ok((row_limit, query_timeout))
    }

    /// Execute a read query on a pool.
    pub async fn execute_query(
        &self,
        pool: &DbPool,
        request: &QueryRequest,
    ) -> DbResult<QueryResult> {
        let start = Instant::now();
        let (row_limit, query_timeout) = self.limits(request)?;
        let (sql, params) = (request.sql.as_str(), request.params.as_slice());

        match pool {
            DbPool::MySql(p) => {
                let rows = mysql::fetch_rows(p, sql, params, row_limit, query_timeout).await?;
                process_rows(rows, row_limit, start, request.decode_binary)
            }
            DbPool::Postgres(p) => {
                let rows = postgres::fetch_rows(p, sql, params, row_limit, query_timeout).await?;
                process_rows(rows, row_limit, start, request.decode_binary)
            }
            DbPool::SQLite(p) => {
                let rows = sqlite::fetch_rows(p, sql, params, row_limit, query_timeout).await?;
                process_rows(rows, row_limit, start, request.decode_binary)
            }
        }
    }

    /// Execute a read query on a transaction's connection.
    ///
    /// The read sees the transaction's own uncommitted writes.
    pub async fn execute_query_in(
        &self,
        tx: &mut DbTransaction<'_>,
        request: &QueryRequest,
    ) -> DbResult<QueryResult> {
        let start = Instant::now();
        let (row_limit, query_timeout) = self.limits(request)?;
        let (sql, params) = (request.sql.as_str(), request.params.as_slice());

        match tx {
            DbTransaction::MySql(tx) => {
                let rows =
                    mysql::fetch_rows(&mut **tx, sql, params, row_limit, query_timeout).await?;
                process_rows(rows, row_limit, start, request.decode_binary)
            }
            DbTransaction::Postgres(tx) => {
                let rows =
                    postgres::fetch_rows(&mut **tx, sql, params, row_limit, query_timeout).await?;
                process_rows(rows, row_limit, start, request.decode_binary)
            }
            DbTransaction::SQLite(tx) => {
                let rows =
                    sqlite::fetch_rows(&mut **tx, sql, params, row_limit, query_timeout).await?;
                process_rows(rows, row_limit, start, request.decode_binary)
            }
        }
    }

    /// Execute a write operation (INSERT, UPDATE, DELETE, DDL) on a pool.
    pub async fn execute_write(
        &self,
        pool: &DbPool,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<WriteResult> {
        let start = Instant::now();
        let query_timeout = self.write_timeout(sql, params);

        let rows_affected = match pool {
            DbPool::MySql(p) => mysql::execute_write(p, sql, params, query_timeout).await?,
            DbPool::Postgres(p) => postgres::execute_write(p, sql, params, query_timeout).await?,
            DbPool::SQLite(p) => sqlite::execute_write(p, sql, params, query_timeout).await?,
        };

        Ok(WriteResult {
            rows_affected,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Execute a write operation on a transaction's connection.
    pub async fn execute_write_in(
        &self,
        tx: &mut DbTransaction<'_>,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<WriteResult> {
        let start = Instant::now();
        let query_timeout = self.write_timeout(sql, params);

        let rows_affected = match tx {
            DbTransaction::MySql(tx) => {
                mysql::execute_write(&mut **tx, sql, params, query_timeout).await?
            }
            DbTransaction::Postgres(tx) => {
                postgres::execute_write(&mut **tx, sql, params, query_timeout).await?
            }
            DbTransaction::SQLite(tx) => {
                sqlite::execute_write(&mut **tx, sql, params, query_timeout).await?
            }
        };

        Ok(WriteResult {
            rows_affected,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn write_timeout(&self, sql: &str, params: &[QueryParam]) -> Duration {
        let query_timeout = Duration::from_secs(self.default_timeout_secs as u64);
        debug!(
            sql = %sql,
            params = params.len(),
            timeout_secs = query_timeout.as_secs(),
            "Executing write operation"
        );
        query_timeout
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Process rows from any database type into a QueryResult.
fn process_rows<R: RowToJson>(
    rows: Vec<R>,
    row_limit: Option<u32>,
    start: Instant,
    decode_binary: bool,
) -> DbResult<QueryResult> {
    let execution_time_ms = start.elapsed().as_millis() as u64;

    let Some(first) = rows.first() else {
        return Ok(QueryResult::empty(execution_time_ms));
    };

    let columns = first.column_metadata();
    let keep = row_limit.map_or(rows.len(), |limit| limit as usize);
    let truncated = rows.len() > keep;

    if truncated {
        warn!(limit = keep, "Query result truncated");
    }

    Ok(QueryResult {
        columns,
        rows: rows
            .iter()
            .take(keep)
            .map(|r| r.to_json_map(decode_binary))
            .collect(),
        truncated,
        execution_time_ms,
    })
}

// =============================================================================
// Common Helper Functions
// =============================================================================

/// Rows to pull from the stream. One extra row tells us whether the result was truncated.
fn rows_to_fetch(row_limit: Option<u32>) -> usize {
    row_limit.map_or(usize::MAX, |limit| limit as usize + 1)
}

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> DbResult<Vec<R>> {
    results
        .into_iter()
        .map(|r| r.map_err(DbError::from))
        .collect()
}

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs() as u32)
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.
// Empty parameter lists run as raw SQL, since some statements (e.g. CREATE
// PROCEDURE) cannot be prepared.

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_params;
    use sqlx::mysql::MySqlRow;
    use sqlx::{Executor, MySql};

    pub async fn fetch_rows<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [QueryParam],
        row_limit: Option<u32>,
        query_timeout: Duration,
    ) -> DbResult<Vec<MySqlRow>>
    where
        E: Executor<'e, Database = MySql> + 'e,
    {
        let fetch_limit = rows_to_fetch(row_limit);
        let rows_future = if params.is_empty() {
            executor.fetch(sql).take(fetch_limit).collect::<Vec<_>>()
        } else {
            bind_mysql_params(sqlx::query(sql), params)
                .fetch(executor)
                .take(fetch_limit)
                .collect::<Vec<_>>()
        };

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn execute_write<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [QueryParam],
        query_timeout: Duration,
    ) -> DbResult<u64>
    where
        E: Executor<'e, Database = MySql> + 'e,
    {
        let result = if params.is_empty() {
            timeout(query_timeout, executor.execute(sql)).await
        } else {
            let query = bind_mysql_params(sqlx::query(sql), params);
            timeout(query_timeout, query.execute(executor)).await
        };

        match result {
            Ok(Ok(r)) => Ok(r.rows_affected()),
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error("write operation", query_timeout)),
        }
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_params;
    use sqlx::postgres::PgRow;
    use sqlx::{Executor, Postgres};

    pub async fn fetch_rows<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [QueryParam],
        row_limit: Option<u32>,
        query_timeout: Duration,
    ) -> DbResult<Vec<PgRow>>
    where
        E: Executor<'e, Database = Postgres> + 'e,
    {
        let fetch_limit = rows_to_fetch(row_limit);
        let rows_future = if params.is_empty() {
            executor.fetch(sql).take(fetch_limit).collect::<Vec<_>>()
        } else {
            bind_postgres_params(sqlx::query(sql), params)
                .fetch(executor)
                .take(fetch_limit)
                .collect::<Vec<_>>()
        };

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn execute_write<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [QueryParam],
        query_timeout: Duration,
    ) -> DbResult<u64>
    where
        E: Executor<'e, Database = Postgres> + 'e,
    {
        let result = if params.is_empty() {
            timeout(query_timeout, executor.execute(sql)).await
        } else {
            let query = bind_postgres_params(sqlx::query(sql), params);
            timeout(query_timeout, query.execute(executor)).await
        };

        match result {
            Ok(Ok(r)) => Ok(r.rows_affected()),
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error("write operation", query_timeout)),
        }
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_params;
    use sqlx::sqlite::SqliteRow;
    use sqlx::{Executor, Sqlite};

    pub async fn fetch_rows<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [QueryParam],
        row_limit: Option<u32>,
        query_timeout: Duration,
    ) -> DbResult<Vec<SqliteRow>>
    where
        E: Executor<'e, Database = Sqlite> + 'e,
    {
        let fetch_limit = rows_to_fetch(row_limit);
        let rows_future = if params.is_empty() {
            executor.fetch(sql).take(fetch_limit).collect::<Vec<_>>()
        } else {
            bind_sqlite_params(sqlx::query(sql), params)
                .fetch(executor)
                .take(fetch_limit)
                .collect::<Vec<_>>()
        };

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn execute_write<'e, E>(
        executor: E,
        sql: &'e str,
        params: &'e [QueryParam],
        query_timeout: Duration,
    ) -> DbResult<u64>
    where
        E: Executor<'e, Database = Sqlite> + 'e,
    {
        let result = if params.is_empty() {
            timeout(query_timeout, executor.execute(sql)).await
        } else {
            let query = bind_sqlite_params(sqlx::query(sql), params);
            timeout(query_timeout, query.execute(executor)).await
        };

        match result {
            Ok(Ok(r)) => Ok(r.rows_affected()),
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error("write operation", query_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::models::DatabaseRole;

    async fn memory_pool() -> DbPool {
        let config = DatabaseConfig::parse("sqlite::memory:", DatabaseRole::Primary).unwrap();
        DbPool::connect(&config, Duration::from_secs(5)).await.unwrap()
    }

    #[test]
    fn test_executor_defaults() {
        let executor = QueryExecutor::new();
        assert_eq!(executor.default_timeout_secs, DEFAULT_QUERY_TIMEOUT_SECS);
        assert_eq!(executor.default_limit, None);
    }

    #[test]
    fn test_executor_timeout_capped() {
        let executor = QueryExecutor::with_defaults(9999, Some(50));
        assert_eq!(executor.default_timeout_secs, MAX_QUERY_TIMEOUT_SECS);
        assert_eq!(executor.default_limit, Some(50));
    }

    #[test]
    fn test_rows_to_fetch() {
        assert_eq!(rows_to_fetch(None), usize::MAX);
        assert_eq!(rows_to_fetch(Some(0)), 1);
        assert_eq!(rows_to_fetch(Some(10)), 11);
    }

    #[tokio::test]
    async fn test_execute_query_with_params_and_truncation() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new();
        executor
            .execute_write(&pool, "CREATE TABLE items (id INTEGER, label TEXT)", &[])
            .await
            .unwrap();
        for id in 1..=3 {
            let written = executor
                .execute_write(
                    &pool,
                    "INSERT INTO items (id, label) VALUES (?, ?)",
                    &[QueryParam::Int(id), QueryParam::String(format!("item-{id}"))],
                )
                .await
                .unwrap();
            assert_eq!(written.rows_affected, 1);
        }

        let request = QueryRequest::new("SELECT id, label FROM items ORDER BY id").with_limit(2);
        let result = executor.execute_query(&pool, &request).await.unwrap();
        assert_eq!(result.row_count(), 2);
        assert!(result.truncated);
        assert_eq!(result.columns[0].name, "id");
        assert_eq!(result.rows[1]["label"], "item-2");

        let request = QueryRequest::new("SELECT label FROM items WHERE id = ?").with_param(3_i64);
        let result = executor.execute_query(&pool, &request).await.unwrap();
        assert!(!result.truncated);
        assert_eq!(result.rows[0]["label"], "item-3");
    }

    #[tokio::test]
    async fn test_execute_query_empty_result() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new();
        executor
            .execute_write(&pool, "CREATE TABLE empty_t (id INTEGER)", &[])
            .await
            .unwrap();

        let result = executor
            .execute_query(&pool, &QueryRequest::new("SELECT id FROM empty_t"))
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(result.columns.is_empty());
    }

    #[tokio::test]
    async fn test_empty_sql_rejected() {
        let pool = memory_pool().await;
        let result = QueryExecutor::new()
            .execute_query(&pool, &QueryRequest::new("   "))
            .await;
        assert!(matches!(result, Err(DbError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_syntax_error_is_database_error() {
        let pool = memory_pool().await;
        let result = QueryExecutor::new()
            .execute_query(&pool, &QueryRequest::new("SELEC nothing"))
            .await;
        assert!(matches!(result, Err(DbError::Database { .. })));
    }

    #[tokio::test]
    async fn test_transaction_read_sees_own_write() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new();
        executor
            .execute_write(&pool, "CREATE TABLE notes (body TEXT)", &[])
            .await
            .unwrap();

        let mut tx = pool.begin().await.unwrap();
        executor
            .execute_write_in(&mut tx, "INSERT INTO notes (body) VALUES ('draft')", &[])
            .await
            .unwrap();
        let result = executor
            .execute_query_in(&mut tx, &QueryRequest::new("SELECT body FROM notes"))
            .await
            .unwrap();
        assert_eq!(result.rows[0]["body"], "draft");
        tx.rollback().await.unwrap();

        let result = executor
            .execute_query(&pool, &QueryRequest::new("SELECT body FROM notes"))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_unlimited_read_returns_every_row() {
        let pool = memory_pool().await;
        let executor = QueryExecutor::new();
        executor
            .execute_write(&pool, "CREATE TABLE seq (i INTEGER NOT NULL)", &[])
            .await
            .unwrap();
        let written = executor
            .execute_write(
                &pool,
                "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 250) \
                 INSERT INTO seq (i) SELECT i FROM n",
                &[],
            )
            .await
            .unwrap();
        assert_eq!(written.rows_affected, 250);

        let request = QueryRequest::new("SELECT i FROM seq ORDER BY i");
        let result = executor.execute_query(&pool, &request).await.unwrap();
        assert_eq!(result.row_count(), 250);
        assert!(!result.truncated);
        assert_eq!(result.rows[249]["i"], 250);

        let capped = QueryExecutor::with_defaults(30, Some(100));
        let result = capped.execute_query(&pool, &request).await.unwrap();
        assert_eq!(result.row_count(), 100);
        assert!(result.truncated);

        let result = capped
            .execute_query(&pool, &request.clone().with_limit(250))
            .await
            .unwrap();
        assert_eq!(result.row_count(), 250);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_zero_limit_returns_no_rows() {
        let pool = memory_pool().await;
        let result = QueryExecutor::new()
            .execute_query(&pool, &QueryRequest::new("SELECT 1 AS one").with_limit(0))
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(result.truncated);
    }
}
