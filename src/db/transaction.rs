//! Database-specific transaction wrapper.
//!
//! Wraps sqlx transactions for each backend behind one type. Nested
//! transactions are savepoints on the parent's connection.

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use sqlx::{Acquire, MySql, Postgres, Sqlite, Transaction};

/// An open transaction on the primary.
///
/// Dropping it without committing rolls it back.
pub enum DbTransaction<'c> {
    MySql(Transaction<'c, MySql>),
    Postgres(Transaction<'c, Postgres>),
    SQLite(Transaction<'c, Sqlite>),
}

impl std::fmt::Debug for DbTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DbTransaction").field(&self.db_type()).finish()
    }
}

impl<'c> DbTransaction<'c> {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbTransaction::MySql(_) => DatabaseType::MySQL,
            DbTransaction::Postgres(_) => DatabaseType::PostgreSQL,
            DbTransaction::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Open a savepoint nested inside this transaction.
    pub async fn begin_nested(&mut self) -> DbResult<DbTransaction<'_>> {
        let nested = crate::impl_db_dispatch!(
            self, DbTransaction, DbTransaction,
            tx => Acquire::begin(tx).await.map_err(|e| tx_error("open savepoint", e))?
        );
        Ok(nested)
    }

    pub async fn commit(self) -> DbResult<()> {
        crate::impl_db_dispatch!(self, DbTransaction, tx => tx.commit().await.map_err(|e| tx_error("commit", e)))
    }

    pub async fn rollback(self) -> DbResult<()> {
        crate::impl_db_dispatch!(self, DbTransaction, tx => tx.rollback().await.map_err(|e| tx_error("roll back", e)))
    }
}

fn tx_error(action: &str, err: sqlx::Error) -> DbError {
    match DbError::from(err) {
        // Lost connections stay connection errors
        e @ (DbError::Connection { .. } | DbError::Timeout { .. }) => e,
        e => DbError::transaction(format!("Failed to {}: {}", action, e)),
    }
}
