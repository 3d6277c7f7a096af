//! Primary transactions tracked on a routing context.

use crate::db::DbTransaction;
use crate::error::DbResult;
use crate::models::{QueryParam, QueryRequest, QueryResult, WriteResult};
use crate::routing::context::RoutingContext;
use crate::routing::policy::Route;
use crate::routing::router::ReadRouter;
use crate::routing::tracker::TransactionDepthGuard;
use tracing::debug;

/// A transaction on the primary that keeps the context's depth current.
///
/// The depth counts this transaction until it is committed, rolled back or
/// dropped. Dropping it without committing rolls it back.
#[derive(Debug)]
pub struct RoutedTransaction<'a> {
    router: &'a ReadRouter,
    ctx: &'a RoutingContext,
    tx: DbTransaction<'a>,
    depth_guard: TransactionDepthGuard<'a>,
}

impl<'a> RoutedTransaction<'a> {
    pub(crate) fn new(
        router: &'a ReadRouter,
        ctx: &'a RoutingContext,
        tx: DbTransaction<'a>,
        depth_guard: TransactionDepthGuard<'a>,
    ) -> Self {
        Self {
            router,
            ctx,
            tx,
            depth_guard,
        }
    }

    /// Run a read routed by the same policy as [`ReadRouter::execute_read`].
    ///
    /// On the primary it runs on this transaction's connection and sees its
    /// uncommitted writes.
    pub async fn execute_read(&mut self, request: &QueryRequest) -> DbResult<QueryResult> {
        let executor = self.router.executor();
        match self.router.reader_for(self.ctx) {
            Some(reader) => {
                debug!(route = %Route::Reader, sql = %request.sql, "Routing read in transaction");
                self.ctx
                    .force_primary(executor.execute_query(reader, request))
                    .await
            }
            None => {
                debug!(route = %Route::Primary, sql = %request.sql, "Routing read in transaction");
                executor.execute_query_in(&mut self.tx, request).await
            }
        }
    }

    /// Run a write on this transaction's connection.
    pub async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<WriteResult> {
        self.router
            .executor()
            .execute_write_in(&mut self.tx, sql, params)
            .await
    }

    /// Open a savepoint. It counts as one more level of depth.
    pub async fn begin(&mut self) -> DbResult<RoutedTransaction<'_>> {
        let tx = self.tx.begin_nested().await?;
        let depth_guard = TransactionDepthGuard::new(self.ctx);
        debug!(depth = self.ctx.transaction_depth(), "Savepoint started");
        Ok(RoutedTransaction {
            router: self.router,
            ctx: self.ctx,
            tx,
            depth_guard,
        })
    }

    pub async fn commit(self) -> DbResult<()> {
        let Self {
            tx, depth_guard, ..
        } = self;
        let result = tx.commit().await;
        drop(depth_guard);
        result
    }

    pub async fn rollback(self) -> DbResult<()> {
        let Self {
            tx, depth_guard, ..
        } = self;
        let result = tx.rollback().await;
        drop(depth_guard);
        result
    }

    /// Current depth of the owning context.
    pub fn depth(&self) -> usize {
        self.ctx.transaction_depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{DbPool, QueryExecutor};
    use crate::models::DatabaseRole;
    use std::time::Duration;

    async fn primary_only_router() -> ReadRouter {
        let config = DatabaseConfig::parse("sqlite::memory:", DatabaseRole::Primary).unwrap();
        let pool = DbPool::connect(&config, Duration::from_secs(5)).await.unwrap();
        ReadRouter::new(pool, None, QueryExecutor::new())
    }

    #[tokio::test]
    async fn test_depth_follows_commit_and_rollback() {
        let router = primary_only_router().await;
        let ctx = RoutingContext::new();

        let tx = router.begin(&ctx).await.unwrap();
        assert_eq!(tx.depth(), 1);
        tx.commit().await.unwrap();
        assert_eq!(ctx.transaction_depth(), 0);

        let tx = router.begin(&ctx).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(ctx.transaction_depth(), 0);
    }

    #[tokio::test]
    async fn test_dropped_transaction_restores_depth() {
        let router = primary_only_router().await;
        let ctx = RoutingContext::new();
        {
            let _tx = router.begin(&ctx).await.unwrap();
            assert_eq!(ctx.transaction_depth(), 1);
        }
        assert_eq!(ctx.transaction_depth(), 0);
    }

    #[tokio::test]
    async fn test_savepoint_nesting() {
        let router = primary_only_router().await;
        let ctx = RoutingContext::new();
        router
            .execute_write("CREATE TABLE t (v TEXT)", &[])
            .await
            .unwrap();

        let mut outer = router.begin(&ctx).await.unwrap();
        outer
            .execute("INSERT INTO t (v) VALUES ('kept')", &[])
            .await
            .unwrap();
        {
            let mut inner = outer.begin().await.unwrap();
            assert_eq!(inner.depth(), 2);
            inner
                .execute("INSERT INTO t (v) VALUES ('discarded')", &[])
                .await
                .unwrap();
            inner.rollback().await.unwrap();
        }
        assert_eq!(outer.depth(), 1);

        let result = outer
            .execute_read(&QueryRequest::new("SELECT v FROM t"))
            .await
            .unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.rows[0]["v"], "kept");
        outer.commit().await.unwrap();
        assert_eq!(ctx.transaction_depth(), 0);
    }
}
