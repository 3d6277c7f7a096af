//! Read routing between the primary and the reader.
//!
//! [`ReadRouter`] is the single entry point for reads. For each read it asks
//! the [`RoutingPolicy`] where to go and runs the query there with the shared
//! [`QueryExecutor`]. Writes and transactions always go to the primary.

use crate::config::RouterConfig;
use crate::db::{DbPool, QueryExecutor};
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, QueryRequest, QueryResult, WriteResult};
use crate::routing::context::RoutingContext;
use crate::routing::policy::{Route, RoutingPolicy};
use crate::routing::tracker::TransactionDepthGuard;
use crate::routing::transaction::RoutedTransaction;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Whether reads can be sent to a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReaderState {
    Installed,
    /// No reader was configured; every read goes to the primary.
    NotConfigured,
    /// A reader was configured but could not be used.
    Unavailable { reason: String },
}

impl ReaderState {
    pub fn is_installed(&self) -> bool {
        matches!(self, ReaderState::Installed)
    }
}

/// Routes reads between a primary pool and an optional reader pool.
///
/// Cheap to clone. Clones share the pools and the ignore-transactions flag.
#[derive(Debug, Clone)]
pub struct ReadRouter {
    primary: DbPool,
    reader: Option<DbPool>,
    executor: QueryExecutor,
    policy: Arc<RoutingPolicy>,
    reader_state: ReaderState,
}

impl ReadRouter {
    /// Build a router from already connected pools.
    pub fn new(primary: DbPool, reader: Option<DbPool>, executor: QueryExecutor) -> Self {
        let reader_state = if reader.is_some() {
            ReaderState::Installed
        } else {
            ReaderState::NotConfigured
        };
        Self {
            primary,
            reader,
            executor,
            policy: Arc::new(RoutingPolicy::default()),
            reader_state,
        }
    }

    /// Connect both pools and decide once whether routing is active.
    ///
    /// A primary that cannot be reached is an error. A reader that cannot be
    /// reached is logged and leaves the router in primary-only mode.
    pub async fn install(config: &RouterConfig) -> DbResult<Self> {
        let primary = DbPool::connect(&config.primary, config.connect_timeout).await?;
        let executor = QueryExecutor::with_defaults(config.query_timeout_secs, config.row_limit);

        let (reader, reader_state) = match &config.reader {
            None => {
                info!("No reader configured; read routing not installed");
                (None, ReaderState::NotConfigured)
            }
            Some(reader_config) => {
                match DbPool::connect(reader_config, config.connect_timeout).await {
                    Ok(pool) => {
                        info!(
                            url = %reader_config.masked_connection_string(),
                            ignore_transactions = config.ignore_transactions,
                            "Read routing installed"
                        );
                        (Some(pool), ReaderState::Installed)
                    }
                    Err(e) => {
                        let err = DbError::configuration(format!("Reader unavailable: {}", e));
                        error!(
                            error = %err,
                            url = %reader_config.masked_connection_string(),
                            "Read routing not installed; reads go to the primary"
                        );
                        (
                            None,
                            ReaderState::Unavailable {
                                reason: err.to_string(),
                            },
                        )
                    }
                }
            }
        };

        let router = Self {
            primary,
            reader,
            executor,
            policy: Arc::new(RoutingPolicy::new(config.ignore_transactions)),
            reader_state,
        };
        Ok(router)
    }

    /// Run a read on whichever side the policy picks for `ctx`.
    ///
    /// A read sent to the reader runs inside a `force_primary` scope, so any
    /// read issued while it is in flight on the same context goes to the
    /// primary.
    ///
    /// While `ctx` has an open transaction, a read routed to the primary must
    /// run on that transaction's connection. This method holds no connection
    /// of its own, so it returns [`DbError::Transaction`] instead of reading
    /// from a second pool connection; use [`RoutedTransaction::execute_read`].
    pub async fn execute_read(
        &self,
        ctx: &RoutingContext,
        request: &QueryRequest,
    ) -> DbResult<QueryResult> {
        match self.reader_for(ctx) {
            Some(reader) => {
                debug!(route = %Route::Reader, sql = %request.sql, "Routing read");
                ctx.force_primary(self.executor.execute_query(reader, request))
                    .await
            }
            None if ctx.transaction_depth() > 0 => {
                warn!(
                    depth = ctx.transaction_depth(),
                    sql = %request.sql,
                    "Primary read outside its open transaction"
                );
                Err(DbError::transaction(
                    "A transaction is open on this context; read through the transaction",
                ))
            }
            None => {
                debug!(route = %Route::Primary, sql = %request.sql, "Routing read");
                self.executor.execute_query(&self.primary, request).await
            }
        }
    }

    /// Run a write on the primary outside any transaction.
    ///
    /// Inside a [`RoutedTransaction`], write through the transaction instead.
    pub async fn execute_write(&self, sql: &str, params: &[QueryParam]) -> DbResult<WriteResult> {
        self.executor.execute_write(&self.primary, sql, params).await
    }

    /// Begin a primary transaction tracked on `ctx`.
    pub async fn begin<'a>(&'a self, ctx: &'a RoutingContext) -> DbResult<RoutedTransaction<'a>> {
        let tx = self.primary.begin().await?;
        let depth_guard = TransactionDepthGuard::new(ctx);
        debug!(depth = ctx.transaction_depth(), "Routed transaction started");
        Ok(RoutedTransaction::new(self, ctx, tx, depth_guard))
    }

    /// Where a read on `ctx` would go right now.
    ///
    /// Always `Primary` when no reader is installed.
    pub fn route_for(&self, ctx: &RoutingContext) -> Route {
        if self.reader_for(ctx).is_some() {
            Route::Reader
        } else {
            Route::Primary
        }
    }

    pub(crate) fn reader_for(&self, ctx: &RoutingContext) -> Option<&DbPool> {
        match (&self.reader, self.policy.route(ctx)) {
            (Some(reader), Route::Reader) => Some(reader),
            _ => None,
        }
    }

    /// Let reads inside open transactions go to the reader.
    ///
    /// Applies to every clone of this router.
    pub fn set_ignore_transactions(&self, ignore: bool) {
        self.policy.set_ignore_transactions(ignore);
    }

    pub fn ignore_transactions(&self) -> bool {
        self.policy.ignore_transactions()
    }

    pub fn reader_state(&self) -> &ReaderState {
        &self.reader_state
    }

    pub fn primary(&self) -> &DbPool {
        &self.primary
    }

    pub fn reader(&self) -> Option<&DbPool> {
        self.reader.as_ref()
    }

    pub(crate) fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Close both pools.
    pub async fn close(&self) {
        self.primary.close().await;
        if let Some(reader) = &self.reader {
            reader.close().await;
        }
        info!("Read router closed");
    }
}
