//! Transaction nesting depth per context.

use crate::routing::context::RoutingContext;
use std::sync::atomic::Ordering;
use tracing::warn;

impl RoutingContext {
    /// Record that a primary transaction or savepoint opened.
    pub fn transaction_began(&self) {
        self.depth.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a primary transaction or savepoint ended.
    ///
    /// An end with no open transaction is unbalanced bookkeeping. The depth
    /// stays at zero and the event is logged.
    pub fn transaction_ended(&self) {
        let result = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |depth| {
                depth.checked_sub(1)
            });

        if result.is_err() {
            warn!("Transaction ended with no open transaction; depth clamped at 0");
        }
    }
}

/// Counts one open transaction for as long as it is alive.
#[must_use = "the transaction is counted as ended as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TransactionDepthGuard<'a> {
    ctx: &'a RoutingContext,
}

impl<'a> TransactionDepthGuard<'a> {
    pub fn new(ctx: &'a RoutingContext) -> Self {
        ctx.transaction_began();
        Self { ctx }
    }
}

impl Drop for TransactionDepthGuard<'_> {
    fn drop(&mut self) {
        self.ctx.transaction_ended();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_began_and_ended() {
        let ctx = RoutingContext::new();
        ctx.transaction_began();
        ctx.transaction_began();
        assert_eq!(ctx.transaction_depth(), 2);
        ctx.transaction_ended();
        assert_eq!(ctx.transaction_depth(), 1);
        ctx.transaction_ended();
        assert_eq!(ctx.transaction_depth(), 0);
    }

    #[test]
    fn test_unbalanced_end_clamps_at_zero() {
        let ctx = RoutingContext::new();
        ctx.transaction_ended();
        assert_eq!(ctx.transaction_depth(), 0);

        ctx.transaction_began();
        assert_eq!(ctx.transaction_depth(), 1);
    }

    #[test]
    fn test_guard_tracks_nesting() {
        let ctx = RoutingContext::new();
        {
            let _outer = TransactionDepthGuard::new(&ctx);
            {
                let _inner = TransactionDepthGuard::new(&ctx);
                assert_eq!(ctx.transaction_depth(), 2);
            }
            assert_eq!(ctx.transaction_depth(), 1);
        }
        assert_eq!(ctx.transaction_depth(), 0);
    }
}
