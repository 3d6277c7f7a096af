//! Read routing decision.

use crate::routing::context::{RoutingContext, RoutingOverride};
use std::sync::atomic::{AtomicBool, Ordering};

/// Where a read is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Primary,
    Reader,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Primary => write!(f, "primary"),
            Route::Reader => write!(f, "reader"),
        }
    }
}

/// Decide the route for a read.
///
/// An explicit `ForcePrimary` wins. Otherwise an open transaction keeps reads
/// on the primary unless `ignore_transactions` is set.
pub fn decide(routing_override: RoutingOverride, depth: usize, ignore_transactions: bool) -> Route {
    if routing_override == RoutingOverride::ForcePrimary {
        return Route::Primary;
    }
    if depth > 0 && !ignore_transactions {
        return Route::Primary;
    }
    Route::Reader
}

/// Router-wide routing settings, shared by all clones of a router.
#[derive(Debug, Default)]
pub struct RoutingPolicy {
    ignore_transactions: AtomicBool,
}

impl RoutingPolicy {
    pub fn new(ignore_transactions: bool) -> Self {
        Self {
            ignore_transactions: AtomicBool::new(ignore_transactions),
        }
    }

    pub fn route(&self, ctx: &RoutingContext) -> Route {
        decide(
            ctx.override_state(),
            ctx.transaction_depth(),
            self.ignore_transactions(),
        )
    }

    /// A concurrent read may briefly observe the old value.
    pub fn set_ignore_transactions(&self, ignore: bool) {
        self.ignore_transactions.store(ignore, Ordering::Relaxed);
    }

    pub fn ignore_transactions(&self) -> bool {
        self.ignore_transactions.load(Ordering::Relaxed)
    }
}
