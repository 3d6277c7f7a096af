//! Scoped routing overrides.
//!
//! [`RoutingContext::force_primary`] and [`RoutingContext::force_reader`] set
//! an override for the duration of a body and put back whatever was active
//! before on every exit path: normal return, error, panic unwinding and, for
//! the async forms, the future being dropped before completion.

use crate::routing::context::{RoutingContext, RoutingOverride};
use std::future::Future;
use tracing::trace;

/// Restores the previous override when dropped.
///
/// Holds nothing to restore when the requested override was already active.
#[must_use = "the override is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct OverrideGuard<'a> {
    ctx: &'a RoutingContext,
    previous: Option<RoutingOverride>,
}

impl<'a> OverrideGuard<'a> {
    pub fn enter(ctx: &'a RoutingContext, routing_override: RoutingOverride) -> Self {
        let current = ctx.override_state();
        if current == routing_override {
            return Self {
                ctx,
                previous: None,
            };
        }

        trace!(from = %current, to = %routing_override, "Entering override scope");
        ctx.set_override(routing_override);
        Self {
            ctx,
            previous: Some(current),
        }
    }
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            trace!(to = %previous, "Restoring override");
            self.ctx.set_override(previous);
        }
    }
}

impl RoutingContext {
    /// Run `body` with every read on this context sent to the primary.
    pub async fn force_primary<F: Future>(&self, body: F) -> F::Output {
        let _guard = OverrideGuard::enter(self, RoutingOverride::ForcePrimary);
        body.await
    }

    /// Run `body` with the override cleared, so reads follow the policy.
    pub async fn force_reader<F: Future>(&self, body: F) -> F::Output {
        let _guard = OverrideGuard::enter(self, RoutingOverride::NoOverride);
        body.await
    }

    pub fn force_primary_sync<T>(&self, body: impl FnOnce() -> T) -> T {
        let _guard = OverrideGuard::enter(self, RoutingOverride::ForcePrimary);
        body()
    }

    pub fn force_reader_sync<T>(&self, body: impl FnOnce() -> T) -> T {
        let _guard = OverrideGuard::enter(self, RoutingOverride::NoOverride);
        body()
    }
}
