//! Per-context routing state.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Caller-requested routing preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingOverride {
    /// Follow the transaction-based policy.
    #[default]
    NoOverride,
    /// Send every read to the primary.
    ForcePrimary,
}

impl std::fmt::Display for RoutingOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingOverride::NoOverride => write!(f, "none"),
            RoutingOverride::ForcePrimary => write!(f, "force_primary"),
        }
    }
}

/// Routing state owned by one logical execution context (a task or request).
///
/// Create one per request and pass it by reference. The handle is not
/// `Clone`; a new task gets a new handle, so no state outlives its flow.
///
/// Scopes on one context must nest sequentially. Driving two scopes of the
/// same context concurrently is unsupported.
#[derive(Debug, Default)]
pub struct RoutingContext {
    // One flow writes these; the runtime synchronizes handoff between threads.
    pub(super) force_primary: AtomicBool,
    pub(super) depth: AtomicUsize,
}

impl RoutingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context that starts with the given override.
    pub fn with_override(routing_override: RoutingOverride) -> Self {
        let ctx = Self::new();
        ctx.set_override(routing_override);
        ctx
    }

    pub fn override_state(&self) -> RoutingOverride {
        if self.force_primary.load(Ordering::Relaxed) {
            RoutingOverride::ForcePrimary
        } else {
            RoutingOverride::NoOverride
        }
    }

    /// Set the override for all later reads on this context.
    ///
    /// Unscoped: the value stays until changed again. Prefer
    /// [`force_primary`](Self::force_primary) for a bounded region.
    pub fn set_override(&self, routing_override: RoutingOverride) {
        self.force_primary.store(
            routing_override == RoutingOverride::ForcePrimary,
            Ordering::Relaxed,
        );
    }

    pub fn is_forcing_primary(&self) -> bool {
        self.override_state() == RoutingOverride::ForcePrimary
    }

    pub fn is_forcing_reader(&self) -> bool {
        self.override_state() == RoutingOverride::NoOverride
    }

    /// Number of primary transactions (and savepoints) open on this context.
    pub fn transaction_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_defaults() {
        let ctx = RoutingContext::new();
        assert_eq!(ctx.override_state(), RoutingOverride::NoOverride);
        assert!(ctx.is_forcing_reader());
        assert!(!ctx.is_forcing_primary());
        assert_eq!(ctx.transaction_depth(), 0);
    }

    #[test]
    fn test_with_override() {
        let ctx = RoutingContext::with_override(RoutingOverride::ForcePrimary);
        assert!(ctx.is_forcing_primary());
        ctx.set_override(RoutingOverride::NoOverride);
        assert!(ctx.is_forcing_reader());
    }

    #[test]
    fn test_context_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RoutingContext>();
    }

    #[test]
    fn test_override_display() {
        assert_eq!(RoutingOverride::NoOverride.to_string(), "none");
        assert_eq!(RoutingOverride::ForcePrimary.to_string(), "force_primary");
    }
}
