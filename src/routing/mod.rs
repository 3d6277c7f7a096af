//! Read routing.
//!
//! - `context`: per-task override and transaction depth
//! - `policy`: the primary/reader decision
//! - `scope`: `force_primary` / `force_reader` scopes
//! - `tracker`: transaction depth bookkeeping
//! - `router`: the read entry point
//! - `transaction`: primary transactions tracked on a context

pub mod context;
pub mod policy;
pub mod router;
pub mod scope;
pub mod tracker;
pub mod transaction;

pub use context::{RoutingContext, RoutingOverride};
pub use policy::{Route, RoutingPolicy, decide};
pub use router::{ReadRouter, ReaderState};
pub use scope::OverrideGuard;
pub use tracker::TransactionDepthGuard;
pub use transaction::RoutedTransaction;
