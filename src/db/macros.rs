//! Database dispatch macros for reducing code duplication.
//!
//! The pool and transaction wrappers are parallel enums with one variant per
//! backend (`MySql`, `Postgres`, `SQLite`). These macros write the repetitive
//! match so each arm is type-checked against its own backend.

/// Dispatch over the backend variants of a wrapper enum.
///
/// The body is repeated for each arm, so it may use backend-specific types.
/// The four-argument form re-wraps each arm's result in the same variant of a
/// second enum.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, DbPool, p => p.close().await);
/// let tx = impl_db_dispatch!(pool, DbPool, DbTransaction, p => p.begin().await?);
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($value:expr, $from:ident, $to:ident, $p:ident => $body:expr) => {
        match $value {
            $from::MySql($p) => $to::MySql($body),
            $from::Postgres($p) => $to::Postgres($body),
            $from::SQLite($p) => $to::SQLite($body),
        }
    };
    ($value:expr, $from:ident, $p:ident => $body:expr) => {
        match $value {
            $from::MySql($p) => $body,
            $from::Postgres($p) => $body,
            $from::SQLite($p) => $body,
        }
    };
}
