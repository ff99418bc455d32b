//! The narrow I/O contract the runner and the data-safety probes depend on
//! (§9: "one abstract trait/interface each"). A host implements this once
//! per driver; nothing else in this crate talks to a connection directly.

use async_trait::async_trait;

/// Execute-statement / execute-scalar / execute-reader, narrowed to exactly
/// what the runner and the safety probes need.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs a statement that produces no rows (DDL, or a DML statement run
    /// for its side effect only).
    async fn execute(&self, sql: &str) -> Result<(), Self::Error>;

    /// Runs a query expected to return at most one row with a single
    /// column, returning its text representation.
    async fn query_scalar(&self, sql: &str) -> Result<Option<String>, Self::Error>;

    /// Runs a query and reports whether it returned at least one row —
    /// the shape the data-loss probes need (§4.6.1).
    async fn query_exists(&self, sql: &str) -> Result<bool, Self::Error>;
}
