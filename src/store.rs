//! External data-access seams.
//!
//! The chat core never talks to a database directly; it goes through
//! [`EngagementStore`], which the `database` feature implements over
//! Postgres and tests implement in memory. Both a transport-level failure
//! and an in-band error object from the executor surface as the same
//! [`ExecutionError`].

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ExecutionResult;

/// One result row: a flat mapping of column name to value.
pub type Row = Map<String, Value>;

/// Read-only access to the engagement dataset.
#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// Run a single read-only aggregation statement and return its rows.
    ///
    /// Implementations must independently enforce the read-only gate
    /// before executing - the requesting side validates too, but this
    /// layer may be reached by other callers.
    async fn execute(&self, statement: &str) -> ExecutionResult<Vec<Row>>;

    /// Deduplicated, non-null values currently present in a column.
    ///
    /// Best effort: implementations may cap the sample, and callers must
    /// tolerate an incomplete list.
    async fn distinct_values(&self, column: &str) -> ExecutionResult<Vec<String>>;
}
