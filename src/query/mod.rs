//! Safe query construction and validation.
//!
//! The builder assembles read-only aggregation statements from a resolved
//! intent; the safety gate in [`safety`] rejects anything else before it
//! can reach the executor.

pub mod builder;
pub mod safety;

pub use builder::{build_plan, comparison_plans, default_plan, SafeQueryBuilder};
pub use safety::{validate_read_only, FORBIDDEN_KEYWORDS};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The visualization the presentation layer should expect for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VizKind {
    Funnel,
    ComparisonBars,
    GroupedBars,
    TrendLine,
}

/// A single executable aggregation request.
///
/// Built from a [`crate::intent::QueryIntent`], consumed once by the
/// executor, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// One-line description of what the plan answers
    pub summary: String,
    /// Canonical entity names the plan touches
    pub entities: Vec<String>,
    /// Column -> filter values (IN-semantics; single value = equality)
    pub filters: BTreeMap<String, Vec<String>>,
    /// The generated read-only statement
    pub statement: String,
    /// Expected visualization kind
    pub visualization: VizKind,
}
