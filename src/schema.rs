//! Fixed table contract for the engagement dataset.
//!
//! Every generated statement targets exactly one denormalized event table.
//! The table name collides with the executor's reserved-word-like naming
//! convention, so it is always wrapped in double quotes before being handed
//! over - there is no unquoted path through this module.

use serde::{Deserialize, Serialize};

/// The one table all aggregation statements run against.
pub const TABLE_NAME: &str = "Engagement_Data";

/// Column names of the engagement event table.
pub mod columns {
    pub const CUSTOMER_COUNT: &str = "customer_count";
    pub const CATEGORY: &str = "category";
    pub const PROGRAM_NAME: &str = "program_name";
    pub const REGION: &str = "region";
    pub const QUARTER: &str = "quarter";
    pub const EVENT_DATE: &str = "event_date";
    pub const COUNTRY: &str = "country";
    pub const LANGUAGE: &str = "language";
    pub const SPEND_TIER: &str = "spend_tier";
    pub const ASSIGNMENT_STATUS: &str = "assignment_status";
    pub const PRODUCT: &str = "product";
    pub const CAMPAIGN_ID: &str = "campaign_id";
    pub const LESSON_NAME: &str = "lesson_name";
    pub const LESSON_NUMBER: &str = "lesson_number";
}

/// The table name in the destination identifier-quoting syntax.
pub fn quoted_table() -> String {
    format!("\"{}\"", TABLE_NAME)
}

/// Escape a string for use inside a single-quoted SQL literal.
///
/// Filter values are already validated against the live distinct-value sets
/// before they reach a statement; escaping is the second layer.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// A breakdown dimension the user can partition funnel metrics by.
///
/// Closed set - the classifier can only map a "by <token>" phrase onto one
/// of these, and the builder only knows how to group by these columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Region,
    Quarter,
    Program,
    Product,
    Country,
    Language,
    Tier,
}

impl Dimension {
    /// Map a user-facing dimension token to a dimension, if it names one.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "region" | "regions" | "geo" => Some(Dimension::Region),
            "quarter" | "quarters" => Some(Dimension::Quarter),
            "program" | "programs" | "path" | "paths" => Some(Dimension::Program),
            "product" | "products" => Some(Dimension::Product),
            "country" | "countries" => Some(Dimension::Country),
            "language" | "languages" => Some(Dimension::Language),
            "tier" | "tiers" | "spend" => Some(Dimension::Tier),
            _ => None,
        }
    }

    /// The table column this dimension groups by.
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::Region => columns::REGION,
            Dimension::Quarter => columns::QUARTER,
            Dimension::Program => columns::PROGRAM_NAME,
            Dimension::Product => columns::PRODUCT,
            Dimension::Country => columns::COUNTRY,
            Dimension::Language => columns::LANGUAGE,
            Dimension::Tier => columns::SPEND_TIER,
        }
    }

    /// Human-readable label for narratives.
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Region => "region",
            Dimension::Quarter => "quarter",
            Dimension::Program => "program",
            Dimension::Product => "product",
            Dimension::Country => "country",
            Dimension::Language => "language",
            Dimension::Tier => "spend tier",
        }
    }
}
