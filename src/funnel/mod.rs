//! Canonical funnel metrics and their aggregation.
//!
//! The funnel has four ordered stages - deliveries, opens, clicks,
//! adoptions - plus derived conversion rates. Rates are computed only
//! after all sums are final, and a zero denominator always yields exactly
//! 0, never NaN or infinity. A metrics value is never mutated after
//! construction; changed inputs mean a wholesale recompute.

pub mod aggregate;
pub mod rows;

pub use aggregate::{parse_rows, reduce, reduce_by_dimension};
pub use rows::{stage_for_category, ResultRow, Stage};

use serde::{Deserialize, Serialize};

/// Normalized bucket key for rows with a missing dimension value.
pub const UNKNOWN_BUCKET: &str = "Unknown";

/// One complete funnel record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelMetrics {
    pub deliveries: u64,
    pub opens: u64,
    pub clicks: u64,
    pub adoptions: u64,
    /// opens / deliveries, percent
    pub open_rate: f64,
    /// clicks / deliveries, percent
    pub click_through_rate: f64,
    /// clicks / opens, percent
    pub click_through_open_rate: f64,
    /// adoptions / deliveries, percent (adoption is measured against the
    /// funnel entry stage in this deployment)
    pub adoption_rate: f64,
}

impl FunnelMetrics {
    /// Derive the full record from final stage counts.
    pub fn from_counts(deliveries: u64, opens: u64, clicks: u64, adoptions: u64) -> Self {
        Self {
            deliveries,
            opens,
            clicks,
            adoptions,
            open_rate: pct(opens, deliveries),
            click_through_rate: pct(clicks, deliveries),
            click_through_open_rate: pct(clicks, opens),
            adoption_rate: pct(adoptions, deliveries),
        }
    }

    pub fn empty() -> Self {
        Self::from_counts(0, 0, 0, 0)
    }

    /// True when every stage count is zero.
    pub fn is_empty(&self) -> bool {
        self.deliveries == 0 && self.opens == 0 && self.clicks == 0 && self.adoptions == 0
    }
}

/// numerator / denominator as a percentage; exactly 0 when the
/// denominator is 0.
fn pct(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_derived() {
        let m = FunnelMetrics::from_counts(100, 40, 10, 5);
        assert_eq!(m.open_rate, 40.0);
        assert_eq!(m.click_through_rate, 10.0);
        assert_eq!(m.click_through_open_rate, 25.0);
        assert_eq!(m.adoption_rate, 5.0);
    }

    #[test]
    fn test_zero_denominators_give_zero_rates() {
        let m = FunnelMetrics::from_counts(0, 0, 0, 0);
        assert_eq!(m.open_rate, 0.0);
        assert_eq!(m.click_through_rate, 0.0);
        assert_eq!(m.click_through_open_rate, 0.0);
        assert_eq!(m.adoption_rate, 0.0);
        assert!(m.open_rate.is_finite());
        assert!(m.is_empty());
    }

    #[test]
    fn test_zero_opens_only() {
        let m = FunnelMetrics::from_counts(100, 0, 0, 0);
        assert_eq!(m.click_through_open_rate, 0.0);
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let m = FunnelMetrics::from_counts(10, 5, 2, 1);
        let json = serde_json::to_string(&m).expect("serialize");
        assert!(json.contains("\"openRate\""));
        assert!(json.contains("\"clickThroughRate\""));
        assert!(json.contains("\"clickThroughOpenRate\""));
        assert!(json.contains("\"adoptionRate\""));
    }
}
