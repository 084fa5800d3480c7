//! Row reduction into canonical funnel metrics.
//!
//! Sums are accumulated per stage bucket across all rows first; rates are
//! derived once, after the sums are final. Dimensional reduction groups
//! rows by their dimension value (missing value -> "Unknown") and then
//! reduces each group independently with the same logic.

use std::collections::BTreeMap;

use super::rows::{stage_for_category, ResultRow, Stage};
use super::{FunnelMetrics, UNKNOWN_BUCKET};
use crate::store::Row;

/// Parse raw executor rows, skipping anything that matches neither shape.
pub fn parse_rows(rows: &[Row]) -> Vec<ResultRow> {
    rows.iter().filter_map(ResultRow::from_row).collect()
}

/// Reduce all rows into one funnel record.
pub fn reduce(rows: &[ResultRow]) -> FunnelMetrics {
    let mut deliveries: u64 = 0;
    let mut opens: u64 = 0;
    let mut clicks: u64 = 0;
    let mut adoptions: u64 = 0;

    for row in rows {
        match row {
            ResultRow::Pivoted {
                deliveries: d,
                opens: o,
                clicks: c,
                adoptions: a,
                ..
            } => {
                deliveries += d;
                opens += o;
                clicks += c;
                adoptions += a;
            }
            ResultRow::Labeled {
                category, count, ..
            } => match stage_for_category(category) {
                Some(Stage::Deliveries) => deliveries += count,
                Some(Stage::Opens) => opens += count,
                Some(Stage::Clicks) => clicks += count,
                Some(Stage::Adoptions) => adoptions += count,
                // unmatched categories are ignored, not an error
                None => {}
            },
        }
    }

    FunnelMetrics::from_counts(deliveries, opens, clicks, adoptions)
}

/// Reduce rows into one funnel record per dimension value.
///
/// Rows without a dimension value land in the "Unknown" bucket rather
/// than being dropped.
pub fn reduce_by_dimension(rows: &[ResultRow]) -> BTreeMap<String, FunnelMetrics> {
    let mut grouped: BTreeMap<String, Vec<ResultRow>> = BTreeMap::new();
    for row in rows {
        let key = row
            .dimension_value()
            .unwrap_or(UNKNOWN_BUCKET)
            .to_string();
        grouped.entry(key).or_default().push(row.clone());
    }

    grouped
        .into_iter()
        .map(|(key, group)| (key, reduce(&group)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(dimension: Option<&str>, category: &str, count: u64) -> ResultRow {
        ResultRow::Labeled {
            dimension_value: dimension.map(|s| s.to_string()),
            category: category.to_string(),
            count,
        }
    }

    #[test]
    fn test_basic_reduction() {
        // 100 delivered, 40 opened, 10 clicked
        let rows = vec![
            labeled(None, "Deliveries", 100),
            labeled(None, "Opens", 40),
            labeled(None, "Clicks", 10),
        ];
        let m = reduce(&rows);
        assert_eq!(m.deliveries, 100);
        assert_eq!(m.opens, 40);
        assert_eq!(m.clicks, 10);
        assert_eq!(m.adoptions, 0);
        assert_eq!(m.open_rate, 40.0);
        assert_eq!(m.click_through_rate, 10.0);
        assert_eq!(m.click_through_open_rate, 25.0);
        assert_eq!(m.adoption_rate, 0.0);
    }

    #[test]
    fn test_repeated_categories_sum() {
        let rows = vec![
            labeled(None, "Deliveries", 60),
            labeled(None, "emails delivered", 40),
            labeled(None, "Opened", 40),
        ];
        let m = reduce(&rows);
        assert_eq!(m.deliveries, 100);
        assert_eq!(m.opens, 40);
    }

    #[test]
    fn test_unmatched_categories_ignored() {
        let rows = vec![
            labeled(None, "Deliveries", 100),
            labeled(None, "Bounces", 12),
            labeled(None, "Spam Reports", 3),
        ];
        let m = reduce(&rows);
        assert_eq!(m.deliveries, 100);
        assert_eq!(m.opens, 0);
    }

    #[test]
    fn test_pivoted_rows_reduce_directly() {
        let rows = vec![ResultRow::Pivoted {
            dimension_value: None,
            deliveries: 100,
            opens: 40,
            clicks: 10,
            adoptions: 4,
        }];
        let m = reduce(&rows);
        assert_eq!(m.adoption_rate, 4.0);
    }

    #[test]
    fn test_dimensional_grouping_with_unknown_bucket() {
        let rows = vec![
            labeled(Some("AMER"), "Deliveries", 100),
            labeled(Some("AMER"), "Opens", 50),
            labeled(Some("EMEA"), "Deliveries", 80),
            labeled(Some("APAC"), "Deliveries", 60),
            labeled(None, "Deliveries", 10),
            labeled(None, "Opens", 2),
        ];
        let groups = reduce_by_dimension(&rows);
        assert_eq!(groups.len(), 4);
        assert!(groups.contains_key("Unknown"));
        assert_eq!(groups["AMER"].deliveries, 100);
        assert_eq!(groups["AMER"].opens, 50);
        assert_eq!(groups["EMEA"].deliveries, 80);
        assert_eq!(groups["EMEA"].opens, 0);
        assert_eq!(groups["Unknown"].deliveries, 10);
        assert_eq!(groups["Unknown"].opens, 2);
    }
}
