//! Result-row shapes from the query executor.
//!
//! The executor hands back flat column->value maps in one of two shapes:
//! a pivoted funnel row (explicit per-stage numeric fields, one complete
//! record per dimension value) or a category-label row (free-text label
//! plus a count). The shape is detected explicitly, not probed
//! property-by-property, and rows matching neither shape are skipped.

use serde_json::Value;

use crate::store::Row;

/// The four canonical funnel stages, in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Deliveries,
    Opens,
    Clicks,
    Adoptions,
}

/// Map a free-text category label to its stage.
///
/// Case-insensitive substring matching, never exact equality - the labels
/// arrive with unexpected casing and spelling. First match wins;
/// unmatched labels are ignored upstream.
pub fn stage_for_category(label: &str) -> Option<Stage> {
    let lowered = label.to_lowercase();
    if lowered.contains("deliver") {
        Some(Stage::Deliveries)
    } else if lowered.contains("open") {
        Some(Stage::Opens)
    } else if lowered.contains("click") {
        Some(Stage::Clicks)
    } else if lowered.contains("adopt") || lowered.contains("convert") || lowered.contains("complete")
    {
        Some(Stage::Adoptions)
    } else {
        None
    }
}

/// One parsed result row.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRow {
    /// The query already pivoted: stage values read directly.
    Pivoted {
        dimension_value: Option<String>,
        deliveries: u64,
        opens: u64,
        clicks: u64,
        adoptions: u64,
    },
    /// One category label with its summed count.
    Labeled {
        dimension_value: Option<String>,
        category: String,
        count: u64,
    },
}

const STAGE_FIELDS: [&str; 4] = ["deliveries", "opens", "clicks", "adoptions"];

/// Count column names accepted on labeled rows, checked in order.
const COUNT_FIELDS: [&str; 4] = ["total_customers", "total", "count", "customer_count"];

impl ResultRow {
    /// Detect the row shape and parse it. `None` means the row matches
    /// neither shape and should be skipped.
    pub fn from_row(row: &Row) -> Option<Self> {
        let dimension_value = row
            .get("dimension_value")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        if STAGE_FIELDS.iter().all(|f| row.contains_key(*f)) {
            return Some(ResultRow::Pivoted {
                dimension_value,
                deliveries: count_value(row.get("deliveries")),
                opens: count_value(row.get("opens")),
                clicks: count_value(row.get("clicks")),
                adoptions: count_value(row.get("adoptions")),
            });
        }

        let category = row.get("category").and_then(|v| v.as_str())?;
        let count = COUNT_FIELDS
            .iter()
            .find_map(|f| row.get(*f))
            .map(|v| count_value(Some(v)))?;

        Some(ResultRow::Labeled {
            dimension_value,
            category: category.to_string(),
            count,
        })
    }

    pub fn dimension_value(&self) -> Option<&str> {
        match self {
            ResultRow::Pivoted { dimension_value, .. }
            | ResultRow::Labeled { dimension_value, .. } => dimension_value.as_deref(),
        }
    }
}

/// Read a count from a JSON value. Counts are non-negative by contract;
/// anything negative or unreadable collapses to 0.
fn count_value(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(u) = n.as_u64() {
                u
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f > 0.0 {
                    f.round() as u64
                } else {
                    0
                }
            } else {
                0
            }
        }
        Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().expect("object").clone()
    }

    #[test]
    fn test_stage_bucketing_is_substring_and_case_insensitive() {
        assert_eq!(stage_for_category("Deliveries"), Some(Stage::Deliveries));
        assert_eq!(stage_for_category("emails DELIVERED"), Some(Stage::Deliveries));
        assert_eq!(stage_for_category("Unique Opens"), Some(Stage::Opens));
        assert_eq!(stage_for_category("clicked"), Some(Stage::Clicks));
        assert_eq!(stage_for_category("Adoption"), Some(Stage::Adoptions));
        assert_eq!(stage_for_category("Converted"), Some(Stage::Adoptions));
        assert_eq!(stage_for_category("Completed"), Some(Stage::Adoptions));
        assert_eq!(stage_for_category("Bounces"), None);
    }

    #[test]
    fn test_pivoted_shape_detected() {
        let parsed = ResultRow::from_row(&row(json!({
            "dimension_value": "EMEA",
            "deliveries": 100,
            "opens": 40,
            "clicks": 10,
            "adoptions": 2
        })))
        .expect("parsed");
        assert_eq!(
            parsed,
            ResultRow::Pivoted {
                dimension_value: Some("EMEA".to_string()),
                deliveries: 100,
                opens: 40,
                clicks: 10,
                adoptions: 2
            }
        );
    }

    #[test]
    fn test_labeled_shape_detected() {
        let parsed = ResultRow::from_row(&row(json!({
            "category": "Opens",
            "total_customers": 40
        })))
        .expect("parsed");
        assert_eq!(
            parsed,
            ResultRow::Labeled {
                dimension_value: None,
                category: "Opens".to_string(),
                count: 40
            }
        );
    }

    #[test]
    fn test_unparseable_row_skipped() {
        assert_eq!(ResultRow::from_row(&row(json!({"foo": 1}))), None);
        // category without any count field
        assert_eq!(
            ResultRow::from_row(&row(json!({"category": "Opens"}))),
            None
        );
    }

    #[test]
    fn test_count_coercions() {
        let parsed = ResultRow::from_row(&row(json!({
            "category": "Clicks",
            "total": "17"
        })))
        .expect("parsed");
        assert_eq!(
            parsed,
            ResultRow::Labeled {
                dimension_value: None,
                category: "Clicks".to_string(),
                count: 17
            }
        );

        // negative clamps to zero
        let parsed = ResultRow::from_row(&row(json!({
            "category": "Clicks",
            "total": -5
        })))
        .expect("parsed");
        assert!(matches!(parsed, ResultRow::Labeled { count: 0, .. }));
    }
}
