//! Response envelope assembly.
//!
//! Combines funnel metrics with narrative text into the structure the
//! presentation layer consumes. Shape assembly only - no aggregation or
//! planning logic lives here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::funnel::FunnelMetrics;

/// One chat answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Narrative text shown in the chat transcript
    pub narrative: String,
    /// Optional chart payload, tagged by kind
    pub visualization: Option<Visualization>,
    /// Suggested follow-up prompts
    pub suggestions: Vec<String>,
}

impl ChatResponse {
    pub fn text_only(narrative: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            narrative: narrative.into(),
            visualization: None,
            suggestions,
        }
    }
}

/// A funnel record with a display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedFunnel {
    pub name: String,
    pub metrics: FunnelMetrics,
}

/// One period of a trend series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period: String,
    pub metrics: FunnelMetrics,
}

/// Visualization payloads, tagged for the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Visualization {
    Funnel {
        title: String,
        metrics: FunnelMetrics,
    },
    Comparison {
        left: NamedFunnel,
        right: NamedFunnel,
    },
    Breakdown {
        dimension: String,
        groups: BTreeMap<String, FunnelMetrics>,
    },
    Trend {
        points: Vec<TrendPoint>,
    },
}

/// Narrative for a single funnel slice.
pub fn funnel_narrative(summary: &str, metrics: &FunnelMetrics, assumed_quarter: Option<&str>) -> String {
    let mut text = format!(
        "{summary}: {} deliveries, {} opens ({}), {} clicks ({}), {} adoptions ({}).",
        fmt_count(metrics.deliveries),
        fmt_count(metrics.opens),
        fmt_pct(metrics.open_rate),
        fmt_count(metrics.clicks),
        fmt_pct(metrics.click_through_rate),
        fmt_count(metrics.adoptions),
        fmt_pct(metrics.adoption_rate),
    );
    if let Some(quarter) = assumed_quarter {
        text.push_str(&format!(" Assuming the current quarter ({quarter})."));
    }
    text
}

/// Narrative diffing two funnels.
pub fn comparison_narrative(left: &NamedFunnel, right: &NamedFunnel) -> String {
    let (leader, trailer) = if left.metrics.open_rate >= right.metrics.open_rate {
        (left, right)
    } else {
        (right, left)
    };
    format!(
        "{} vs {}: {} leads on open rate ({} vs {}); click-through {} vs {}; adoption {} vs {}.",
        left.name,
        right.name,
        leader.name,
        fmt_pct(leader.metrics.open_rate),
        fmt_pct(trailer.metrics.open_rate),
        fmt_pct(left.metrics.click_through_rate),
        fmt_pct(right.metrics.click_through_rate),
        fmt_pct(left.metrics.adoption_rate),
        fmt_pct(right.metrics.adoption_rate),
    )
}

/// Narrative for a dimensional breakdown.
pub fn breakdown_narrative(
    dimension_label: &str,
    groups: &BTreeMap<String, FunnelMetrics>,
) -> String {
    let best = groups
        .iter()
        .max_by(|a, b| {
            a.1.open_rate
                .partial_cmp(&b.1.open_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(name, m)| format!("{name} leads on open rate at {}", fmt_pct(m.open_rate)));

    match best {
        Some(leader) => format!(
            "Funnel by {dimension_label} across {} groups; {leader}.",
            groups.len()
        ),
        None => format!("No {dimension_label} groups found."),
    }
}

/// Narrative for a trend series.
pub fn trend_narrative(points: &[TrendPoint]) -> String {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 1 => {
            let direction = if last.metrics.open_rate >= first.metrics.open_rate {
                "up"
            } else {
                "down"
            };
            format!(
                "Open rate is {direction} from {} in {} to {} in {} across {} periods.",
                fmt_pct(first.metrics.open_rate),
                first.period,
                fmt_pct(last.metrics.open_rate),
                last.period,
                points.len()
            )
        }
        (Some(only), _) => format!(
            "Only one period with data ({}): open rate {}.",
            only.period,
            fmt_pct(only.metrics.open_rate)
        ),
        _ => "No periods with data found.".to_string(),
    }
}

fn fmt_count(n: u64) -> String {
    // thousands separators, e.g. 1234567 -> 1,234,567
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn fmt_pct(rate: f64) -> String {
    format!("{rate:.1}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_count() {
        assert_eq!(fmt_count(0), "0");
        assert_eq!(fmt_count(999), "999");
        assert_eq!(fmt_count(1000), "1,000");
        assert_eq!(fmt_count(1234567), "1,234,567");
    }

    #[test]
    fn test_funnel_narrative_mentions_assumed_quarter() {
        let m = FunnelMetrics::from_counts(100, 40, 10, 0);
        let text = funnel_narrative("Funnel for LPW Path", &m, Some("Q3"));
        assert!(text.contains("100 deliveries"));
        assert!(text.contains("40.0%"));
        assert!(text.contains("Assuming the current quarter (Q3)"));

        let text = funnel_narrative("Funnel for LPW Path", &m, None);
        assert!(!text.contains("Assuming"));
    }

    #[test]
    fn test_comparison_narrative_names_leader() {
        let left = NamedFunnel {
            name: "ASG Primary Path".to_string(),
            metrics: FunnelMetrics::from_counts(100, 60, 10, 2),
        };
        let right = NamedFunnel {
            name: "LPW Path".to_string(),
            metrics: FunnelMetrics::from_counts(100, 40, 10, 2),
        };
        let text = comparison_narrative(&left, &right);
        assert!(text.contains("ASG Primary Path leads on open rate"));
    }

    #[test]
    fn test_visualization_serde_tag() {
        let viz = Visualization::Funnel {
            title: "t".to_string(),
            metrics: FunnelMetrics::empty(),
        };
        let json = serde_json::to_value(&viz).expect("serialize");
        assert_eq!(json["kind"], "funnel");
    }
}
