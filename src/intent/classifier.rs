//! Keyword classifier for the primary intent kind.
//!
//! First match wins, evaluated in a fixed priority order, because the
//! keyword sets overlap: "compare ASG with LPW by region" carries both
//! comparison and breakdown signal and must classify as a comparison.
//!
//! Order: comparison > trend > breakdown > funnel lookup > general.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use super::time::extract_time_scope;
use super::{IntentKind, QueryIntent};
use crate::resolver::normalize::normalize_text;
use crate::resolver::ResolvedEntities;
use crate::schema::Dimension;

const COMPARISON_KEYWORDS: &[&str] = &["vs", "versus", "compare", "compared", "against"];

const TREND_KEYWORDS: &[&str] = &[
    "trend",
    "over time",
    "month over month",
    "timeline",
    "progression",
];

/// Funnel-stage vocabulary that marks a lookup even without entities.
const FUNNEL_KEYWORDS: &[&str] = &[
    "funnel",
    "deliveries",
    "delivered",
    "deliver",
    "opens",
    "opened",
    "open",
    "clicks",
    "clicked",
    "click",
    "adoptions",
    "adoption",
    "adopted",
    "conversion",
    "conversions",
    "engagement",
    "performance",
    "metrics",
];

fn breakdown_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:broken\s+down\s+by|breakdown\s+by|by)\s+([a-z]+)\b")
            .expect("valid breakdown regex")
    })
}

/// Classify one user turn.
///
/// `entities` must already be resolved; the classifier never does its own
/// lookups. Time extraction is independent of the primary kind and always
/// attempted.
pub fn classify(text: &str, entities: &ResolvedEntities, today: NaiveDate) -> QueryIntent {
    let norm = normalize_text(text, false);
    let breakdowns = requested_breakdowns(&norm);
    let time = extract_time_scope(text, today);

    let kind = if has_comparison_signal(&norm, entities) {
        IntentKind::Comparison
    } else if TREND_KEYWORDS.iter().any(|k| contains_phrase(&norm, k)) {
        IntentKind::Trend
    } else if !breakdowns.is_empty() {
        IntentKind::Breakdown
    } else if has_funnel_signal(&norm, entities) {
        IntentKind::Funnel
    } else {
        IntentKind::General
    };

    debug!(kind = kind.name(), breakdowns = breakdowns.len(), "classified");

    QueryIntent {
        kind,
        entities: entities.clone(),
        breakdowns,
        time,
    }
}

fn has_comparison_signal(norm: &str, entities: &ResolvedEntities) -> bool {
    if COMPARISON_KEYWORDS.iter().any(|k| contains_phrase(norm, k)) {
        return true;
    }
    // "<entity> with <entity>": two distinct mentions joined by "with"
    contains_phrase(norm, "with") && distinct_mentions(entities) >= 2
}

fn has_funnel_signal(norm: &str, entities: &ResolvedEntities) -> bool {
    FUNNEL_KEYWORDS.iter().any(|k| contains_phrase(norm, k)) || !entities.is_empty()
}

/// Count distinct comparable mentions (programs and lessons grouped by
/// their matched span, so an umbrella fan-out is one mention).
pub fn distinct_mentions(entities: &ResolvedEntities) -> usize {
    let mut spans: Vec<&str> = Vec::new();
    for entity in entities.programs.iter().chain(&entities.lessons) {
        if !spans.contains(&entity.raw.as_str()) {
            spans.push(&entity.raw);
        }
    }
    spans.len()
}

/// "by <token>" phrases mapped through the fixed dimension table.
fn requested_breakdowns(norm: &str) -> Vec<Dimension> {
    let mut dims: Vec<Dimension> = Vec::new();
    for caps in breakdown_re().captures_iter(norm) {
        if let Some(dim) = caps.get(1).and_then(|m| Dimension::parse(m.as_str())) {
            if !dims.contains(&dim) {
                dims.push(dim);
            }
        }
    }
    dims
}

/// Whole-word phrase containment over normalized text.
fn contains_phrase(norm: &str, phrase: &str) -> bool {
    let padded = format!(" {norm} ");
    padded.contains(&format!(" {phrase} "))
}
