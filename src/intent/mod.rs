//! Query intents for the engagement chat core
//!
//! An intent is WHAT slice of the dataset the user asked about, not HOW to
//! fetch it (that is the query builder's job). The primary kind is a
//! CLOSED set - the classifier can only produce these five shapes, and
//! adding a capability means adding a variant here.

pub mod classifier;
pub mod time;

pub use classifier::classify;
pub use time::{extract_time_scope, extract_time_scope_now, TimeScope};

use serde::{Deserialize, Serialize};

use crate::resolver::ResolvedEntities;
use crate::schema::Dimension;

/// The primary query shape. Exactly one per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Two entities side by side
    Comparison,
    /// Metrics across periods
    Trend,
    /// Metrics partitioned by a dimension
    Breakdown,
    /// Single-slice funnel lookup
    Funnel,
    /// Nothing recognized - help/suggestion response
    General,
}

impl IntentKind {
    /// Stable name for logging
    pub fn name(&self) -> &'static str {
        match self {
            IntentKind::Comparison => "comparison",
            IntentKind::Trend => "trend",
            IntentKind::Breakdown => "breakdown",
            IntentKind::Funnel => "funnel",
            IntentKind::General => "general",
        }
    }
}

/// A classified user turn: kind, resolved entities, requested breakdowns,
/// and time scope. Built fresh per turn, immutable once built, never
/// persisted.
#[derive(Debug, Clone)]
pub struct QueryIntent {
    pub kind: IntentKind,
    pub entities: ResolvedEntities,
    pub breakdowns: Vec<Dimension>,
    pub time: TimeScope,
}

impl QueryIntent {
    /// Comparison operands: one group of canonical names per mentioned
    /// entity. An umbrella alias counts as ONE operand even though it
    /// fans out to several canonical programs.
    pub fn comparison_operands(&self) -> Vec<ComparisonOperand> {
        let mut operands: Vec<ComparisonOperand> = Vec::new();
        for entity in self.entities.programs.iter().chain(&self.entities.lessons) {
            match operands.iter_mut().find(|o| o.raw == entity.raw) {
                Some(operand) => {
                    if !operand.names.contains(&entity.canonical) {
                        operand.names.push(entity.canonical.clone());
                    }
                }
                None => operands.push(ComparisonOperand {
                    raw: entity.raw.clone(),
                    label: entity.canonical.clone(),
                    names: vec![entity.canonical.clone()],
                    is_lesson: matches!(
                        entity.kind,
                        crate::resolver::EntityKind::Lesson
                    ),
                }),
            }
        }
        operands
    }

    /// The primary breakdown dimension, if one was requested.
    pub fn primary_breakdown(&self) -> Option<Dimension> {
        self.breakdowns.first().copied()
    }
}

/// One side of a comparison: the mention text plus the canonical names it
/// fanned out to.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonOperand {
    /// The matched text span
    pub raw: String,
    /// Display label (first canonical name)
    pub label: String,
    /// All canonical names in this operand
    pub names: Vec<String>,
    pub is_lesson: bool,
}

impl ComparisonOperand {
    /// Label covering the whole fan-out, e.g. "ASG (3 paths)".
    pub fn display_name(&self) -> String {
        if self.names.len() > 1 {
            format!("{} ({} paths)", self.raw.to_uppercase(), self.names.len())
        } else {
            self.label.clone()
        }
    }
}
