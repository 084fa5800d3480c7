//! Assembles read-only aggregation statements from resolved intents.
//!
//! Two canonical shapes:
//! - plain lookup: category grouped, counts summed, filtered by the
//!   resolved entities;
//! - breakdown/trend: pivoted conditional sums per funnel stage, one
//!   complete funnel record per dimension value, so no second aggregation
//!   pass is needed downstream.
//!
//! Filter values only ever come from the live-validated entity sets, and
//! the table name is always identifier-quoted. Every emitted statement is
//! run through the read-only gate before it leaves this module; if plan
//! construction fails anyway, the hardcoded default plan is returned so
//! the user always gets some answer.

use std::collections::BTreeMap;

use tracing::warn;

use super::safety::validate_read_only;
use super::{QueryPlan, VizKind};
use crate::error::GuardResult;
use crate::intent::{ComparisonOperand, IntentKind, QueryIntent, TimeScope};
use crate::schema::{columns, escape_literal, quoted_table, Dimension};

/// Known-good fallback slice, used when plan construction fails.
pub const DEFAULT_PROGRAM: &str = "ASG Primary Path";
pub const DEFAULT_REGION: &str = "AMER";

/// Stage pivot predicates, shared by the builder and kept in sync with the
/// aggregator's category buckets.
const STAGE_PIVOTS: &[(&str, &str)] = &[
    ("deliveries", "category ILIKE '%deliver%'"),
    ("opens", "category ILIKE '%open%'"),
    ("clicks", "category ILIKE '%click%'"),
    (
        "adoptions",
        "category ILIKE '%adopt%' OR category ILIKE '%convert%' OR category ILIKE '%complete%'",
    ),
];

/// Builds safe aggregation statements for one intent.
pub struct SafeQueryBuilder;

impl SafeQueryBuilder {
    /// Build the plan for a non-comparison intent, falling back to the
    /// default plan if construction fails.
    pub fn plan(intent: &QueryIntent) -> QueryPlan {
        match Self::try_plan(intent) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("plan construction failed ({e}), using default plan");
                default_plan()
            }
        }
    }

    fn try_plan(intent: &QueryIntent) -> GuardResult<QueryPlan> {
        match intent.kind {
            IntentKind::Breakdown => {
                let dimension = intent.primary_breakdown().unwrap_or(Dimension::Region);
                Self::breakdown_plan(intent, dimension, VizKind::GroupedBars)
            }
            IntentKind::Trend => {
                Self::breakdown_plan(intent, Dimension::Quarter, VizKind::TrendLine)
            }
            _ => Self::lookup_plan(intent),
        }
    }

    /// Plain lookup: one funnel slice, grouped by category.
    fn lookup_plan(intent: &QueryIntent) -> GuardResult<QueryPlan> {
        let filters = filters_from_intent(intent, true);
        let statement = format!(
            "SELECT {category}, SUM({count}) AS total_customers FROM {table}{where_clause} GROUP BY {category}",
            category = columns::CATEGORY,
            count = columns::CUSTOMER_COUNT,
            table = quoted_table(),
            where_clause = where_clause(&filters),
        );
        validate_read_only(&statement)?;

        Ok(QueryPlan {
            summary: summarize("Funnel", intent),
            entities: entity_names(intent),
            filters,
            statement,
            visualization: VizKind::Funnel,
        })
    }

    /// Pivoted breakdown: one funnel record per dimension value.
    fn breakdown_plan(
        intent: &QueryIntent,
        dimension: Dimension,
        visualization: VizKind,
    ) -> GuardResult<QueryPlan> {
        // A trend already spreads over quarters; a same-column breakdown
        // would collapse to its own filter, so the quarter filter is
        // dropped in both cases.
        let keep_time = dimension != Dimension::Quarter;
        let filters = filters_from_intent(intent, keep_time);

        let bucket = format!("COALESCE({}, 'Unknown')", dimension.column());
        let pivots: Vec<String> = STAGE_PIVOTS
            .iter()
            .map(|(stage, predicate)| {
                format!(
                    "SUM(CASE WHEN {predicate} THEN {count} ELSE 0 END) AS {stage}",
                    count = columns::CUSTOMER_COUNT,
                )
            })
            .collect();

        let statement = format!(
            "SELECT {bucket} AS dimension_value, {pivots} FROM {table}{where_clause} GROUP BY {bucket} ORDER BY dimension_value",
            pivots = pivots.join(", "),
            table = quoted_table(),
            where_clause = where_clause(&filters),
        );
        validate_read_only(&statement)?;

        Ok(QueryPlan {
            summary: format!(
                "{} by {}",
                summarize("Funnel", intent),
                dimension.label()
            ),
            entities: entity_names(intent),
            filters,
            statement,
            visualization,
        })
    }
}

/// Build the plan for one intent (convenience wrapper).
pub fn build_plan(intent: &QueryIntent) -> QueryPlan {
    SafeQueryBuilder::plan(intent)
}

/// One lookup plan per comparison operand, sharing the intent's region and
/// time filters.
pub fn comparison_plans(intent: &QueryIntent) -> Vec<(ComparisonOperand, QueryPlan)> {
    intent
        .comparison_operands()
        .into_iter()
        .map(|operand| {
            let mut filters: BTreeMap<String, Vec<String>> = BTreeMap::new();
            let column = if operand.is_lesson {
                columns::LESSON_NAME
            } else {
                columns::PROGRAM_NAME
            };
            filters.insert(column.to_string(), operand.names.clone());
            if let Some(region) = intent.entities.region_name() {
                filters.insert(columns::REGION.to_string(), vec![region.to_string()]);
            }
            if let Some(quarter) = intent.time.quarter() {
                filters.insert(columns::QUARTER.to_string(), vec![quarter.to_string()]);
            }

            let statement = format!(
                "SELECT {category}, SUM({count}) AS total_customers FROM {table}{where_clause} GROUP BY {category}",
                category = columns::CATEGORY,
                count = columns::CUSTOMER_COUNT,
                table = quoted_table(),
                where_clause = where_clause(&filters),
            );

            let plan = QueryPlan {
                summary: format!("Funnel for {}", operand.display_name()),
                entities: operand.names.clone(),
                filters,
                statement,
                visualization: VizKind::ComparisonBars,
            };
            (operand, plan)
        })
        .collect()
}

/// The hardcoded known-good plan.
pub fn default_plan() -> QueryPlan {
    let mut filters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    filters.insert(
        columns::PROGRAM_NAME.to_string(),
        vec![DEFAULT_PROGRAM.to_string()],
    );
    filters.insert(columns::REGION.to_string(), vec![DEFAULT_REGION.to_string()]);

    let statement = format!(
        "SELECT {category}, SUM({count}) AS total_customers FROM {table}{where_clause} GROUP BY {category}",
        category = columns::CATEGORY,
        count = columns::CUSTOMER_COUNT,
        table = quoted_table(),
        where_clause = where_clause(&filters),
    );

    QueryPlan {
        summary: format!("Funnel for {DEFAULT_PROGRAM} in {DEFAULT_REGION}"),
        entities: vec![DEFAULT_PROGRAM.to_string()],
        filters,
        statement,
        visualization: VizKind::Funnel,
    }
}

fn filters_from_intent(intent: &QueryIntent, keep_time: bool) -> BTreeMap<String, Vec<String>> {
    let mut filters: BTreeMap<String, Vec<String>> = BTreeMap::new();

    let programs = intent.entities.program_names();
    if !programs.is_empty() {
        filters.insert(columns::PROGRAM_NAME.to_string(), programs);
    }
    let lessons = intent.entities.lesson_names();
    if !lessons.is_empty() {
        filters.insert(columns::LESSON_NAME.to_string(), lessons);
    }
    if let Some(region) = intent.entities.region_name() {
        filters.insert(columns::REGION.to_string(), vec![region.to_string()]);
    }
    if keep_time {
        if let Some(quarter) = intent.time.quarter() {
            filters.insert(columns::QUARTER.to_string(), vec![quarter.to_string()]);
        }
    }

    filters
}

/// Render the WHERE clause in a fixed column order. Single values become
/// equality predicates, multiple values an IN-list.
fn where_clause(filters: &BTreeMap<String, Vec<String>>) -> String {
    // Fixed order keeps generated statements deterministic
    const ORDER: &[&str] = &[
        columns::PROGRAM_NAME,
        columns::LESSON_NAME,
        columns::REGION,
        columns::QUARTER,
    ];

    let mut predicates: Vec<String> = Vec::new();
    for column in ORDER {
        if let Some(values) = filters.get(*column) {
            predicates.push(predicate(column, values));
        }
    }
    // Any remaining filters (LLM-planned secondary dimensions)
    for (column, values) in filters {
        if !ORDER.contains(&column.as_str()) {
            predicates.push(predicate(column, values));
        }
    }

    if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    }
}

fn predicate(column: &str, values: &[String]) -> String {
    if values.len() == 1 {
        format!("{column} = '{}'", escape_literal(&values[0]))
    } else {
        let list: Vec<String> = values
            .iter()
            .map(|v| format!("'{}'", escape_literal(v)))
            .collect();
        format!("{column} IN ({})", list.join(", "))
    }
}

fn entity_names(intent: &QueryIntent) -> Vec<String> {
    let mut names = intent.entities.program_names();
    names.extend(intent.entities.lesson_names());
    names
}

fn summarize(prefix: &str, intent: &QueryIntent) -> String {
    let mut parts: Vec<String> = Vec::new();
    let programs = intent.entities.program_names();
    if !programs.is_empty() {
        parts.push(programs.join(", "));
    }
    let lessons = intent.entities.lesson_names();
    if !lessons.is_empty() {
        parts.push(format!("lesson {}", lessons.join(", ")));
    }
    if let Some(region) = intent.entities.region_name() {
        parts.push(format!("in {region}"));
    }
    match &intent.time {
        TimeScope::Unbounded => {}
        TimeScope::AssumedCurrent { quarter } => parts.push(format!("({quarter}, assumed)")),
        TimeScope::Explicit { quarter } => parts.push(format!("({quarter})")),
    }

    if parts.is_empty() {
        format!("{prefix} across all programs")
    } else {
        format!("{prefix} for {}", parts.join(" "))
    }
}
