//! LLM query planning with defensive JSON extraction.
//!
//! The generator is prompted to answer with a single JSON object, but it
//! may wrap its answer in prose or markdown fences. Extraction locates the
//! first balanced `{...}` or `[...]` span; parse or extraction failure is
//! a [`PlanningError`] that callers repair with the hardcoded default
//! plan. Plan values are only trusted after membership validation against
//! the live distinct-value sets.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use super::providers::LlmClient;
use crate::aliases::{PROGRAM_ALIASES, REGION_ALIASES};
use crate::error::PlanningError;
use crate::intent::{IntentKind, QueryIntent, TimeScope};
use crate::query::{builder::default_plan, QueryPlan, SafeQueryBuilder};
use crate::resolver::{EntityKind, MatchSource, ResolvedEntities, ResolvedEntity};
use crate::schema::{columns, Dimension, TABLE_NAME};

/// The JSON shape the generator is asked to produce.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LlmQueryPlan {
    #[serde(default)]
    pub intent_summary: String,
    #[serde(default)]
    pub programs: Vec<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub quarter: Option<String>,
    #[serde(default)]
    pub breakdown: Option<String>,
}

/// Locate the first balanced `{...}` or `[...]` span in free text.
///
/// Tracks string literals and escapes so braces inside quoted values do
/// not unbalance the scan. Returns `None` when no balanced span exists.
pub fn extract_json_span(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find(['{', '['])?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Produces query plans by prompting the narrative generator.
pub struct QueryPlanner {
    llm: LlmClient,
}

impl QueryPlanner {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Ask the generator for a plan and validate it against the live
    /// value sets.
    pub async fn plan(
        &self,
        question: &str,
        live_programs: &[String],
        live_regions: &[String],
        today: NaiveDate,
    ) -> Result<QueryPlan, PlanningError> {
        let system_prompt = build_system_prompt(live_programs);
        let user_prompt = format!(
            "Plan the aggregation for this question:\n\n{question}\n\nRespond with JSON only."
        );

        let response = self
            .llm
            .generate(&system_prompt, &user_prompt)
            .await
            .map_err(|e| PlanningError::Provider(e.to_string()))?;

        let raw_plan = parse_plan(&response.content)?;
        debug!(?raw_plan, "LLM plan parsed");

        let intent = repair_plan(raw_plan, live_programs, live_regions, today);
        Ok(SafeQueryBuilder::plan(&intent))
    }

    /// Like [`plan`](Self::plan), but planning failures are repaired with
    /// the hardcoded default plan instead of propagating.
    pub async fn plan_or_default(
        &self,
        question: &str,
        live_programs: &[String],
        live_regions: &[String],
        today: NaiveDate,
    ) -> QueryPlan {
        match self
            .plan(question, live_programs, live_regions, today)
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                warn!("planning failed ({e}), substituting default plan");
                default_plan()
            }
        }
    }
}

/// Parse the generator's free-text answer into a plan.
pub fn parse_plan(content: &str) -> Result<LlmQueryPlan, PlanningError> {
    let span = extract_json_span(content).ok_or(PlanningError::NoJsonPayload)?;
    Ok(serde_json::from_str(span)?)
}

/// Keep only plan values that exist in the live sets; everything else is
/// dropped rather than passed through to a statement.
fn repair_plan(
    plan: LlmQueryPlan,
    live_programs: &[String],
    live_regions: &[String],
    today: NaiveDate,
) -> QueryIntent {
    let programs: Vec<ResolvedEntity> = plan
        .programs
        .iter()
        .filter_map(|name| canonicalize(name, live_programs))
        .map(|canonical| ResolvedEntity {
            raw: canonical.to_lowercase(),
            canonical,
            kind: EntityKind::Program,
            source: MatchSource::Fuzzy,
        })
        .collect();

    let region = plan
        .region
        .as_deref()
        .and_then(|name| canonicalize(name, live_regions))
        .map(|canonical| ResolvedEntity {
            raw: canonical.to_lowercase(),
            canonical,
            kind: EntityKind::Region,
            source: MatchSource::Fuzzy,
        });

    let time = match plan.quarter.as_deref().map(str::trim) {
        Some(q) if matches!(q.to_uppercase().as_str(), "Q1" | "Q2" | "Q3" | "Q4") => {
            TimeScope::Explicit {
                quarter: q.to_uppercase(),
            }
        }
        Some("current") => TimeScope::AssumedCurrent {
            quarter: crate::intent::time::quarter_of(today),
        },
        _ => TimeScope::Unbounded,
    };

    let breakdowns: Vec<Dimension> = plan
        .breakdown
        .as_deref()
        .and_then(Dimension::parse)
        .into_iter()
        .collect();

    QueryIntent {
        kind: if breakdowns.is_empty() {
            IntentKind::Funnel
        } else {
            IntentKind::Breakdown
        },
        entities: ResolvedEntities {
            programs,
            region,
            lessons: vec![],
        },
        breakdowns,
        time,
    }
}

/// Resolve a proposed value to its live spelling, case-insensitively.
fn canonicalize(name: &str, live: &[String]) -> Option<String> {
    live.iter()
        .find(|v| v.eq_ignore_ascii_case(name.trim()))
        .cloned()
}

/// System prompt carrying the schema and alias tables.
fn build_system_prompt(live_programs: &[String]) -> String {
    let program_aliases: Vec<String> = PROGRAM_ALIASES
        .iter()
        .map(|(alias, canonicals)| format!("  - \"{alias}\" -> {}", canonicals.join(", ")))
        .collect();
    let region_aliases: Vec<String> = REGION_ALIASES
        .iter()
        .map(|(alias, canonical)| format!("  - \"{alias}\" -> {canonical}"))
        .collect();

    format!(
        r#"You are a query planner for a marketing-engagement analytics assistant.

Your task is to translate one user question into a JSON aggregation plan.
You do NOT write SQL. You output JSON naming the slice of data to fetch.

TABLE: "{table}" - one row per customer event, columns:
  {count} (integer), {category} (text funnel stage label), {program} (text),
  {region} (text), {quarter} (text, Q1-Q4), {date} (date), country, language,
  spend_tier, assignment_status, product, campaign_id, lesson_name

KNOWN PROGRAMS:
{programs}

PROGRAM ALIASES:
{program_aliases}

REGION ALIASES:
{region_aliases}

OUTPUT FORMAT (JSON only, no markdown code blocks):
{{
  "intent_summary": "Funnel for ASG Primary Path in AMER",
  "programs": ["ASG Primary Path"],
  "region": "AMER",
  "quarter": "Q3",
  "breakdown": null
}}

RULES:
1. Only use program and region names from the lists above
2. "quarter" is Q1-Q4, "current", or null for all time
3. "breakdown" is one of region, quarter, program, product, country, language, tier - or null
4. Output VALID JSON only - no markdown, no explanation outside JSON
"#,
        table = TABLE_NAME,
        count = columns::CUSTOMER_COUNT,
        category = columns::CATEGORY,
        program = columns::PROGRAM_NAME,
        region = columns::REGION,
        quarter = columns::QUARTER,
        date = columns::EVENT_DATE,
        programs = live_programs
            .iter()
            .map(|p| format!("  - {p}"))
            .collect::<Vec<_>>()
            .join("\n"),
        program_aliases = program_aliases.join("\n"),
        region_aliases = region_aliases.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_clean_json() {
        let text = r#"{"programs": ["LPW Path"]}"#;
        assert_eq!(extract_json_span(text), Some(text));
    }

    #[test]
    fn test_extract_json_wrapped_in_prose() {
        let text = r#"Here is the plan you asked for:

{"intent_summary": "Funnel", "programs": ["LPW Path"], "region": null}

Let me know if you need anything else."#;
        let span = extract_json_span(text).expect("span");
        assert!(span.starts_with('{'));
        assert!(span.ends_with('}'));
        let plan: LlmQueryPlan = serde_json::from_str(span).expect("parse");
        assert_eq!(plan.programs, vec!["LPW Path"]);
    }

    #[test]
    fn test_extract_ignores_braces_inside_strings() {
        let text = r#"{"intent_summary": "weird {label} here", "programs": []}"#;
        assert_eq!(extract_json_span(text), Some(text));
    }

    #[test]
    fn test_extract_array_span() {
        let text = r#"noise ["a", "b"] trailing"#;
        assert_eq!(extract_json_span(text), Some(r#"["a", "b"]"#));
    }

    #[test]
    fn test_extract_unbalanced_is_none() {
        assert_eq!(extract_json_span(r#"{"oops": "#), None);
        assert_eq!(extract_json_span("no json here"), None);
    }

    #[test]
    fn test_parse_markdown_fenced_json() {
        let content = "```json\n{\"programs\": [\"LPW Path\"], \"quarter\": \"Q2\"}\n```";
        let plan = parse_plan(content).expect("parse");
        assert_eq!(plan.quarter.as_deref(), Some("Q2"));
    }

    #[test]
    fn test_parse_failure_kinds() {
        assert!(matches!(
            parse_plan("nothing useful"),
            Err(PlanningError::NoJsonPayload)
        ));
        assert!(matches!(
            parse_plan(r#"{"programs": 7}"#),
            Err(PlanningError::MalformedPlan(_))
        ));
    }

    #[test]
    fn test_repair_drops_unknown_values() {
        let live_programs = vec!["LPW Path".to_string()];
        let live_regions = vec!["AMER".to_string()];
        let plan = LlmQueryPlan {
            intent_summary: "x".to_string(),
            programs: vec!["LPW Path".to_string(), "Invented Program".to_string()],
            region: Some("Atlantis".to_string()),
            quarter: Some("Q9".to_string()),
            breakdown: None,
        };
        let today = NaiveDate::from_ymd_opt(2025, 8, 15).expect("date");
        let intent = repair_plan(plan, &live_programs, &live_regions, today);
        assert_eq!(intent.entities.program_names(), vec!["LPW Path"]);
        assert!(intent.entities.region.is_none());
        assert_eq!(intent.time, TimeScope::Unbounded);
    }

    #[test]
    fn test_repair_canonicalizes_case() {
        let live_programs = vec!["LPW Path".to_string()];
        let plan = LlmQueryPlan {
            programs: vec!["lpw path".to_string()],
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2025, 8, 15).expect("date");
        let intent = repair_plan(plan, &live_programs, &[], today);
        assert_eq!(intent.entities.program_names(), vec!["LPW Path"]);
    }

    #[test]
    fn test_repair_breakdown_kind() {
        let plan = LlmQueryPlan {
            breakdown: Some("region".to_string()),
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2025, 8, 15).expect("date");
        let intent = repair_plan(plan, &[], &[], today);
        assert_eq!(intent.kind, IntentKind::Breakdown);
        assert_eq!(intent.breakdowns, vec![Dimension::Region]);
    }
}
