//! Per-turn orchestration: the chat call chain.
//!
//! One turn is a short-lived, stateless pipeline: resolve entities ->
//! classify intent -> build a safe plan -> validate -> execute (bounded
//! timeout) -> aggregate -> format. The only state that survives a turn
//! is the session's rolling conversation memory.
//!
//! Failure policy per class: resolution misses fall back to suggestions,
//! planning failures are repaired with the default plan, execution
//! failures degrade to an apologetic answer with alternatives, and safety
//! violations are hard stops. Nothing here terminates the process.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::ai::QueryPlanner;
use crate::error::{ChatError, ChatResult, ExecutionError};
use crate::funnel::{parse_rows, reduce, reduce_by_dimension, FunnelMetrics};
use crate::intent::{classify, IntentKind, QueryIntent, TimeScope};
use crate::query::{builder, comparison_plans, validate_read_only, QueryPlan};
use crate::resolver::{
    suggest::closest_matches, EntityKind, EntityResolver, MatchSource, ResolvedEntities,
    ResolvedEntity,
};
use crate::response::{
    breakdown_narrative, comparison_narrative, funnel_narrative, trend_narrative, ChatResponse,
    NamedFunnel, TrendPoint, Visualization,
};
use crate::schema::columns;
use crate::session::{ConversationMemory, TurnRecord};
use crate::store::{EngagementStore, Row};

/// Bound on one external query execution
pub const QUERY_TIMEOUT_SECS: u64 = 30;

/// Owns the call chain for one chat session.
pub struct ChatManager {
    store: Arc<dyn EngagementStore>,
    resolver: EntityResolver,
    planner: Option<QueryPlanner>,
    memory: ConversationMemory,
}

impl ChatManager {
    pub fn new(store: Arc<dyn EngagementStore>) -> Self {
        Self {
            resolver: EntityResolver::new(store.clone()),
            store,
            planner: None,
            memory: ConversationMemory::new(),
        }
    }

    /// Attach an LLM planner for questions the deterministic resolver
    /// cannot pin to an entity.
    pub fn with_planner(store: Arc<dyn EngagementStore>, planner: QueryPlanner) -> Self {
        Self {
            resolver: EntityResolver::new(store.clone()),
            store,
            planner: Some(planner),
            memory: ConversationMemory::new(),
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Answer one user turn.
    pub async fn handle(&mut self, question: &str) -> ChatResponse {
        self.handle_at(question, Utc::now().date_naive()).await
    }

    /// Answer one user turn with an injectable "today" (for tests and
    /// replay).
    pub async fn handle_at(&mut self, question: &str, today: NaiveDate) -> ChatResponse {
        let mut entities = self.resolver.resolve(question).await;
        self.apply_carry_over(question, &mut entities, today);

        let intent = classify(question, &entities, today);
        info!(kind = intent.kind.name(), "handling turn");

        let response = match intent.kind {
            IntentKind::General => self.general_response().await,
            IntentKind::Comparison => self.comparison_response(&intent).await,
            IntentKind::Breakdown => self.breakdown_response(&intent).await,
            IntentKind::Trend => self.trend_response(&intent).await,
            IntentKind::Funnel => self.funnel_response(question, &intent, today).await,
        };

        self.memory.remember(TurnRecord {
            question: question.to_string(),
            kind: intent.kind,
            programs: intent.entities.program_names(),
            region: intent.entities.region_name().map(|s| s.to_string()),
            time: intent.time.clone(),
            asked_at: Utc::now(),
        });

        response
    }

    /// Reuse the previous turn's programs for an elliptical follow-up
    /// ("what about EMEA?", "and in Q4?") that names a scope but no
    /// program.
    fn apply_carry_over(
        &self,
        question: &str,
        entities: &mut ResolvedEntities,
        today: NaiveDate,
    ) {
        if !entities.programs.is_empty() || !entities.lessons.is_empty() {
            return;
        }
        let time = crate::intent::extract_time_scope(question, today);
        let has_anchor = entities.region.is_some() || time != TimeScope::Unbounded;
        if !has_anchor {
            return;
        }
        if let Some(programs) = self.memory.last_programs() {
            entities.programs = programs
                .iter()
                .map(|name| ResolvedEntity {
                    raw: name.to_lowercase(),
                    canonical: name.clone(),
                    kind: EntityKind::Program,
                    source: MatchSource::Memory,
                })
                .collect();
            info!("carried {} program(s) over from memory", entities.programs.len());
        }
    }

    // -------------------------------------------------------------------
    // Intent branches
    // -------------------------------------------------------------------

    /// Help response - never empty, never an execution attempt.
    async fn general_response(&self) -> ChatResponse {
        let programs = self.live_values(columns::PROGRAM_NAME).await;

        let mut narrative = String::from(
            "I can answer questions about engagement funnels: deliveries, opens, \
             clicks, and adoptions for a program, region, or quarter.",
        );
        if !programs.is_empty() {
            narrative.push_str(&format!(
                " Programs I know about: {}.",
                programs.join(", ")
            ));
        }

        ChatResponse::text_only(narrative, example_prompts(&programs))
    }

    async fn funnel_response(
        &self,
        question: &str,
        intent: &QueryIntent,
        today: NaiveDate,
    ) -> ChatResponse {
        let plan = if intent.entities.is_empty() {
            match &self.planner {
                Some(planner) => {
                    let live_programs = self.live_values(columns::PROGRAM_NAME).await;
                    let live_regions = self.live_values(columns::REGION).await;
                    planner
                        .plan_or_default(question, &live_programs, &live_regions, today)
                        .await
                }
                None => builder::build_plan(intent),
            }
        } else {
            builder::build_plan(intent)
        };

        let rows = match self.run_plan(&plan).await {
            Ok(rows) => rows,
            Err(e) => return self.degraded_response(&e).await,
        };

        let metrics = reduce(&parse_rows(&rows));
        if rows.is_empty() || metrics.is_empty() {
            return self.no_data_response(&plan, intent).await;
        }

        let assumed = if intent.time.is_assumed() {
            intent.time.quarter()
        } else {
            None
        };

        ChatResponse {
            narrative: funnel_narrative(&plan.summary, &metrics, assumed),
            visualization: Some(Visualization::Funnel {
                title: plan.summary.clone(),
                metrics,
            }),
            suggestions: funnel_followups(&plan),
        }
    }

    async fn comparison_response(&self, intent: &QueryIntent) -> ChatResponse {
        let plans = comparison_plans(intent);

        if plans.len() < 2 {
            // One side of the comparison is missing: report the single
            // match and prompt for a second.
            let narrative = match plans.first() {
                Some((operand, _)) => format!(
                    "I found {} but need a second program to compare it with. \
                     Which one should I use?",
                    operand.display_name()
                ),
                None => "I could not match either side of that comparison to a \
                         known program. Which programs should I compare?"
                    .to_string(),
            };
            let programs = self.live_values(columns::PROGRAM_NAME).await;
            return ChatResponse::text_only(narrative, example_prompts(&programs));
        }

        let (left_operand, left_plan) = &plans[0];
        let (right_operand, right_plan) = &plans[1];

        // The two fetches are independent; issue them concurrently and
        // join before formatting.
        let (left_result, right_result) = tokio::join!(
            self.fetch_metrics(left_plan),
            self.fetch_metrics(right_plan)
        );

        let (left_metrics, right_metrics) = match (left_result, right_result) {
            (Ok(l), Ok(r)) => (l, r),
            (Err(e), _) | (_, Err(e)) => {
                warn!("comparison fetch failed: {e}");
                return self.degraded_response(&e).await;
            }
        };

        let left = NamedFunnel {
            name: left_operand.display_name(),
            metrics: left_metrics,
        };
        let right = NamedFunnel {
            name: right_operand.display_name(),
            metrics: right_metrics,
        };

        let narrative = comparison_narrative(&left, &right);
        let suggestions = vec![
            format!("Break {} down by region", left.name),
            format!("Show the {} trend over time", right.name),
        ];

        ChatResponse {
            narrative,
            visualization: Some(Visualization::Comparison { left, right }),
            suggestions,
        }
    }

    async fn breakdown_response(&self, intent: &QueryIntent) -> ChatResponse {
        let plan = builder::build_plan(intent);

        let rows = match self.run_plan(&plan).await {
            Ok(rows) => rows,
            Err(e) => return self.degraded_response(&e).await,
        };

        let groups = reduce_by_dimension(&parse_rows(&rows));
        if groups.is_empty() {
            return self.no_data_response(&plan, intent).await;
        }

        let dimension = intent
            .primary_breakdown()
            .unwrap_or(crate::schema::Dimension::Region);

        ChatResponse {
            narrative: breakdown_narrative(dimension.label(), &groups),
            visualization: Some(Visualization::Breakdown {
                dimension: dimension.label().to_string(),
                groups,
            }),
            suggestions: funnel_followups(&plan),
        }
    }

    async fn trend_response(&self, intent: &QueryIntent) -> ChatResponse {
        let plan = builder::build_plan(intent);

        let rows = match self.run_plan(&plan).await {
            Ok(rows) => rows,
            Err(e) => return self.degraded_response(&e).await,
        };

        let groups = reduce_by_dimension(&parse_rows(&rows));
        if groups.is_empty() {
            return self.no_data_response(&plan, intent).await;
        }

        // BTreeMap keys sort Q1 < Q2 < Q3 < Q4 (and push Unknown last)
        let points: Vec<TrendPoint> = groups
            .into_iter()
            .map(|(period, metrics)| TrendPoint { period, metrics })
            .collect();

        ChatResponse {
            narrative: trend_narrative(&points),
            visualization: Some(Visualization::Trend { points }),
            suggestions: funnel_followups(&plan),
        }
    }

    // -------------------------------------------------------------------
    // Execution and degraded paths
    // -------------------------------------------------------------------

    /// Validate and execute one plan with a bounded timeout.
    async fn run_plan(&self, plan: &QueryPlan) -> ChatResult<Vec<Row>> {
        validate_read_only(&plan.statement)?;

        match timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECS),
            self.store.execute(&plan.statement),
        )
        .await
        {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) => Err(ChatError::Execution(e)),
            Err(_) => Err(ChatError::Execution(ExecutionError::Timeout {
                seconds: QUERY_TIMEOUT_SECS,
            })),
        }
    }

    async fn fetch_metrics(&self, plan: &QueryPlan) -> ChatResult<FunnelMetrics> {
        let rows = self.run_plan(plan).await?;
        Ok(reduce(&parse_rows(&rows)))
    }

    /// Zero rows is not a failure: distinguish "no data at all" from a
    /// filter mismatch by re-issuing with the time filter relaxed.
    async fn no_data_response(&self, plan: &QueryPlan, intent: &QueryIntent) -> ChatResponse {
        let mut narrative = format!("No engagement data found for {}.", plan.summary);

        if intent.time.quarter().is_some() {
            let mut relaxed_intent = intent.clone();
            relaxed_intent.time = TimeScope::Unbounded;
            let relaxed_plan = builder::build_plan(&relaxed_intent);
            if let Ok(rows) = self.run_plan(&relaxed_plan).await {
                let all_time = reduce(&parse_rows(&rows));
                if !all_time.is_empty() {
                    narrative.push_str(
                        " There is data for this slice outside the selected period - \
                         try widening the time range.",
                    );
                }
            }
        }

        let programs = self.live_values(columns::PROGRAM_NAME).await;
        let mut suggestions = example_prompts(&programs);
        if let Some(first_entity) = plan.entities.first() {
            for (name, _) in closest_matches(first_entity, &programs, 2) {
                let prompt = format!("Show the {name} funnel");
                if !suggestions.contains(&prompt) {
                    suggestions.insert(0, prompt);
                }
            }
        }

        ChatResponse::text_only(narrative, suggestions)
    }

    /// Degraded answer for execution failures; safety violations keep
    /// their blocking character.
    async fn degraded_response(&self, error: &ChatError) -> ChatResponse {
        match error {
            ChatError::Guard(guard) => ChatResponse::text_only(
                format!("That query was blocked before execution: {guard}."),
                vec![],
            ),
            _ => {
                let programs = self.live_values(columns::PROGRAM_NAME).await;
                ChatResponse::text_only(
                    format!(
                        "Sorry - I could not fetch that right now ({error}). \
                         Please try again, or try a different slice."
                    ),
                    example_prompts(&programs),
                )
            }
        }
    }

    /// Live distinct values, degrading to empty on failure.
    async fn live_values(&self, column: &str) -> Vec<String> {
        match self.store.distinct_values(column).await {
            Ok(values) => values,
            Err(e) => {
                warn!("distinct-value lookup for {column} failed: {e}");
                vec![]
            }
        }
    }
}

fn example_prompts(programs: &[String]) -> Vec<String> {
    let mut prompts = vec![
        "Show the ASG funnel for this quarter".to_string(),
        "Compare ASG Primary Path with LPW Path".to_string(),
        "Break down clicks by region".to_string(),
    ];
    if let Some(first) = programs.first() {
        prompts.push(format!("Show the {first} funnel"));
    }
    prompts
}

fn funnel_followups(plan: &QueryPlan) -> Vec<String> {
    match plan.entities.first() {
        Some(entity) => vec![
            format!("Break {entity} down by region"),
            format!("Show the {entity} trend over time"),
        ],
        None => vec!["Break it down by region".to_string()],
    }
}
