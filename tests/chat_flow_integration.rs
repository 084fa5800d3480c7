//! Integration test: full chat turns through the public API.
//!
//! Exercises the whole call chain (resolve -> classify -> build -> validate
//! -> execute -> aggregate -> format) against an in-memory store, so it
//! runs without a database.
//!
//! Run:
//! ```bash
//! cargo test --test chat_flow_integration
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use engage_poc::error::{ExecutionError, ExecutionResult};
use engage_poc::query::validate_read_only;
use engage_poc::store::{EngagementStore, Row};
use engage_poc::{ChatManager, QueryGuardError, Visualization};

/// In-memory store serving canned rows and the live value lists.
struct MemoryStore {
    rows: Vec<Row>,
    executed: AtomicUsize,
}

impl MemoryStore {
    fn new(rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            executed: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EngagementStore for MemoryStore {
    async fn execute(&self, statement: &str) -> ExecutionResult<Vec<Row>> {
        // The executing side enforces the gate independently of the builder.
        validate_read_only(statement).map_err(|e| ExecutionError::Backend {
            message: e.to_string(),
            code: "unsafe_query".to_string(),
        })?;
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }

    async fn distinct_values(&self, column: &str) -> ExecutionResult<Vec<String>> {
        let values: &[&str] = match column {
            "program_name" => &[
                "ASG Primary Path",
                "ASG Onboarding Path",
                "ASG Win-Back Path",
                "LPW Path",
                "Digital Nurture Path",
            ],
            "region" => &["AMER", "EMEA", "APAC", "LATAM"],
            "lesson_name" => &["Getting Started"],
            _ => &[],
        };
        Ok(values.iter().map(|s| s.to_string()).collect())
    }
}

fn labeled_rows() -> Vec<Row> {
    [("Deliveries", 100), ("Opens", 40), ("Clicks", 10)]
        .iter()
        .map(|(category, count)| {
            json!({"category": category, "total_customers": count})
                .as_object()
                .expect("row object")
                .clone()
        })
        .collect()
}

#[tokio::test]
async fn funnel_lookup_produces_canonical_metrics() {
    let store = MemoryStore::new(labeled_rows());
    let mut manager = ChatManager::new(store.clone());

    let response = manager.handle("Show the LPW Path funnel").await;

    let metrics = match response.visualization {
        Some(Visualization::Funnel { metrics, .. }) => metrics,
        other => panic!("expected funnel visualization, got {other:?}"),
    };
    assert_eq!(metrics.deliveries, 100);
    assert_eq!(metrics.opens, 40);
    assert_eq!(metrics.clicks, 10);
    assert_eq!(metrics.adoptions, 0);
    assert_eq!(metrics.open_rate, 40.0);
    assert_eq!(metrics.click_through_rate, 10.0);
    assert_eq!(metrics.click_through_open_rate, 25.0);
    assert_eq!(metrics.adoption_rate, 0.0);
    assert_eq!(store.executed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn comparison_fetches_two_independent_funnels() {
    let store = MemoryStore::new(labeled_rows());
    let mut manager = ChatManager::new(store.clone());

    let response = manager.handle("Compare ASG Primary Path with LPW Path").await;

    assert_eq!(store.executed.load(Ordering::SeqCst), 2);
    match response.visualization {
        Some(Visualization::Comparison { left, right }) => {
            assert_eq!(left.name, "ASG Primary Path");
            assert_eq!(right.name, "LPW Path");
        }
        other => panic!("expected comparison visualization, got {other:?}"),
    }
    assert!(response.narrative.contains("ASG Primary Path"));
    assert!(response.narrative.contains("LPW Path"));
}

#[tokio::test]
async fn unrecognized_question_gets_help_not_execution() {
    let store = MemoryStore::new(labeled_rows());
    let mut manager = ChatManager::new(store.clone());

    let response = manager.handle("show regions").await;

    assert_eq!(store.executed.load(Ordering::SeqCst), 0);
    assert!(response.visualization.is_none());
    assert!(!response.narrative.is_empty());
    assert!(!response.suggestions.is_empty());
}

#[tokio::test]
async fn breakdown_normalizes_missing_dimension_to_unknown() {
    let rows: Vec<Row> = [
        (Some("AMER"), 100i64, 40i64, 10i64, 2i64),
        (Some("EMEA"), 80, 20, 5, 1),
        (Some("APAC"), 60, 12, 3, 0),
        (None, 10, 2, 0, 0),
    ]
    .iter()
    .map(|(region, d, o, c, a)| {
        json!({
            "dimension_value": region,
            "deliveries": d,
            "opens": o,
            "clicks": c,
            "adoptions": a
        })
        .as_object()
        .expect("row object")
        .clone()
    })
    .collect();

    let store = MemoryStore::new(rows);
    let mut manager = ChatManager::new(store.clone());

    let response = manager.handle("ASG funnel broken down by region").await;

    match response.visualization {
        Some(Visualization::Breakdown { dimension, groups }) => {
            assert_eq!(dimension, "region");
            assert_eq!(groups.len(), 4);
            assert!(groups.contains_key("Unknown"));
            assert_eq!(groups["AMER"].deliveries, 100);
            assert_eq!(groups["Unknown"].deliveries, 10);
        }
        other => panic!("expected breakdown visualization, got {other:?}"),
    }
}

#[tokio::test]
async fn store_side_gate_rejects_piggybacked_statement() {
    let store = MemoryStore::new(labeled_rows());

    let err = store
        .execute("select * from t; DROP TABLE t")
        .await
        .expect_err("must reject");
    assert!(err.to_string().contains("drop"));
}

#[test]
fn validator_rejects_mutating_verb_with_leading_whitespace() {
    let err = validate_read_only("   DELETE FROM \"Engagement_Data\"").expect_err("must reject");
    assert!(matches!(err, QueryGuardError::NotReadOnly { .. }));
}
