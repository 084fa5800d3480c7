//! Postgres-backed engagement store.
//!
//! The executing side of the pipeline. The read-only gate runs here
//! AGAIN, independently of the builder's client-side check - this layer
//! may be reached by callers other than the chat manager, so the
//! duplication is deliberate.

use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row as SqlxRow};
use tracing::debug;

use crate::error::{ExecutionError, ExecutionResult};
use crate::query::validate_read_only;
use crate::schema::{columns, quoted_table};
use crate::store::{EngagementStore, Row};

/// Best-effort cap on distinct-value samples
const DISTINCT_VALUE_CAP: i64 = 500;

/// Text columns exposed to distinct-value lookups
const LOOKUP_COLUMNS: &[&str] = &[
    columns::CATEGORY,
    columns::PROGRAM_NAME,
    columns::REGION,
    columns::QUARTER,
    columns::COUNTRY,
    columns::LANGUAGE,
    columns::SPEND_TIER,
    columns::ASSIGNMENT_STATUS,
    columns::PRODUCT,
    columns::CAMPAIGN_ID,
    columns::LESSON_NAME,
];

/// [`EngagementStore`] over a Postgres pool.
pub struct PgEngagementStore {
    pool: PgPool,
}

impl PgEngagementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EngagementStore for PgEngagementStore {
    async fn execute(&self, statement: &str) -> ExecutionResult<Vec<Row>> {
        // Server-side gate: reject before touching the pool.
        validate_read_only(statement).map_err(|e| ExecutionError::Backend {
            message: e.to_string(),
            code: "unsafe_query".to_string(),
        })?;

        debug!("executing: {statement}");

        let rows = sqlx::query(statement).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_map).collect())
    }

    async fn distinct_values(&self, column: &str) -> ExecutionResult<Vec<String>> {
        if !LOOKUP_COLUMNS.contains(&column) {
            return Err(ExecutionError::Backend {
                message: format!("column '{column}' is not exposed for value lookup"),
                code: "invalid_column".to_string(),
            });
        }

        let statement = format!(
            "SELECT DISTINCT {column} FROM {table} WHERE {column} IS NOT NULL LIMIT {cap}",
            table = quoted_table(),
            cap = DISTINCT_VALUE_CAP,
        );

        let rows = sqlx::query(&statement).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>(0).ok())
            .collect())
    }
}

/// Flatten one Postgres row into a column->JSON-value map.
fn row_to_map(row: &PgRow) -> Row {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), column_value(row, i));
    }
    map
}

/// Decode one column into JSON, trying the types the aggregation shapes
/// produce. Anything undecodable becomes null and is skipped downstream.
fn column_value(row: &PgRow, index: usize) -> Value {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<i32>, _>(index) {
        return value.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value
            .and_then(|f| Number::from_f64(f).map(Value::Number))
            .unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return value.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.map(Value::String).unwrap_or(Value::Null);
    }
    Value::Null
}
