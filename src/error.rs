//! Error taxonomy for the engagement chat core.
//!
//! The taxonomy keeps the failure classes apart instead of collapsing them
//! into one catch-all:
//!
//! - a resolution miss is NOT an error - resolvers return empty match sets
//!   and callers fall back to suggestions;
//! - an unsafe statement is a hard stop and never reaches the executor;
//! - an execution failure degrades to an apologetic answer;
//! - a planning failure is silently repaired with the default plan (logged).

use thiserror::Error;

/// Violations raised by the read-only query gate.
///
/// These are the only errors in the system that must never be downgraded:
/// a statement that trips the gate is rejected outright, never rewritten.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryGuardError {
    #[error("statement must start with SELECT, found '{found}'")]
    NotReadOnly { found: String },

    #[error("statement contains forbidden keyword '{keyword}'")]
    ForbiddenKeyword { keyword: String },

    #[error("statement is empty")]
    Empty,
}

/// Failures from the external query executor.
///
/// A transport-level failure and an in-band error object from the executor
/// are the same signal to callers.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("executor rejected the query: {message} (code {code})")]
    Backend { message: String, code: String },

    #[error("query timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Failures in the LLM planning path.
///
/// Planning failures are recovered locally with the hardcoded default plan;
/// they surface to the user only as a less specific answer.
#[derive(Error, Debug)]
pub enum PlanningError {
    #[error("no LLM provider is configured")]
    NoProvider,

    #[error("LLM call failed: {0}")]
    Provider(String),

    #[error("no JSON object or array found in LLM output")]
    NoJsonPayload,

    #[error("LLM plan failed to parse: {0}")]
    MalformedPlan(#[from] serde_json::Error),
}

/// Umbrella error for a chat turn.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("unsafe query: {0}")]
    Guard(#[from] QueryGuardError),

    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("planning failed: {0}")]
    Planning(#[from] PlanningError),
}

pub type ChatResult<T> = Result<T, ChatError>;
pub type GuardResult<T> = Result<T, QueryGuardError>;
pub type ExecutionResult<T> = Result<T, ExecutionError>;

#[cfg(feature = "database")]
impl From<sqlx::Error> for ExecutionError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(db) => ExecutionError::Backend {
                message: db.message().to_string(),
                code: db
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            },
            other => ExecutionError::Transport(other.to_string()),
        }
    }
}
