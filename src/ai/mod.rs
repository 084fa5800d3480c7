//! LLM-assisted query planning.
//!
//! The language model is an external collaborator: it receives a prompt
//! carrying the table schema, the alias tables, and the user's question,
//! and returns free text from which this module defensively extracts a
//! JSON plan. Planning failures never propagate - the hardcoded default
//! plan stands in, and the failure is logged.

pub mod planner;
pub mod providers;

pub use planner::{extract_json_span, LlmQueryPlan, QueryPlanner};
pub use providers::{LlmClient, LlmProvider, LlmResponse, ProviderConfig};
