//! ENGAGE-POC - Engagement-Funnel Chat Core
//!
//! Natural-language chat over a marketing-engagement dataset. One user
//! turn flows through a single call chain:
//!
//! Question -> Entity Resolver + Intent Classifier -> Safe Query Builder
//! -> Safety Validator -> (external executor) -> Funnel Aggregator ->
//! Response Formatter
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use engage_poc::ChatManager;
//! # use engage_poc::store::EngagementStore;
//! # async fn run(store: Arc<dyn EngagementStore>) {
//! let mut manager = ChatManager::new(store);
//! let response = manager.handle("Compare ASG Primary Path with LPW Path").await;
//! println!("{}", response.narrative);
//! # }
//! ```
//!
//! The chat UI, the hosted LLM proxy, and the SQL execution endpoint are
//! external collaborators; their seams are the [`store::EngagementStore`]
//! trait and the [`ai`] provider client.

// Core error handling
pub mod error;

// Tracing setup for embedding hosts
pub mod logging;

// Fixed table contract and breakdown dimensions
pub mod schema;

// Static alias tables (programs, regions, months, stop words)
pub mod aliases;

// Entity & alias resolution over live column values
pub mod resolver;

// Intent classification and time-scope extraction
pub mod intent;

// Safe statement construction and the read-only gate
pub mod query;

// Funnel metrics and row reduction
pub mod funnel;

// Response envelope assembly
pub mod response;

// External data-access seams
pub mod store;

// LLM-assisted query planning
pub mod ai;

// Per-session conversation memory
pub mod session;

// Per-turn orchestration
pub mod chat_manager;

// Database integration (when enabled)
#[cfg(feature = "database")]
pub mod database;

// Public re-exports for the call chain
pub use chat_manager::{ChatManager, QUERY_TIMEOUT_SECS};
pub use error::{ChatError, ChatResult, ExecutionError, PlanningError, QueryGuardError};
pub use funnel::FunnelMetrics;
pub use intent::{IntentKind, QueryIntent, TimeScope};
pub use query::{QueryPlan, VizKind};
pub use resolver::{EntityResolver, ResolvedEntities, ResolvedEntity};
pub use response::{ChatResponse, Visualization};

// Database integration re-exports (when the database feature is enabled)
#[cfg(feature = "database")]
pub use database::{DatabaseConfig, DatabaseManager, PgEngagementStore};
