//! Tenant Orchestrator Core Library
//!
//! Provisioning workflow for tenant accounts of a multi-tenant SaaS control plane:
//! - Ingestion (create/update requests, name deduplication)
//! - Orchestrator (provisioning, infrastructure and release steps)
//! - Reconciler (out-of-band provisioning outcome events)
//! - Change feed (mirror of every account mutation)
//!
//! Storage and external services are abstracted through traits; the app crate
//! provides the `SQLite` store and the web crate the HTTP surface.

pub mod config;
pub mod error;
pub mod services;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use config::OrchestratorConfig;
pub use error::{CoreError, CoreResult};
pub use services::ServiceContext;
pub use traits::{AccountRepository, ChangeFeedSink, WorkflowRepository};
