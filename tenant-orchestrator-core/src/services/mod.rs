//! Business logic service layer

mod account_service;
mod change_feed;
mod ingestion_service;
mod orchestrator;
mod reconciler;

pub use account_service::AccountService;
pub use change_feed::{ChangeFeed, ChangeFeedHandle, ChangeFeedRepository, ChangeRecord};
pub use ingestion_service::IngestionService;
pub use orchestrator::Orchestrator;
pub use reconciler::Reconciler;

use std::sync::Arc;

use tenant_orchestrator_gateway::{AccountFactory, DeliveryService};

use crate::config::OrchestratorConfig;
use crate::error::{CoreError, CoreResult};
use crate::traits::{AccountRepository, WorkflowRepository};
use crate::types::Account;

/// Service context - holds all dependencies
///
/// The platform layer builds this and injects its storage and gateway implementations.
pub struct ServiceContext {
    /// Account store
    pub account_repository: Arc<dyn AccountRepository>,
    /// Workflow continuation records
    pub workflow_repository: Arc<dyn WorkflowRepository>,
    /// Account factory client
    pub account_factory: Arc<dyn AccountFactory>,
    /// Build and pipeline client
    pub delivery: Arc<dyn DeliveryService>,
    pub config: OrchestratorConfig,
}

impl ServiceContext {
    #[must_use]
    pub fn new(
        account_repository: Arc<dyn AccountRepository>,
        workflow_repository: Arc<dyn WorkflowRepository>,
        account_factory: Arc<dyn AccountFactory>,
        delivery: Arc<dyn DeliveryService>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            account_repository,
            workflow_repository,
            account_factory,
            delivery,
            config,
        }
    }

    /// Load an account or fail with `AccountNotFound`
    pub async fn require_account(&self, account_id: &str) -> CoreResult<Account> {
        self.account_repository
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(account_id.to_string()))
    }
}

/// Log at `warn` for expected errors, `error` otherwise.
pub(crate) fn log_error(context: &str, err: &CoreError) {
    if err.is_expected() {
        log::warn!("{context}: {err}");
    } else {
        log::error!("{context}: {err}");
    }
}
