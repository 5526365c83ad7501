//! Application bootstrap for the tenant orchestrator.
//!
//! Provides `AppState` (service container) and `AppStateBuilder` (adapter
//! injection). Frontends build the state once, run the startup sequence and
//! then serve requests through its services.

pub mod adapters;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use tenant_orchestrator_core::config::OrchestratorConfig;
use tenant_orchestrator_core::error::{CoreError, CoreResult};
use tenant_orchestrator_core::services::{
    AccountService, ChangeFeed, ChangeFeedHandle, ChangeFeedRepository, IngestionService,
    Orchestrator, Reconciler, ServiceContext,
};
use tenant_orchestrator_core::traits::{AccountRepository, ChangeFeedSink, WorkflowRepository};
use tenant_orchestrator_gateway::{AccountFactory, DeliveryService};

/// Platform-agnostic application state.
///
/// Holds all services and the `ServiceContext`.
pub struct AppState {
    /// Service context (storage adapters, gateway clients, configuration)
    pub ctx: Arc<ServiceContext>,
    /// Workflow runner
    pub orchestrator: Orchestrator,
    /// Create/update ingestion
    pub ingestion_service: IngestionService,
    /// Provisioning outcome handling
    pub reconciler: Reconciler,
    /// Account queries and operator actions
    pub account_service: AccountService,
    /// Whether the startup sequence has completed
    pub startup_completed: AtomicBool,
    has_change_feed: bool,
    change_feed: Mutex<Option<ChangeFeedHandle>>,
}

impl AppState {
    /// Run the startup sequence: fail instances interrupted by the last shutdown.
    ///
    /// Must complete before the first request is served. Returns the number of
    /// recovered instances.
    pub async fn run_startup(&self) -> CoreResult<usize> {
        let recovered = self.orchestrator.recover_interrupted().await?;
        if recovered > 0 {
            log::warn!("Recovered {recovered} interrupted workflow instance(s)");
        } else {
            log::info!("No interrupted workflow instances");
        }
        self.startup_completed.store(true, Ordering::SeqCst);
        Ok(recovered)
    }

    /// Whether a change feed is attached.
    pub fn has_change_feed(&self) -> bool {
        self.has_change_feed
    }

    /// Wait for running workflow tasks to finish.
    pub async fn wait_for_workflows(&self) {
        log::info!("Waiting for running workflow instances");
        self.orchestrator.drain().await;
    }

    /// Stop the background workers before exit.
    ///
    /// Queued change-feed records are written out. Workflow tasks still
    /// running are not awaited; the next startup fails them.
    pub async fn shutdown(&self) {
        let running = self.orchestrator.running_count().await;
        if running > 0 {
            log::warn!("Shutting down with {running} workflow instance(s) still running");
        }
        if let Some(handle) = self.change_feed.lock().await.take() {
            handle.close().await;
        }
        log::info!("Application state shut down");
    }
}

/// Builder for constructing `AppState` with platform-specific adapters.
///
/// # Required adapters
/// - `account_repository` and `workflow_repository`
/// - `account_factory` and `delivery`
/// - `config`
///
/// # Optional
/// - `change_feed_sink`: mirrors every account mutation when set
pub struct AppStateBuilder {
    account_repository: Option<Arc<dyn AccountRepository>>,
    workflow_repository: Option<Arc<dyn WorkflowRepository>>,
    account_factory: Option<Arc<dyn AccountFactory>>,
    delivery: Option<Arc<dyn DeliveryService>>,
    change_feed_sink: Option<Arc<dyn ChangeFeedSink>>,
    config: Option<OrchestratorConfig>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            account_repository: None,
            workflow_repository: None,
            account_factory: None,
            delivery: None,
            change_feed_sink: None,
            config: None,
        }
    }

    #[must_use]
    pub fn account_repository(mut self, repo: Arc<dyn AccountRepository>) -> Self {
        self.account_repository = Some(repo);
        self
    }

    #[must_use]
    pub fn workflow_repository(mut self, repo: Arc<dyn WorkflowRepository>) -> Self {
        self.workflow_repository = Some(repo);
        self
    }

    #[must_use]
    pub fn account_factory(mut self, factory: Arc<dyn AccountFactory>) -> Self {
        self.account_factory = Some(factory);
        self
    }

    #[must_use]
    pub fn delivery(mut self, delivery: Arc<dyn DeliveryService>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    #[must_use]
    pub fn change_feed_sink(mut self, sink: Arc<dyn ChangeFeedSink>) -> Self {
        self.change_feed_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the `AppState`.
    ///
    /// Starts the change-feed worker when a sink is set, so it must be called
    /// inside a tokio runtime.
    ///
    /// # Errors
    /// Returns `CoreError::ConfigError` if a required adapter is missing or the
    /// configuration is invalid.
    pub fn build(self) -> CoreResult<AppState> {
        let config = self
            .config
            .ok_or_else(|| CoreError::ConfigError("config is required".to_string()))?;
        config.validate()?;

        let mut account_repository = self.account_repository.ok_or_else(|| {
            CoreError::ConfigError("account_repository is required".to_string())
        })?;
        let workflow_repository = self.workflow_repository.ok_or_else(|| {
            CoreError::ConfigError("workflow_repository is required".to_string())
        })?;
        let account_factory = self
            .account_factory
            .ok_or_else(|| CoreError::ConfigError("account_factory is required".to_string()))?;
        let delivery = self
            .delivery
            .ok_or_else(|| CoreError::ConfigError("delivery is required".to_string()))?;

        let mut change_feed = None;
        if let Some(sink) = self.change_feed_sink {
            let (sender, handle) = ChangeFeed::spawn(sink, config.change_feed_capacity);
            let mirrored: Arc<dyn AccountRepository> =
                Arc::new(ChangeFeedRepository::new(account_repository, sender));
            account_repository = mirrored;
            change_feed = Some(handle);
        }

        log::info!(
            "Using account factory '{}' and delivery service '{}'",
            account_factory.id(),
            delivery.id()
        );

        let ctx = Arc::new(ServiceContext::new(
            account_repository,
            workflow_repository,
            account_factory,
            delivery,
            config,
        ));

        let orchestrator = Orchestrator::new(Arc::clone(&ctx));
        let ingestion_service = IngestionService::new(Arc::clone(&ctx), orchestrator.clone());
        let reconciler = Reconciler::new(Arc::clone(&ctx), orchestrator.clone());
        let account_service = AccountService::new(Arc::clone(&ctx));

        Ok(AppState {
            ctx,
            orchestrator,
            ingestion_service,
            reconciler,
            account_service,
            startup_completed: AtomicBool::new(false),
            has_change_feed: change_feed.is_some(),
            change_feed: Mutex::new(change_feed),
        })
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
