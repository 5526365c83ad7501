//! Test helper module
//!
//! Scripted gateway clients, a recording change-feed sink and factory helpers.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::RwLock;

use tenant_orchestrator_gateway::{
    AccountFactory, BuildOutcome, BuildStatus, DeliveryService, GatewayError, InfraBuildRequest,
    ProvisionAccountRequest, ReleaseBuildRequest, UpdateProvisionedAccountRequest,
};

use crate::config::OrchestratorConfig;
use crate::error::CoreResult;
use crate::services::{AccountService, IngestionService, Orchestrator, Reconciler, ServiceContext};
use crate::traits::{ChangeFeedSink, InMemoryAccountRepository, InMemoryWorkflowRepository};
use crate::types::{Account, AccountRequest, Product};

type GatewayResult<T> = Result<T, GatewayError>;

// ===== ScriptedAccountFactory =====

pub struct ScriptedAccountFactory {
    pub creates: RwLock<Vec<ProvisionAccountRequest>>,
    pub updates: RwLock<Vec<UpdateProvisionedAccountRequest>>,
    /// If Some, `submit_create` fails with this error
    create_error: RwLock<Option<GatewayError>>,
    /// Added to every `submit_create` call
    create_delay: RwLock<Duration>,
}

impl ScriptedAccountFactory {
    pub fn new() -> Self {
        Self {
            creates: RwLock::new(Vec::new()),
            updates: RwLock::new(Vec::new()),
            create_error: RwLock::new(None),
            create_delay: RwLock::new(Duration::ZERO),
        }
    }

    pub async fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.write().await = delay;
    }

    pub async fn fail_creates_with(&self, err: GatewayError) {
        *self.create_error.write().await = Some(err);
    }

    pub async fn create_count(&self) -> usize {
        self.creates.read().await.len()
    }

    pub async fn update_count(&self) -> usize {
        self.updates.read().await.len()
    }
}

#[async_trait]
impl AccountFactory for ScriptedAccountFactory {
    fn id(&self) -> &'static str {
        "scripted-factory"
    }

    async fn submit_create(&self, request: &ProvisionAccountRequest) -> GatewayResult<String> {
        let delay = *self.create_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.create_error.read().await.clone() {
            return Err(err);
        }
        let mut creates = self.creates.write().await;
        creates.push(request.clone());
        Ok(format!("pp-{}", creates.len()))
    }

    async fn submit_update(&self, request: &UpdateProvisionedAccountRequest) -> GatewayResult<()> {
        self.updates.write().await.push(request.clone());
        Ok(())
    }
}

// ===== ScriptedDelivery =====

pub struct ScriptedDelivery {
    pub infra_builds: RwLock<Vec<InfraBuildRequest>>,
    pub release_builds: RwLock<Vec<ReleaseBuildRequest>>,
    pub pipelines: RwLock<Vec<String>>,
    infra_status: RwLock<BuildStatus>,
    release_status: RwLock<BuildStatus>,
    /// Added to every build call
    build_delay: RwLock<Duration>,
}

impl ScriptedDelivery {
    pub fn new() -> Self {
        Self {
            infra_builds: RwLock::new(Vec::new()),
            release_builds: RwLock::new(Vec::new()),
            pipelines: RwLock::new(Vec::new()),
            infra_status: RwLock::new(BuildStatus::Succeeded),
            release_status: RwLock::new(BuildStatus::Succeeded),
            build_delay: RwLock::new(Duration::ZERO),
        }
    }

    pub async fn set_infra_status(&self, status: BuildStatus) {
        *self.infra_status.write().await = status;
    }

    pub async fn set_release_status(&self, status: BuildStatus) {
        *self.release_status.write().await = status;
    }

    pub async fn set_build_delay(&self, delay: Duration) {
        *self.build_delay.write().await = delay;
    }

    pub async fn infra_count(&self) -> usize {
        self.infra_builds.read().await.len()
    }

    pub async fn pipeline_count(&self) -> usize {
        self.pipelines.read().await.len()
    }

    async fn delay(&self) {
        let delay = *self.build_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DeliveryService for ScriptedDelivery {
    fn id(&self) -> &'static str {
        "scripted-delivery"
    }

    async fn run_infra_build(&self, request: &InfraBuildRequest) -> GatewayResult<BuildOutcome> {
        self.infra_builds.write().await.push(request.clone());
        self.delay().await;
        Ok(BuildOutcome {
            build_id: format!("infra-{}", request.account_id),
            status: *self.infra_status.read().await,
            artifact: None,
        })
    }

    async fn run_release_build(&self, request: &ReleaseBuildRequest) -> GatewayResult<BuildOutcome> {
        self.release_builds.write().await.push(request.clone());
        self.delay().await;
        Ok(BuildOutcome {
            build_id: format!("release-{}", request.account_id),
            status: *self.release_status.read().await,
            artifact: Some(format!("artifacts/{}.zip", request.source_version)),
        })
    }

    async fn start_pipeline_execution(&self, pipeline_name: &str) -> GatewayResult<String> {
        let mut pipelines = self.pipelines.write().await;
        pipelines.push(pipeline_name.to_string());
        Ok(format!("exec-{}", pipelines.len()))
    }
}

// ===== RecordingSink =====

pub struct RecordingSink {
    entries: RwLock<Vec<(String, Vec<u8>)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn entries(&self) -> Vec<(String, Vec<u8>)> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl ChangeFeedSink for RecordingSink {
    async fn put(&self, key: &str, body: &[u8]) -> CoreResult<()> {
        self.entries
            .write()
            .await
            .push((key.to_string(), body.to_vec()));
        Ok(())
    }
}

// ===== Factory methods =====

/// Everything a service test needs, wired to in-memory stores and scripted clients.
pub struct TestHarness {
    pub ctx: Arc<ServiceContext>,
    pub accounts: Arc<InMemoryAccountRepository>,
    pub workflows: Arc<InMemoryWorkflowRepository>,
    pub factory: Arc<ScriptedAccountFactory>,
    pub delivery: Arc<ScriptedDelivery>,
    pub orchestrator: Orchestrator,
}

impl TestHarness {
    pub fn ingestion(&self) -> IngestionService {
        IngestionService::new(self.ctx.clone(), self.orchestrator.clone())
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.ctx.clone(), self.orchestrator.clone())
    }

    pub fn account_service(&self) -> AccountService {
        AccountService::new(self.ctx.clone())
    }

    /// Load an account that must exist
    pub async fn account(&self, account_id: &str) -> Account {
        self.ctx.require_account(account_id).await.unwrap()
    }
}

pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig::new("ops", "example.com")
}

/// Create test harness with the given configuration
pub fn create_harness_with(config: OrchestratorConfig) -> TestHarness {
    let accounts = Arc::new(InMemoryAccountRepository::new());
    let workflows = Arc::new(InMemoryWorkflowRepository::new());
    let factory = Arc::new(ScriptedAccountFactory::new());
    let delivery = Arc::new(ScriptedDelivery::new());

    let ctx = Arc::new(ServiceContext::new(
        accounts.clone(),
        workflows.clone(),
        factory.clone(),
        delivery.clone(),
        config,
    ));
    let orchestrator = Orchestrator::new(ctx.clone());

    TestHarness {
        ctx,
        accounts,
        workflows,
        factory,
        delivery,
        orchestrator,
    }
}

/// Create test harness with the default test configuration
pub fn create_harness() -> TestHarness {
    create_harness_with(test_config())
}

pub fn sample_account(name: &str) -> Account {
    Account::new(
        name.to_string(),
        vec![Product {
            name: "webapp".to_string(),
            version: "main".to_string(),
        }],
        BTreeSet::from([format!("admin@{name}.com")]),
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    )
}

/// Create request as the ingestion API receives it
pub fn create_request(name: &str) -> AccountRequest {
    serde_json::from_value(serde_json::json!({
        "customerName": name,
        "expiration": "2026-01-01",
        "products": [{"name": "webapp", "version": "main"}],
        "adminEmails": [format!("a@{name}.com")]
    }))
    .unwrap()
}

/// Update request for an existing account
pub fn update_request(account_id: &str, name: &str) -> AccountRequest {
    let mut request = create_request(name);
    request.account_id = Some(account_id.to_string());
    request
}
