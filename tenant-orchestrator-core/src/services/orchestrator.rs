//! Provisioning workflow
//!
//! One instance per ingestion request, running the steps
//!
//! ```text
//! SubmitProvisioning -> (suspend) -> ResumeAfterProvisioning
//!     -> ProvisionInfrastructure -> BuildRelease -> TriggerReleasePipeline
//! ```
//!
//! Instances run as tokio tasks. Suspension persists the instance with a resume
//! token and ends the task; [`Orchestrator::resume`] starts a fresh one. The
//! account store's conditional writes are the only coordination between
//! instances of the same account.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

use tenant_orchestrator_gateway::GatewayError;

use crate::error::{CoreError, CoreResult};
use crate::services::{ServiceContext, log_error};
use crate::traits::AccountGuard;
use crate::types::{
    Account, AccountStatus, ExecutionRole, InfraBuildRequest, ProvisionAccountRequest,
    ProvisioningHandle, ReleaseBuildRequest, ResumeSignal, UpdateProvisionedAccountRequest,
    WorkflowInstance, WorkflowStatus, WorkflowStep,
};

/// Failure message stored on instances found running at startup
const INTERRUPTED: &str = "interrupted by restart";

/// Outcome of `SubmitProvisioning`
enum Submission {
    /// Waiting for the account factory's outcome event
    Suspended,
    /// Nothing to wait for; go on with the builds
    Continue,
}

/// Runs and resumes workflow instances.
#[derive(Clone)]
pub struct Orchestrator {
    ctx: Arc<ServiceContext>,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            ctx,
            tasks: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Persist a new instance for `snapshot` and start it in the background.
    ///
    /// Returns the instance id.
    pub async fn launch(&self, snapshot: Account) -> CoreResult<String> {
        let instance = WorkflowInstance::new(snapshot);
        self.ctx.workflow_repository.save(&instance).await?;
        let instance_id = instance.instance_id.clone();
        log::info!(
            "Starting workflow {instance_id} for account {}",
            instance.account_id
        );
        self.spawn(instance).await;
        Ok(instance_id)
    }

    /// Resume the suspended instance holding `resume_token`.
    ///
    /// Returns `false` when the token was already consumed, which is a benign
    /// race between duplicate outcome deliveries.
    pub async fn resume(&self, resume_token: &str, signal: ResumeSignal) -> CoreResult<bool> {
        let Some(mut instance) = self
            .ctx
            .workflow_repository
            .consume_resume_token(resume_token)
            .await?
        else {
            log::info!("Resume token {resume_token} already consumed");
            return Ok(false);
        };

        match signal {
            ResumeSignal::Success(account) => {
                match self.clear_handle(&account, resume_token).await {
                    Ok(updated) => {
                        instance.snapshot = updated;
                        instance.advance(WorkflowStep::ProvisionInfrastructure);
                        self.ctx.workflow_repository.save(&instance).await?;
                        log::info!(
                            "Resumed workflow {} for account {}",
                            instance.instance_id,
                            instance.account_id
                        );
                        self.spawn(instance).await;
                    }
                    Err(e) => {
                        self.fail(&mut instance, &e).await;
                        return Err(e);
                    }
                }
            }
            ResumeSignal::Failure(message) => {
                let stored = self.ctx.require_account(&instance.account_id).await?;
                if stored.resume_token() == Some(resume_token)
                    && let Err(e) = self.clear_handle(&stored, resume_token).await
                {
                    log_error("Failed to clear provisioning handle", &e);
                }
                let err = CoreError::ExternalOperationFailure {
                    operation: "account provisioning".to_string(),
                    message,
                };
                self.fail(&mut instance, &err).await;
            }
        }
        Ok(true)
    }

    /// Mark every instance left `Running` by a previous process as failed.
    ///
    /// Must run before any instance is launched. Returns the number recovered.
    pub async fn recover_interrupted(&self) -> CoreResult<usize> {
        let running = self
            .ctx
            .workflow_repository
            .find_by_status(WorkflowStatus::Running)
            .await?;
        let count = running.len();
        for mut instance in running {
            log::warn!(
                "Workflow {} for account {} was interrupted at {}",
                instance.instance_id,
                instance.account_id,
                instance.step
            );
            instance.fail(INTERRUPTED.to_string());
            self.ctx.workflow_repository.save(&instance).await?;
            if let Err(e) = self
                .ctx
                .account_repository
                .record_error(&instance.account_id, Some(INTERRUPTED.to_string()))
                .await
            {
                log_error("Failed to record interruption", &e);
            }
        }
        Ok(count)
    }

    /// Wait until every spawned instance task has finished.
    pub async fn drain(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.tasks.lock().await);
            if tasks.is_empty() {
                return;
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    log::error!("Workflow task panicked: {e}");
                }
            }
        }
    }

    /// Number of instance tasks that have not finished yet.
    pub async fn running_count(&self) -> usize {
        let mut tasks = self.tasks.lock().await;
        reap_finished(&mut tasks);
        tasks.len()
    }

    async fn spawn(&self, instance: WorkflowInstance) {
        let this = self.clone();
        let mut tasks = self.tasks.lock().await;
        // Reap finished tasks so the set does not grow without bound
        reap_finished(&mut tasks);
        tasks.spawn(async move { this.run(instance).await });
    }

    async fn run(&self, mut instance: WorkflowInstance) {
        if let Err(e) = self.drive(&mut instance).await {
            self.fail(&mut instance, &e).await;
        }
    }

    async fn drive(&self, instance: &mut WorkflowInstance) -> CoreResult<()> {
        loop {
            match instance.step {
                WorkflowStep::SubmitProvisioning => match self.submit_provisioning(instance).await? {
                    Submission::Suspended => return Ok(()),
                    Submission::Continue => {
                        instance.advance(WorkflowStep::ProvisionInfrastructure);
                    }
                },
                WorkflowStep::ResumeAfterProvisioning => {
                    instance.advance(WorkflowStep::ProvisionInfrastructure);
                }
                WorkflowStep::ProvisionInfrastructure => {
                    self.provision_infrastructure(instance).await?;
                    instance.advance(WorkflowStep::BuildRelease);
                }
                WorkflowStep::BuildRelease => {
                    self.build_release(instance).await?;
                    instance.advance(WorkflowStep::TriggerReleasePipeline);
                }
                WorkflowStep::TriggerReleasePipeline => {
                    self.trigger_release_pipeline(instance).await?;
                    return Ok(());
                }
                WorkflowStep::Completed => return Ok(()),
            }
            self.ctx.workflow_repository.save(instance).await?;
        }
    }

    // ===== Steps =====

    async fn submit_provisioning(&self, instance: &mut WorkflowInstance) -> CoreResult<Submission> {
        let stored = self.ctx.require_account(&instance.account_id).await?;
        let requested_name = instance.snapshot.customer_name.clone();

        if let Some(handle) = &stored.provisioning_handle {
            return Err(CoreError::InvalidState(format!(
                "account {} already has operation {} outstanding",
                stored.account_id, handle.external_operation_id
            )));
        }

        let provisioned = stored.cloud_account_id.is_some();
        match (provisioned, stored.provisioned_product_id.clone()) {
            (false, _) => match stored.account_status {
                AccountStatus::Initiating | AccountStatus::AccountCreationFailed => {
                    self.submit_create(instance, stored, requested_name).await?;
                    Ok(Submission::Suspended)
                }
                status => Err(CoreError::InvalidState(format!(
                    "account {} has no cloud account but is {status}",
                    stored.account_id
                ))),
            },
            (true, _) if stored.customer_name == requested_name => {
                log::info!(
                    "Account {} already provisioned, continuing with release",
                    stored.account_id
                );
                instance.snapshot = stored;
                Ok(Submission::Continue)
            }
            (true, Some(product_id)) => {
                self.submit_rename(instance, stored, &product_id, requested_name)
                    .await?;
                Ok(Submission::Continue)
            }
            (true, None) => Err(CoreError::InvalidState(format!(
                "account {} has a cloud account but no provisioned product to update",
                stored.account_id
            ))),
        }
    }

    async fn submit_create(
        &self,
        instance: &mut WorkflowInstance,
        stored: Account,
        customer_name: String,
    ) -> CoreResult<()> {
        let request = ProvisionAccountRequest {
            account_email: self.ctx.config.account_email(&customer_name),
            admin_email: self.ctx.config.admin_email(),
            correlation_token: stored.correlation_token(),
            customer_name,
        };
        let operation_id = self.ctx.account_factory.submit_create(&request).await?;

        // Park the instance first so an early outcome event finds it
        let resume_token = uuid::Uuid::new_v4().to_string();
        instance.suspend(resume_token.clone());
        self.ctx.workflow_repository.save(instance).await?;

        let mut next = stored.clone();
        next.pipeline_name = Account::pipeline_name_for(&request.customer_name);
        next.customer_name = request.customer_name;
        next.account_status = AccountStatus::AccountProvisioning;
        next.provisioning_handle = Some(ProvisioningHandle {
            external_operation_id: operation_id.clone(),
            resume_token,
        });
        next.touch();

        let guard = AccountGuard::new(stored.account_status, None);
        let updated = self
            .ctx
            .account_repository
            .replace_if(&guard, &next)
            .await
            .map_err(|e| lost_race(e, &stored.account_id))?;

        log::info!(
            "Account {} provisioning submitted as {operation_id}, workflow {} suspended",
            updated.account_id,
            instance.instance_id
        );
        instance.snapshot = updated;
        self.ctx.workflow_repository.save(instance).await
    }

    async fn submit_rename(
        &self,
        instance: &mut WorkflowInstance,
        stored: Account,
        provisioned_product_id: &str,
        customer_name: String,
    ) -> CoreResult<()> {
        log::info!(
            "Renaming account {} from '{}' to '{customer_name}'",
            stored.account_id,
            stored.customer_name
        );
        let request = UpdateProvisionedAccountRequest {
            provisioned_product_id: provisioned_product_id.to_string(),
            account_email: self.ctx.config.account_email(&customer_name),
            update_token: stored.update_token(),
            customer_name,
        };
        self.ctx.account_factory.submit_update(&request).await?;

        let mut next = stored.clone();
        next.pipeline_name = Account::pipeline_name_for(&request.customer_name);
        next.customer_name = request.customer_name;
        next.touch();
        instance.snapshot = self
            .ctx
            .account_repository
            .replace_if(&AccountGuard::of(&stored), &next)
            .await
            .map_err(|e| lost_race(e, &stored.account_id))?;
        Ok(())
    }

    async fn provision_infrastructure(&self, instance: &WorkflowInstance) -> CoreResult<()> {
        let account = &instance.snapshot;
        let request = InfraBuildRequest {
            account_id: account.account_id.clone(),
            cloud_account_id: cloud_account_id(account)?,
            execution_role: ExecutionRole {
                role_name: self.ctx.config.account_role_name.clone(),
            },
        };

        let operation = "infrastructure build";
        let outcome = bounded(
            operation,
            self.ctx.config.infra_build_timeout(),
            self.ctx.delivery.run_infra_build(&request),
        )
        .await?;
        if !outcome.succeeded() {
            return Err(CoreError::ExternalOperationFailure {
                operation: operation.to_string(),
                message: format!("build {} finished {:?}", outcome.build_id, outcome.status),
            });
        }
        log::info!(
            "Infrastructure for account {} built by {}",
            account.account_id,
            outcome.build_id
        );
        Ok(())
    }

    async fn build_release(&self, instance: &WorkflowInstance) -> CoreResult<()> {
        let account = &instance.snapshot;
        let source_version = account
            .release_branch()
            .unwrap_or(&self.ctx.config.default_branch)
            .to_string();
        let request = ReleaseBuildRequest {
            account_id: account.account_id.clone(),
            cloud_account_id: cloud_account_id(account)?,
            source_version,
        };

        let operation = "release build";
        let outcome = bounded(
            operation,
            self.ctx.config.release_build_timeout(),
            self.ctx.delivery.run_release_build(&request),
        )
        .await?;
        if !outcome.succeeded() {
            return Err(CoreError::ExternalOperationFailure {
                operation: operation.to_string(),
                message: format!("build {} finished {:?}", outcome.build_id, outcome.status),
            });
        }
        log::info!(
            "Release {} for account {} built: {}",
            request.source_version,
            account.account_id,
            outcome.artifact.as_deref().unwrap_or("no artifact")
        );
        Ok(())
    }

    async fn trigger_release_pipeline(&self, instance: &mut WorkflowInstance) -> CoreResult<()> {
        let stored = self.ctx.require_account(&instance.account_id).await?;
        let execution_id = bounded(
            "release pipeline",
            self.ctx.config.pipeline_timeout(),
            self.ctx
                .delivery
                .start_pipeline_execution(&stored.pipeline_name),
        )
        .await?;

        let account = match stored.account_status {
            AccountStatus::AccountCreated => {
                let mut next = stored.clone();
                next.account_status = AccountStatus::Available;
                next.touch();
                self.ctx
                    .account_repository
                    .replace_if(&AccountGuard::of(&stored), &next)
                    .await
                    .map_err(|e| lost_race(e, &stored.account_id))?
            }
            AccountStatus::Available => stored,
            status => {
                return Err(CoreError::InvalidState(format!(
                    "account {} is {status} after its release pipeline started",
                    stored.account_id
                )));
            }
        };

        log::info!(
            "Account {} available, pipeline {} execution {execution_id}",
            account.account_id,
            account.pipeline_name
        );
        instance.snapshot = account;
        instance.succeed(execution_id);
        self.ctx.workflow_repository.save(instance).await
    }

    // ===== Helpers =====

    /// Drop the provisioning handle, guarded by the resume token.
    async fn clear_handle(&self, account: &Account, resume_token: &str) -> CoreResult<Account> {
        let guard = AccountGuard::new(account.account_status, Some(resume_token.to_string()));
        let mut next = account.clone();
        next.provisioning_handle = None;
        next.touch();
        self.ctx
            .account_repository
            .replace_if(&guard, &next)
            .await
            .map_err(|e| lost_race(e, &account.account_id))
    }

    /// Terminate an instance, recording the failure on it and on the account.
    async fn fail(&self, instance: &mut WorkflowInstance, err: &CoreError) {
        if instance.is_finished() {
            // Finished before the error; its outcome stands
            log_error(
                &format!(
                    "Workflow {} for account {} errored after finishing",
                    instance.instance_id, instance.account_id
                ),
                err,
            );
            return;
        }
        log_error(
            &format!(
                "Workflow {} for account {} failed at {}",
                instance.instance_id, instance.account_id, instance.step
            ),
            err,
        );
        let message = err.to_string();
        instance.fail(message.clone());
        if let Err(e) = self.ctx.workflow_repository.save(instance).await {
            log_error("Failed to persist failed workflow", &e);
        }
        if let Err(e) = self
            .ctx
            .account_repository
            .record_error(&instance.account_id, Some(message))
            .await
        {
            log_error("Failed to record workflow failure", &e);
        }
    }
}

fn cloud_account_id(account: &Account) -> CoreResult<String> {
    account.cloud_account_id.clone().ok_or_else(|| {
        CoreError::InvalidState(format!(
            "account {} has no cloud account",
            account.account_id
        ))
    })
}

/// A failed guard means another instance changed the account first.
fn lost_race(err: CoreError, account_id: &str) -> CoreError {
    match err {
        CoreError::ConditionFailed(_) => CoreError::InvalidState(format!(
            "account {account_id} was changed concurrently"
        )),
        other => other,
    }
}

/// Await a gateway call for at most `limit`.
async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> CoreResult<T>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(CoreError::from),
        Err(_) => Err(CoreError::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        }),
    }
}

fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(e) = result {
            log::error!("Workflow task panicked: {e}");
        }
    }
}
