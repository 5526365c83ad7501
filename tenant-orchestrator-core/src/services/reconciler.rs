//! Provisioning outcome reconciliation
//!
//! Matches an outcome event to the single account with the event's tenant name,
//! records the outcome with a conditional write and resumes the suspended
//! workflow instance through its resume token. Redelivered events end as
//! [`ReconcileResult::Duplicate`].

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::services::{Orchestrator, ServiceContext};
use crate::traits::AccountGuard;
use crate::types::{
    Account, AccountStatus, ProvisioningOutcome, ProvisioningOutcomeEvent, ReconcileResult,
    ResumeSignal,
};

pub struct Reconciler {
    ctx: Arc<ServiceContext>,
    orchestrator: Orchestrator,
}

impl Reconciler {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>, orchestrator: Orchestrator) -> Self {
        Self { ctx, orchestrator }
    }

    pub async fn reconcile(&self, event: &ProvisioningOutcomeEvent) -> CoreResult<ReconcileResult> {
        log::info!(
            "Provisioning outcome for '{}': {:?} ({})",
            event.tenant_name,
            event.outcome,
            event.external_account_id
        );
        let account = self.match_account(&event.tenant_name).await?;

        let Some(resume_token) = account.resume_token().map(str::to_string) else {
            if already_applied(&account, event) {
                log::info!(
                    "Outcome for account {} already applied",
                    account.account_id
                );
                return Ok(ReconcileResult::Duplicate);
            }
            return Err(CoreError::InvalidState(format!(
                "account {} has no outstanding provisioning operation",
                account.account_id
            )));
        };

        let resumed = match event.outcome {
            ProvisioningOutcome::Succeeded => {
                let updated = self.record_success(account, event, &resume_token).await?;
                self.orchestrator
                    .resume(&resume_token, ResumeSignal::Success(updated))
                    .await?
            }
            ProvisioningOutcome::Failed => {
                self.record_failure(account, &resume_token).await?;
                self.orchestrator
                    .resume(
                        &resume_token,
                        ResumeSignal::Failure(format!(
                            "account factory reported FAILED for '{}'",
                            event.tenant_name
                        )),
                    )
                    .await?
            }
        };

        Ok(if resumed {
            ReconcileResult::Resumed
        } else {
            ReconcileResult::Duplicate
        })
    }

    async fn match_account(&self, tenant_name: &str) -> CoreResult<Account> {
        let mut matches = self
            .ctx
            .account_repository
            .find_by_customer_name(tenant_name)
            .await?;
        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(CoreError::Reconciliation(format!(
                "no account named '{tenant_name}'"
            ))),
            n => Err(CoreError::Reconciliation(format!(
                "{n} accounts named '{tenant_name}'"
            ))),
        }
    }

    /// Write the cloud account id and `AccountCreated`, keeping the handle for resume.
    async fn record_success(
        &self,
        account: Account,
        event: &ProvisioningOutcomeEvent,
        resume_token: &str,
    ) -> CoreResult<Account> {
        if account.account_status == AccountStatus::AccountCreated
            && account.cloud_account_id.as_deref() == Some(event.external_account_id.as_str())
        {
            // An earlier delivery wrote it; only the resume is left
            return Ok(account);
        }
        if account.account_status != AccountStatus::AccountProvisioning {
            return Err(CoreError::InvalidState(format!(
                "account {} is {}, not awaiting provisioning",
                account.account_id, account.account_status
            )));
        }

        let mut next = account.clone();
        next.cloud_account_id = Some(event.external_account_id.clone());
        next.account_status = AccountStatus::AccountCreated;
        next.provisioned_product_id = account
            .provisioning_handle
            .as_ref()
            .map(|h| h.external_operation_id.clone());
        next.touch();

        let guard = AccountGuard::new(
            AccountStatus::AccountProvisioning,
            Some(resume_token.to_string()),
        );
        match self.ctx.account_repository.replace_if(&guard, &next).await {
            Ok(stored) => Ok(stored),
            Err(CoreError::ConditionFailed(_)) => {
                // A concurrent delivery may have won; accept its write if identical
                let current = self.ctx.require_account(&account.account_id).await?;
                if current.cloud_account_id == next.cloud_account_id
                    && current.account_status == AccountStatus::AccountCreated
                {
                    Ok(current)
                } else {
                    Err(CoreError::InvalidState(format!(
                        "account {} changed while recording its outcome",
                        account.account_id
                    )))
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn record_failure(&self, account: Account, resume_token: &str) -> CoreResult<()> {
        match account.account_status {
            AccountStatus::AccountCreationFailed => Ok(()),
            AccountStatus::AccountProvisioning => {
                let mut next = account.clone();
                next.account_status = AccountStatus::AccountCreationFailed;
                next.touch();
                let guard = AccountGuard::new(
                    AccountStatus::AccountProvisioning,
                    Some(resume_token.to_string()),
                );
                match self.ctx.account_repository.replace_if(&guard, &next).await {
                    Ok(_) => Ok(()),
                    Err(CoreError::ConditionFailed(_)) => {
                        let current = self.ctx.require_account(&account.account_id).await?;
                        if current.account_status == AccountStatus::AccountCreationFailed {
                            Ok(())
                        } else {
                            Err(CoreError::InvalidState(format!(
                                "account {} changed while recording its outcome",
                                account.account_id
                            )))
                        }
                    }
                    Err(e) => Err(e),
                }
            }
            status => Err(CoreError::InvalidState(format!(
                "account {} is {status}, not awaiting provisioning",
                account.account_id
            ))),
        }
    }
}

/// Whether the store already reflects `event`.
fn already_applied(account: &Account, event: &ProvisioningOutcomeEvent) -> bool {
    match event.outcome {
        ProvisioningOutcome::Succeeded => {
            account.cloud_account_id.as_deref() == Some(event.external_account_id.as_str())
        }
        ProvisioningOutcome::Failed => {
            account.account_status == AccountStatus::AccountCreationFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkflowRepository;
    use crate::test_utils::{TestHarness, create_harness, create_request, update_request};
    use crate::types::{BuildStatus, WorkflowStatus};

    fn outcome(name: &str, cloud_id: &str, outcome: ProvisioningOutcome) -> ProvisioningOutcomeEvent {
        ProvisioningOutcomeEvent {
            external_account_id: cloud_id.to_string(),
            tenant_name: name.to_string(),
            outcome,
        }
    }

    /// Create `name` and wait until its instance is suspended.
    async fn provisioning(h: &TestHarness, name: &str) -> String {
        let response = h.ingestion().ingest(create_request(name)).await.unwrap();
        h.orchestrator.drain().await;
        response.account_id
    }

    #[tokio::test]
    async fn success_resumes_and_completes_the_workflow() {
        let h = create_harness();
        let account_id = provisioning(&h, "acme").await;

        let result = h
            .reconciler()
            .reconcile(&outcome("acme", "111122223333", ProvisioningOutcome::Succeeded))
            .await
            .unwrap();
        assert_eq!(result, ReconcileResult::Resumed);
        h.orchestrator.drain().await;

        let account = h.account(&account_id).await;
        assert_eq!(account.cloud_account_id.as_deref(), Some("111122223333"));
        assert_eq!(account.provisioned_product_id.as_deref(), Some("pp-1"));
        assert!(account.provisioning_handle.is_none());
        assert_eq!(account.account_status, AccountStatus::Available);

        let infra = h.delivery.infra_builds.read().await.clone();
        assert_eq!(infra.len(), 1);
        assert_eq!(infra[0].cloud_account_id, "111122223333");
        assert_eq!(infra[0].execution_role.role_name, "AWSControlTowerExecution");
        assert_eq!(h.delivery.release_builds.read().await[0].source_version, "main");
        assert_eq!(*h.delivery.pipelines.read().await, vec!["acme-pipeline".to_string()]);

        let instances = h.workflows.find_by_account(&account_id).await.unwrap();
        assert_eq!(instances[0].status, WorkflowStatus::Succeeded);
        assert_eq!(instances[0].execution_id.as_deref(), Some("exec-1"));
    }

    #[tokio::test]
    async fn success_marks_account_created_before_release() {
        let h = create_harness();
        h.delivery.set_release_status(BuildStatus::Failed).await;
        let account_id = provisioning(&h, "acme").await;

        h.reconciler()
            .reconcile(&outcome("acme", "111122223333", ProvisioningOutcome::Succeeded))
            .await
            .unwrap();
        h.orchestrator.drain().await;

        let account = h.account(&account_id).await;
        assert_eq!(account.account_status, AccountStatus::AccountCreated);
        assert!(account.error.as_deref().unwrap_or_default().contains("release build"));
        assert_eq!(h.delivery.infra_count().await, 1);
        assert_eq!(h.delivery.pipeline_count().await, 0);
    }

    #[tokio::test]
    async fn failure_stops_before_infrastructure() {
        let h = create_harness();
        let account_id = provisioning(&h, "acme").await;

        let result = h
            .reconciler()
            .reconcile(&outcome("acme", "", ProvisioningOutcome::Failed))
            .await
            .unwrap();
        assert_eq!(result, ReconcileResult::Resumed);
        h.orchestrator.drain().await;

        let account = h.account(&account_id).await;
        assert_eq!(account.account_status, AccountStatus::AccountCreationFailed);
        assert!(account.provisioning_handle.is_none());
        assert!(account.cloud_account_id.is_none());
        assert!(account.error.is_some());
        assert_eq!(h.delivery.infra_count().await, 0);

        let instances = h.workflows.find_by_account(&account_id).await.unwrap();
        assert_eq!(instances[0].status, WorkflowStatus::Failed);
    }

    #[tokio::test]
    async fn duplicate_success_resumes_once() {
        let h = create_harness();
        provisioning(&h, "acme").await;
        let event = outcome("acme", "111122223333", ProvisioningOutcome::Succeeded);

        let first = h.reconciler().reconcile(&event).await.unwrap();
        let second = h.reconciler().reconcile(&event).await.unwrap();
        h.orchestrator.drain().await;
        let third = h.reconciler().reconcile(&event).await.unwrap();

        assert_eq!(first, ReconcileResult::Resumed);
        assert_eq!(second, ReconcileResult::Duplicate);
        assert_eq!(third, ReconcileResult::Duplicate);
        assert_eq!(h.delivery.infra_count().await, 1);
        assert_eq!(h.delivery.pipeline_count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_duplicates_resume_once() {
        let h = create_harness();
        provisioning(&h, "acme").await;
        let event = outcome("acme", "111122223333", ProvisioningOutcome::Succeeded);

        let reconciler = h.reconciler();
        let (a, b) = tokio::join!(reconciler.reconcile(&event), reconciler.reconcile(&event));
        h.orchestrator.drain().await;

        let resumed = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(|r| *r == ReconcileResult::Resumed)
            .count();
        assert_eq!(resumed, 1);
        assert_eq!(h.delivery.infra_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_failure_is_a_noop() {
        let h = create_harness();
        provisioning(&h, "acme").await;
        let event = outcome("acme", "", ProvisioningOutcome::Failed);

        assert_eq!(
            h.reconciler().reconcile(&event).await.unwrap(),
            ReconcileResult::Resumed
        );
        h.orchestrator.drain().await;
        assert_eq!(
            h.reconciler().reconcile(&event).await.unwrap(),
            ReconcileResult::Duplicate
        );
    }

    #[tokio::test]
    async fn unknown_tenant_is_a_reconciliation_error() {
        let h = create_harness();
        let err = h
            .reconciler()
            .reconcile(&outcome("nobody", "1", ProvisioningOutcome::Succeeded))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Reconciliation(_)));
    }

    #[tokio::test]
    async fn outcome_without_pending_operation_is_invalid() {
        let h = create_harness();
        h.ingestion().ingest(create_request("acme")).await.unwrap();
        h.orchestrator.drain().await;
        h.reconciler()
            .reconcile(&outcome("acme", "111122223333", ProvisioningOutcome::Succeeded))
            .await
            .unwrap();
        h.orchestrator.drain().await;

        // A different cloud account for an already provisioned tenant
        let err = h
            .reconciler()
            .reconcile(&outcome("acme", "999999999999", ProvisioningOutcome::Succeeded))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[tokio::test]
    async fn cloud_account_id_survives_later_updates() {
        let h = create_harness();
        let account_id = provisioning(&h, "acme").await;
        h.reconciler()
            .reconcile(&outcome("acme", "111122223333", ProvisioningOutcome::Succeeded))
            .await
            .unwrap();
        h.orchestrator.drain().await;

        h.ingestion()
            .ingest(update_request(&account_id, "acme"))
            .await
            .unwrap();
        h.orchestrator.drain().await;
        h.ingestion()
            .ingest(update_request(&account_id, "acme-renamed"))
            .await
            .unwrap();
        h.orchestrator.drain().await;

        let account = h.account(&account_id).await;
        assert_eq!(account.cloud_account_id.as_deref(), Some("111122223333"));
        assert_eq!(account.customer_name, "acme-renamed");
    }

    #[tokio::test]
    async fn failed_creation_can_be_retried() {
        let h = create_harness();
        let account_id = provisioning(&h, "acme").await;
        h.reconciler()
            .reconcile(&outcome("acme", "", ProvisioningOutcome::Failed))
            .await
            .unwrap();
        h.orchestrator.drain().await;

        h.ingestion()
            .ingest(update_request(&account_id, "acme"))
            .await
            .unwrap();
        h.orchestrator.drain().await;

        let account = h.account(&account_id).await;
        assert_eq!(account.account_status, AccountStatus::AccountProvisioning);
        assert!(account.error.is_none());
        let creates = h.factory.creates.read().await.clone();
        assert_eq!(creates.len(), 2);
        assert_ne!(creates[0].correlation_token, creates[1].correlation_token);
    }
}
