//! Create/update ingestion

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::services::{Orchestrator, ServiceContext};
use crate::traits::AccountDetails;
use crate::types::{Account, AccountRequest, IngestResponse, ValidatedRequest};

/// Accepts create and update requests and starts one workflow instance per call.
pub struct IngestionService {
    ctx: Arc<ServiceContext>,
    orchestrator: Orchestrator,
}

impl IngestionService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>, orchestrator: Orchestrator) -> Self {
        Self { ctx, orchestrator }
    }

    /// Create when `account_id` is absent, update otherwise.
    pub async fn ingest(&self, request: AccountRequest) -> CoreResult<IngestResponse> {
        let valid = request.validate()?;
        match request.account_id.as_deref().map(str::trim) {
            None | Some("") => self.create(valid).await,
            Some(account_id) => self.update(account_id, valid).await,
        }
    }

    async fn create(&self, valid: ValidatedRequest) -> CoreResult<IngestResponse> {
        let account = Account::new(
            valid.customer_name,
            valid.products,
            valid.admin_emails,
            valid.expiration,
        );
        // Atomic in the store; concurrent creates of one name get a single winner
        self.ctx.account_repository.insert(&account).await?;
        log::info!(
            "Created account {} for '{}'",
            account.account_id,
            account.customer_name
        );

        let response = IngestResponse {
            status: account.account_status,
            account_id: account.account_id.clone(),
        };
        self.orchestrator.launch(account).await?;
        Ok(response)
    }

    async fn update(&self, account_id: &str, valid: ValidatedRequest) -> CoreResult<IngestResponse> {
        let stored = self.ctx.require_account(account_id).await?;

        if valid.customer_name != stored.customer_name {
            let owners = self
                .ctx
                .account_repository
                .find_by_customer_name(&valid.customer_name)
                .await?;
            if owners.iter().any(|a| a.account_id != account_id) {
                return Err(CoreError::Conflict(format!(
                    "customer name '{}' is already in use",
                    valid.customer_name
                )));
            }
        }

        let merged = self
            .ctx
            .account_repository
            .merge_details(
                account_id,
                &AccountDetails {
                    products: valid.products,
                    expiration: valid.expiration,
                    admin_emails: valid.admin_emails,
                },
            )
            .await?;
        log::info!("Updated account {account_id}");

        // The rename itself is applied by the workflow
        let mut snapshot = merged.clone();
        snapshot.pipeline_name = Account::pipeline_name_for(&valid.customer_name);
        snapshot.customer_name = valid.customer_name;

        self.orchestrator.launch(snapshot).await?;
        Ok(IngestResponse {
            status: merged.account_status,
            account_id: merged.account_id,
        })
    }
}
