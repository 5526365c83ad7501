//! Account queries and operator actions

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::traits::AccountGuard;
use crate::types::{Account, AccountStatus};
use crate::utils::release_window::{parse_window, seconds_until_next_window};

/// Account service
pub struct AccountService {
    ctx: Arc<ServiceContext>,
}

impl AccountService {
    /// Create an account service instance
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    // ===== Queries =====

    /// List all accounts
    pub async fn list_accounts(&self) -> CoreResult<Vec<Account>> {
        self.ctx.account_repository.find_all().await
    }

    /// Accounts that have a cloud account assigned
    pub async fn list_provisioned(&self) -> CoreResult<Vec<Account>> {
        let accounts = self.ctx.account_repository.find_all().await?;
        Ok(accounts
            .into_iter()
            .filter(|a| a.cloud_account_id.is_some())
            .collect())
    }

    /// Get account based on ID
    pub async fn get_account(&self, account_id: &str) -> CoreResult<Account> {
        self.ctx.require_account(account_id).await
    }

    // ===== Release pipeline callbacks =====

    /// Store the version the release pipeline deployed.
    pub async fn update_version(&self, account_id: &str, version: &str) -> CoreResult<Account> {
        let version = version.trim();
        if version.is_empty() {
            return Err(CoreError::ValidationError(
                "versionNumber must not be empty".to_string(),
            ));
        }
        let account = self
            .ctx
            .account_repository
            .update_version(account_id, version)
            .await?;
        log::info!("Account {account_id} now runs version {version}");
        Ok(account)
    }

    /// Seconds until the next daily release window opens.
    pub fn seconds_until_release_window(&self, now: DateTime<Utc>) -> CoreResult<i64> {
        let window = parse_window(&self.ctx.config.release_window).ok_or_else(|| {
            CoreError::ConfigError(format!(
                "invalid release window '{}'",
                self.ctx.config.release_window
            ))
        })?;
        Ok(seconds_until_next_window(now, window))
    }

    // ===== Operator corrections =====

    /// Attach an already existing cloud account to a record that has none.
    ///
    /// The account goes straight to `Available`; no workflow runs.
    pub async fn activate_existing(
        &self,
        account_id: &str,
        cloud_account_id: &str,
    ) -> CoreResult<Account> {
        let cloud_account_id = cloud_account_id.trim();
        if cloud_account_id.is_empty() {
            return Err(CoreError::ValidationError(
                "cloudAccountId must not be empty".to_string(),
            ));
        }

        let stored = self.ctx.require_account(account_id).await?;
        if let Some(existing) = &stored.cloud_account_id {
            return Err(CoreError::InvalidState(format!(
                "account {account_id} is already linked to {existing}"
            )));
        }
        if stored.has_outstanding_operation() {
            return Err(CoreError::InvalidState(format!(
                "account {account_id} has a provisioning operation outstanding"
            )));
        }

        let mut next = stored.clone();
        next.cloud_account_id = Some(cloud_account_id.to_string());
        next.account_status = AccountStatus::Available;
        next.touch();
        self.ctx
            .account_repository
            .replace_if(&AccountGuard::of(&stored), &next)
            .await?;
        let active = self
            .ctx
            .account_repository
            .record_error(account_id, None)
            .await?;

        log::warn!("Account {account_id} manually activated with {cloud_account_id}");
        Ok(active)
    }
}
