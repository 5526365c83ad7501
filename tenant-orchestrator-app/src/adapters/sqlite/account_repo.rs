//! `AccountRepository` implementation for `SqliteStore`.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};

use tenant_orchestrator_core::error::{CoreError, CoreResult};
use tenant_orchestrator_core::traits::{
    AccountDetails, AccountGuard, AccountRepository, check_replace,
};
use tenant_orchestrator_core::types::{Account, ProvisioningHandle};

use super::entity::account;
use super::{SqliteStore, account_write_error, parse_timestamp, storage_error, timestamp};

impl account::Model {
    /// Convert a `SeaORM` row model into a domain `Account`.
    fn into_account(self) -> CoreResult<Account> {
        let provisioning_handle = match (self.external_operation_id, self.resume_token) {
            (Some(external_operation_id), Some(resume_token)) => Some(ProvisioningHandle {
                external_operation_id,
                resume_token,
            }),
            _ => None,
        };

        Ok(Account {
            products: serde_json::from_str(&self.products)?,
            admin_emails: serde_json::from_str(&self.admin_emails)?,
            expiration: parse_timestamp("expiration", &self.expiration)?,
            account_status: self.account_status.parse()?,
            last_updated: parse_timestamp("last_updated", &self.last_updated)?,
            account_id: self.account_id,
            customer_name: self.customer_name,
            cloud_account_id: self.cloud_account_id,
            provisioning_handle,
            provisioned_product_id: self.provisioned_product_id,
            pipeline_name: self.pipeline_name,
            error: self.error,
            version: self.version,
        })
    }
}

/// Convert a domain `Account` into a fully set active model.
fn account_to_active_model(account: &Account) -> CoreResult<account::ActiveModel> {
    let handle = account.provisioning_handle.as_ref();
    Ok(account::ActiveModel {
        account_id: Set(account.account_id.clone()),
        customer_name: Set(account.customer_name.clone()),
        products: Set(serde_json::to_string(&account.products)?),
        admin_emails: Set(serde_json::to_string(&account.admin_emails)?),
        expiration: Set(timestamp(&account.expiration)),
        account_status: Set(account.account_status.as_str().to_string()),
        cloud_account_id: Set(account.cloud_account_id.clone()),
        external_operation_id: Set(handle.map(|h| h.external_operation_id.clone())),
        resume_token: Set(handle.map(|h| h.resume_token.clone())),
        provisioned_product_id: Set(account.provisioned_product_id.clone()),
        pipeline_name: Set(account.pipeline_name.clone()),
        last_updated: Set(timestamp(&account.last_updated)),
        error: Set(account.error.clone()),
        version: Set(account.version.clone()),
    })
}

/// Active model setting only the workflow-owned columns.
///
/// Mirrors [`Account::apply_workflow_state`].
fn workflow_state_active_model(account: &Account) -> account::ActiveModel {
    let handle = account.provisioning_handle.as_ref();
    account::ActiveModel {
        customer_name: Set(account.customer_name.clone()),
        pipeline_name: Set(account.pipeline_name.clone()),
        account_status: Set(account.account_status.as_str().to_string()),
        cloud_account_id: Set(account.cloud_account_id.clone()),
        external_operation_id: Set(handle.map(|h| h.external_operation_id.clone())),
        resume_token: Set(handle.map(|h| h.resume_token.clone())),
        provisioned_product_id: Set(account.provisioned_product_id.clone()),
        last_updated: Set(timestamp(&account.last_updated)),
        ..Default::default()
    }
}

impl SqliteStore {
    /// Apply a partial update to one account and return the updated record.
    async fn update_columns(&self, id: &str, active: account::ActiveModel) -> CoreResult<Account> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| storage_error("Failed to begin transaction", &e))?;

        let result = account::Entity::update_many()
            .set(active)
            .filter(account::Column::AccountId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| storage_error("Failed to update account", &e))?;
        if result.rows_affected == 0 {
            return Err(CoreError::AccountNotFound(id.to_string()));
        }

        let row = account::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(|e| storage_error("Failed to query account", &e))?
            .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))?;
        txn.commit()
            .await
            .map_err(|e| storage_error("Failed to commit account update", &e))?;

        row.into_account()
    }
}

#[async_trait]
impl AccountRepository for SqliteStore {
    async fn find_all(&self) -> CoreResult<Vec<Account>> {
        let rows = account::Entity::find()
            .order_by_asc(account::Column::CustomerName)
            .all(&self.db)
            .await
            .map_err(|e| storage_error("Failed to query accounts", &e))?;

        rows.into_iter().map(account::Model::into_account).collect()
    }

    async fn find_by_id(&self, id: &str) -> CoreResult<Option<Account>> {
        let row = account::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| storage_error("Failed to query account", &e))?;

        row.map(account::Model::into_account).transpose()
    }

    async fn find_by_customer_name(&self, name: &str) -> CoreResult<Vec<Account>> {
        let rows = account::Entity::find()
            .filter(account::Column::CustomerName.eq(name))
            .all(&self.db)
            .await
            .map_err(|e| storage_error("Failed to query accounts", &e))?;

        rows.into_iter().map(account::Model::into_account).collect()
    }

    async fn insert(&self, account: &Account) -> CoreResult<()> {
        let active_model = account_to_active_model(account)?;
        account::Entity::insert(active_model)
            .exec(&self.db)
            .await
            .map_err(|e| account_write_error("Failed to insert account", &account.customer_name, &e))?;
        Ok(())
    }

    async fn replace_if(&self, guard: &AccountGuard, account: &Account) -> CoreResult<Account> {
        let token_matches = match &guard.resume_token {
            Some(token) => account::Column::ResumeToken.eq(token.as_str()),
            None => account::Column::ResumeToken.is_null(),
        };
        let mut cloud_id_kept = Condition::any().add(account::Column::CloudAccountId.is_null());
        if let Some(cloud_id) = &account.cloud_account_id {
            cloud_id_kept = cloud_id_kept.add(account::Column::CloudAccountId.eq(cloud_id.as_str()));
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| storage_error("Failed to begin transaction", &e))?;
        let result = account::Entity::update_many()
            .set(workflow_state_active_model(account))
            .filter(account::Column::AccountId.eq(account.account_id.as_str()))
            .filter(account::Column::AccountStatus.eq(guard.account_status.as_str()))
            .filter(token_matches)
            .filter(cloud_id_kept)
            .exec(&txn)
            .await
            .map_err(|e| account_write_error("Failed to replace account", &account.customer_name, &e))?;

        if result.rows_affected > 0 {
            let row = account::Entity::find_by_id(account.account_id.as_str())
                .one(&txn)
                .await
                .map_err(|e| storage_error("Failed to query account", &e))?
                .ok_or_else(|| CoreError::AccountNotFound(account.account_id.clone()))?;
            txn.commit()
                .await
                .map_err(|e| storage_error("Failed to commit account replace", &e))?;
            return row.into_account();
        }
        txn.rollback()
            .await
            .map_err(|e| storage_error("Failed to roll back account replace", &e))?;

        // Nothing matched; find out which condition did not hold
        let current = self
            .find_by_id(&account.account_id)
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(account.account_id.clone()))?;
        check_replace(guard, &current, account)?;
        Err(CoreError::ConditionFailed(account.account_id.clone()))
    }

    async fn merge_details(&self, id: &str, details: &AccountDetails) -> CoreResult<Account> {
        let active = account::ActiveModel {
            products: Set(serde_json::to_string(&details.products)?),
            admin_emails: Set(serde_json::to_string(&details.admin_emails)?),
            expiration: Set(timestamp(&details.expiration)),
            error: Set(None),
            last_updated: Set(timestamp(&Utc::now())),
            ..Default::default()
        };
        self.update_columns(id, active).await
    }

    async fn record_error(&self, id: &str, error: Option<String>) -> CoreResult<Account> {
        let active = account::ActiveModel {
            error: Set(error),
            last_updated: Set(timestamp(&Utc::now())),
            ..Default::default()
        };
        self.update_columns(id, active).await
    }

    async fn update_version(&self, id: &str, version: &str) -> CoreResult<Account> {
        let active = account::ActiveModel {
            version: Set(Some(version.to_string())),
            last_updated: Set(timestamp(&Utc::now())),
            ..Default::default()
        };
        self.update_columns(id, active).await
    }
}
