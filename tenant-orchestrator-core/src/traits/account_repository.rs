//! Account persistence abstract Trait

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::types::{Account, AccountStatus, Product};

/// Previously observed values a conditional write is guarded by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountGuard {
    pub account_status: AccountStatus,
    /// Resume token of the outstanding handle, `None` when no handle is expected
    pub resume_token: Option<String>,
}

impl AccountGuard {
    pub fn new(account_status: AccountStatus, resume_token: Option<String>) -> Self {
        Self {
            account_status,
            resume_token,
        }
    }

    /// Guard matching the record as it is now.
    pub fn of(account: &Account) -> Self {
        Self::new(
            account.account_status,
            account.resume_token().map(str::to_string),
        )
    }

    pub fn matches(&self, account: &Account) -> bool {
        account.account_status == self.account_status
            && account.resume_token() == self.resume_token.as_deref()
    }
}

/// Fields an ingestion update merges into an existing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDetails {
    pub products: Vec<Product>,
    pub expiration: DateTime<Utc>,
    pub admin_emails: BTreeSet<String>,
}

/// Account store
///
/// The single point of mutual exclusion between workflow instances: every write
/// touching `account_status` or the provisioning handle goes through
/// [`replace_if`](Self::replace_if).
///
/// Platform implementation:
/// - `InMemoryAccountRepository` (tests, ephemeral runs)
/// - `SqliteStore` in the app crate (`SeaORM`)
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Get all accounts
    async fn find_all(&self) -> CoreResult<Vec<Account>>;

    /// Get account based on ID
    async fn find_by_id(&self, id: &str) -> CoreResult<Option<Account>>;

    /// Accounts whose `customer_name` equals `name`
    async fn find_by_customer_name(&self, name: &str) -> CoreResult<Vec<Account>>;

    /// Insert a new account.
    ///
    /// Fails with `Conflict` when the customer name is taken; the check and the
    /// write are atomic.
    async fn insert(&self, account: &Account) -> CoreResult<()>;

    /// Write the workflow-owned fields of `account` if the stored record still
    /// matches `guard`, and return the stored record.
    ///
    /// Only status, handle, cloud account id, provisioned product id, customer
    /// name, pipeline name and `last_updated` are written (see
    /// [`Account::apply_workflow_state`]); details merged by a concurrent
    /// ingestion update, the last error and the version are kept.
    ///
    /// # Errors
    /// - `AccountNotFound` when absent
    /// - `ConditionFailed` when status or resume token changed
    /// - `Conflict` when the new customer name belongs to another account
    /// - `InvalidState` when a set cloud account id would change
    async fn replace_if(&self, guard: &AccountGuard, account: &Account) -> CoreResult<Account>;

    /// Merge ingestion details, clear the last error, bump `last_updated`.
    ///
    /// Status, cloud account id and handle are left as they are.
    async fn merge_details(&self, id: &str, details: &AccountDetails) -> CoreResult<Account>;

    /// Record (or clear) the last orchestration failure.
    async fn record_error(&self, id: &str, error: Option<String>) -> CoreResult<Account>;

    /// Store the version reported by the release pipeline.
    async fn update_version(&self, id: &str, version: &str) -> CoreResult<Account>;
}

/// Checks shared by every conditional replace.
///
/// Store implementations call this with the current record once the guarded
/// write did not apply, to classify the failure.
pub fn check_replace(
    guard: &AccountGuard,
    current: &Account,
    next: &Account,
) -> CoreResult<()> {
    if !guard.matches(current) {
        return Err(CoreError::ConditionFailed(current.account_id.clone()));
    }
    if let Some(existing) = &current.cloud_account_id
        && next.cloud_account_id.as_ref() != Some(existing)
    {
        return Err(CoreError::InvalidState(format!(
            "cloud account id of {} is already {existing}",
            current.account_id
        )));
    }
    Ok(())
}

/// In-memory account store
///
/// Default implementation for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryAccountRepository {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
}

impl InMemoryAccountRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn name_taken(store: &HashMap<String, Account>, name: &str, except: &str) -> bool {
        store
            .values()
            .any(|a| a.customer_name == name && a.account_id != except)
    }

    async fn mutate<F>(&self, id: &str, f: F) -> CoreResult<Account>
    where
        F: FnOnce(&mut Account) + Send,
    {
        let mut store = self.accounts.write().await;
        let account = store
            .get_mut(id)
            .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))?;
        f(account);
        account.touch();
        Ok(account.clone())
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_all(&self) -> CoreResult<Vec<Account>> {
        let mut accounts: Vec<_> = self.accounts.read().await.values().cloned().collect();
        accounts.sort_by(|a, b| a.customer_name.cmp(&b.customer_name));
        Ok(accounts)
    }

    async fn find_by_id(&self, id: &str) -> CoreResult<Option<Account>> {
        Ok(self.accounts.read().await.get(id).cloned())
    }

    async fn find_by_customer_name(&self, name: &str) -> CoreResult<Vec<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| a.customer_name == name)
            .cloned()
            .collect())
    }

    async fn insert(&self, account: &Account) -> CoreResult<()> {
        let mut store = self.accounts.write().await;
        if store.contains_key(&account.account_id) {
            return Err(CoreError::Conflict(format!(
                "account {} already exists",
                account.account_id
            )));
        }
        if Self::name_taken(&store, &account.customer_name, &account.account_id) {
            return Err(CoreError::Conflict(format!(
                "customer name '{}' is already in use",
                account.customer_name
            )));
        }
        store.insert(account.account_id.clone(), account.clone());
        Ok(())
    }

    async fn replace_if(&self, guard: &AccountGuard, account: &Account) -> CoreResult<Account> {
        let mut store = self.accounts.write().await;
        let mut merged = store
            .get(&account.account_id)
            .cloned()
            .ok_or_else(|| CoreError::AccountNotFound(account.account_id.clone()))?;
        check_replace(guard, &merged, account)?;
        if Self::name_taken(&store, &account.customer_name, &account.account_id) {
            return Err(CoreError::Conflict(format!(
                "customer name '{}' is already in use",
                account.customer_name
            )));
        }
        merged.apply_workflow_state(account);
        store.insert(merged.account_id.clone(), merged.clone());
        Ok(merged)
    }

    async fn merge_details(&self, id: &str, details: &AccountDetails) -> CoreResult<Account> {
        let details = details.clone();
        self.mutate(id, move |account| {
            account.products = details.products;
            account.expiration = details.expiration;
            account.admin_emails = details.admin_emails;
            account.error = None;
        })
        .await
    }

    async fn record_error(&self, id: &str, error: Option<String>) -> CoreResult<Account> {
        self.mutate(id, move |account| account.error = error).await
    }

    async fn update_version(&self, id: &str, version: &str) -> CoreResult<Account> {
        let version = version.to_string();
        self.mutate(id, move |account| account.version = Some(version))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProvisioningHandle;

    fn account(name: &str) -> Account {
        Account::new(name.to_string(), Vec::new(), BTreeSet::new(), Utc::now())
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_name() {
        let repo = InMemoryAccountRepository::new();
        repo.insert(&account("acme")).await.unwrap();
        let err = repo.insert(&account("acme")).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn concurrent_inserts_with_one_name_yield_one_success() {
        let repo = InMemoryAccountRepository::new();
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let repo = repo.clone();
            tasks.spawn(async move { repo.insert(&account("acme")).await });
        }
        let mut ok = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(()) => ok += 1,
                Err(e) => assert!(matches!(e, CoreError::Conflict(_))),
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn replace_if_checks_guard() {
        let repo = InMemoryAccountRepository::new();
        let original = account("acme");
        repo.insert(&original).await.unwrap();

        let mut next = original.clone();
        next.account_status = AccountStatus::AccountProvisioning;
        next.provisioning_handle = Some(ProvisioningHandle {
            external_operation_id: "pp-1".to_string(),
            resume_token: "tok".to_string(),
        });

        let stale = AccountGuard::new(AccountStatus::AccountCreated, None);
        assert!(matches!(
            repo.replace_if(&stale, &next).await,
            Err(CoreError::ConditionFailed(_))
        ));

        repo.replace_if(&AccountGuard::of(&original), &next)
            .await
            .unwrap();
        // Same guard again: the handle is now set, so it no longer matches
        assert!(matches!(
            repo.replace_if(&AccountGuard::of(&original), &next).await,
            Err(CoreError::ConditionFailed(_))
        ));
    }

    #[tokio::test]
    async fn cloud_account_id_is_write_once() {
        let repo = InMemoryAccountRepository::new();
        let mut acc = account("acme");
        acc.cloud_account_id = Some("111122223333".to_string());
        repo.insert(&acc).await.unwrap();

        let mut next = acc.clone();
        next.cloud_account_id = Some("999999999999".to_string());
        assert!(matches!(
            repo.replace_if(&AccountGuard::of(&acc), &next).await,
            Err(CoreError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn rename_onto_taken_name_conflicts() {
        let repo = InMemoryAccountRepository::new();
        let a = account("acme");
        repo.insert(&a).await.unwrap();
        repo.insert(&account("globex")).await.unwrap();

        let mut renamed = a.clone();
        renamed.customer_name = "globex".to_string();
        assert!(matches!(
            repo.replace_if(&AccountGuard::of(&a), &renamed).await,
            Err(CoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn replace_if_keeps_details_merged_after_the_read() {
        let repo = InMemoryAccountRepository::new();
        let original = account("acme");
        repo.insert(&original).await.unwrap();

        // Details change between the workflow's read and its write
        repo.merge_details(
            &original.account_id,
            &AccountDetails {
                products: vec![Product {
                    name: "webapp".to_string(),
                    version: "release-2".to_string(),
                }],
                expiration: original.expiration,
                admin_emails: BTreeSet::from(["b@acme.com".to_string()]),
            },
        )
        .await
        .unwrap();
        repo.update_version(&original.account_id, "1.2.0")
            .await
            .unwrap();

        let mut next = original.clone();
        next.account_status = AccountStatus::AccountProvisioning;
        next.provisioning_handle = Some(ProvisioningHandle {
            external_operation_id: "pp-1".to_string(),
            resume_token: "tok".to_string(),
        });
        let stored = repo
            .replace_if(&AccountGuard::of(&original), &next)
            .await
            .unwrap();

        assert_eq!(stored.account_status, AccountStatus::AccountProvisioning);
        assert_eq!(stored.resume_token(), Some("tok"));
        assert_eq!(stored.products[0].version, "release-2");
        assert_eq!(stored.version.as_deref(), Some("1.2.0"));
        assert_eq!(
            repo.find_by_id(&original.account_id).await.unwrap(),
            Some(stored)
        );
    }

    #[tokio::test]
    async fn merge_details_keeps_status_and_clears_error() {
        let repo = InMemoryAccountRepository::new();
        let mut acc = account("acme");
        acc.account_status = AccountStatus::AccountCreated;
        acc.error = Some("old".to_string());
        repo.insert(&acc).await.unwrap();

        let merged = repo
            .merge_details(
                &acc.account_id,
                &AccountDetails {
                    products: vec![Product {
                        name: "webapp".to_string(),
                        version: "v2".to_string(),
                    }],
                    expiration: acc.expiration,
                    admin_emails: BTreeSet::from(["b@acme.com".to_string()]),
                },
            )
            .await
            .unwrap();
        assert_eq!(merged.account_status, AccountStatus::AccountCreated);
        assert_eq!(merged.products[0].version, "v2");
        assert!(merged.error.is_none());
        assert!(merged.last_updated >= acc.last_updated);
    }

    #[tokio::test]
    async fn mutations_on_missing_account_are_not_found() {
        let repo = InMemoryAccountRepository::new();
        assert!(matches!(
            repo.update_version("nope", "1.0").await,
            Err(CoreError::AccountNotFound(_))
        ));
    }
}
