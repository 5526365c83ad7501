#![cfg(feature = "sqlite-store")]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for `SqliteStore`, covering the `AccountRepository` and
//! `WorkflowRepository` implementations.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use tenant_orchestrator_app::adapters::SqliteStore;
use tenant_orchestrator_core::error::CoreError;
use tenant_orchestrator_core::traits::{
    AccountDetails, AccountGuard, AccountRepository, WorkflowRepository,
};
use tenant_orchestrator_core::types::{
    Account, AccountStatus, Product, ProvisioningHandle, WorkflowInstance, WorkflowStatus,
    WorkflowStep,
};

// ===== Helpers =====

async fn create_test_store() -> (SqliteStore, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let db_path = tmp.path().join("test.db");
    let store = SqliteStore::new(&db_path)
        .await
        .expect("failed to create SqliteStore");
    (store, tmp)
}

fn make_account(name: &str) -> Account {
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

/// Account with an outstanding handle, as after a create submission.
fn provisioning(account: &Account, token: &str) -> Account {
    let mut next = account.clone();
    next.account_status = AccountStatus::AccountProvisioning;
    next.provisioning_handle = Some(ProvisioningHandle {
        external_operation_id: "pp-1".to_string(),
        resume_token: token.to_string(),
    });
    next.touch();
    next
}

// ===== AccountRepository Tests =====

#[tokio::test]
async fn account_find_all_empty() {
    let (store, _tmp) = create_test_store().await;
    let accounts = AccountRepository::find_all(&store).await.unwrap();
    assert!(accounts.is_empty());
}

#[tokio::test]
async fn account_insert_and_find_round_trip() {
    let (store, _tmp) = create_test_store().await;
    let account = make_account("acme");
    store.insert(&account).await.unwrap();

    let found = AccountRepository::find_by_id(&store, &account.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, account);

    let by_name = store.find_by_customer_name("acme").await.unwrap();
    assert_eq!(by_name.len(), 1);
    assert!(store.find_by_customer_name("globex").await.unwrap().is_empty());
}

#[tokio::test]
async fn account_find_all_sorted_by_name() {
    let (store, _tmp) = create_test_store().await;
    store.insert(&make_account("zeta")).await.unwrap();
    store.insert(&make_account("alpha")).await.unwrap();

    let names: Vec<_> = AccountRepository::find_all(&store)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.customer_name)
        .collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

#[tokio::test]
async fn account_duplicate_name_conflicts() {
    let (store, _tmp) = create_test_store().await;
    store.insert(&make_account("acme")).await.unwrap();

    let err = store.insert(&make_account("acme")).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)), "got {err:?}");
}

#[tokio::test]
async fn account_concurrent_inserts_have_one_winner() {
    let (store, _tmp) = create_test_store().await;
    let store = Arc::new(store);

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..6 {
        let store = Arc::clone(&store);
        tasks.spawn(async move { store.insert(&make_account("acme")).await });
    }
    let mut ok = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(()) => ok += 1,
            Err(CoreError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(AccountRepository::find_all(&*store).await.unwrap().len(), 1);
}

#[tokio::test]
async fn replace_if_applies_when_guard_matches() {
    let (store, _tmp) = create_test_store().await;
    let account = make_account("acme");
    store.insert(&account).await.unwrap();

    let next = provisioning(&account, "tok-1");
    store
        .replace_if(&AccountGuard::new(AccountStatus::Initiating, None), &next)
        .await
        .unwrap();

    let found = AccountRepository::find_by_id(&store, &account.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.account_status, AccountStatus::AccountProvisioning);
    assert_eq!(found.resume_token(), Some("tok-1"));
}

#[tokio::test]
async fn replace_if_keeps_details_merged_after_the_read() {
    let (store, _tmp) = create_test_store().await;
    let account = make_account("acme");
    store.insert(&account).await.unwrap();

    store
        .merge_details(
            &account.account_id,
            &AccountDetails {
                products: vec![Product {
                    name: "webapp".to_string(),
                    version: "release-2".to_string(),
                }],
                expiration: account.expiration,
                admin_emails: BTreeSet::from(["ops@acme.com".to_string()]),
            },
        )
        .await
        .unwrap();
    store
        .record_error(&account.account_id, Some("earlier failure".to_string()))
        .await
        .unwrap();

    // `account` is the view read before the merge
    let stored = store
        .replace_if(
            &AccountGuard::new(AccountStatus::Initiating, None),
            &provisioning(&account, "tok-1"),
        )
        .await
        .unwrap();
    assert_eq!(stored.account_status, AccountStatus::AccountProvisioning);
    assert_eq!(stored.resume_token(), Some("tok-1"));
    assert_eq!(stored.products[0].version, "release-2");
    assert!(stored.admin_emails.contains("ops@acme.com"));
    assert_eq!(stored.error.as_deref(), Some("earlier failure"));

    let found = AccountRepository::find_by_id(&store, &account.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, stored);
}

#[tokio::test]
async fn replace_if_rejects_stale_guard() {
    let (store, _tmp) = create_test_store().await;
    let account = make_account("acme");
    store.insert(&account).await.unwrap();
    let guard = AccountGuard::new(AccountStatus::Initiating, None);
    store
        .replace_if(&guard, &provisioning(&account, "tok-1"))
        .await
        .unwrap();

    // A second instance holding the same stale view loses
    let err = store
        .replace_if(&guard, &provisioning(&account, "tok-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ConditionFailed(_)), "got {err:?}");

    let found = AccountRepository::find_by_id(&store, &account.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.resume_token(), Some("tok-1"));
}

#[tokio::test]
async fn replace_if_matches_resume_token() {
    let (store, _tmp) = create_test_store().await;
    let account = make_account("acme");
    store.insert(&account).await.unwrap();
    let current = provisioning(&account, "tok-1");
    store
        .replace_if(&AccountGuard::new(AccountStatus::Initiating, None), &current)
        .await
        .unwrap();

    let mut created = current.clone();
    created.account_status = AccountStatus::AccountCreated;
    created.cloud_account_id = Some("111122223333".to_string());

    let wrong = AccountGuard::new(AccountStatus::AccountProvisioning, Some("tok-x".to_string()));
    let err = store.replace_if(&wrong, &created).await.unwrap_err();
    assert!(matches!(err, CoreError::ConditionFailed(_)));

    let right = AccountGuard::of(&current);
    store.replace_if(&right, &created).await.unwrap();
}

#[tokio::test]
async fn replace_if_keeps_cloud_account_id() {
    let (store, _tmp) = create_test_store().await;
    let mut account = make_account("acme");
    account.cloud_account_id = Some("111122223333".to_string());
    account.account_status = AccountStatus::Available;
    store.insert(&account).await.unwrap();

    let mut next = account.clone();
    next.cloud_account_id = Some("999999999999".to_string());
    let err = store
        .replace_if(&AccountGuard::of(&account), &next)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidState(_)), "got {err:?}");
}

#[tokio::test]
async fn replace_if_rename_onto_taken_name_conflicts() {
    let (store, _tmp) = create_test_store().await;
    let acme = make_account("acme");
    store.insert(&acme).await.unwrap();
    store.insert(&make_account("globex")).await.unwrap();

    let mut renamed = acme.clone();
    renamed.customer_name = "globex".to_string();
    let err = store
        .replace_if(&AccountGuard::of(&acme), &renamed)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)), "got {err:?}");
}

#[tokio::test]
async fn replace_if_missing_account_not_found() {
    let (store, _tmp) = create_test_store().await;
    let account = make_account("ghost");
    let err = store
        .replace_if(&AccountGuard::of(&account), &account)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AccountNotFound(_)));
}

#[tokio::test]
async fn merge_details_clears_error_and_keeps_status() {
    let (store, _tmp) = create_test_store().await;
    let account = make_account("acme");
    store.insert(&account).await.unwrap();
    store
        .record_error(&account.account_id, Some("boom".to_string()))
        .await
        .unwrap();

    let merged = store
        .merge_details(
            &account.account_id,
            &AccountDetails {
                products: vec![Product {
                    name: "webapp".to_string(),
                    version: "release-2".to_string(),
                }],
                expiration: Utc.with_ymd_and_hms(2027, 6, 30, 0, 0, 0).unwrap(),
                admin_emails: BTreeSet::from(["ops@acme.com".to_string()]),
            },
        )
        .await
        .unwrap();

    assert!(merged.error.is_none());
    assert_eq!(merged.account_status, AccountStatus::Initiating);
    assert_eq!(merged.products[0].version, "release-2");
    assert!(merged.last_updated > account.last_updated);
}

#[tokio::test]
async fn update_version_and_record_error() {
    let (store, _tmp) = create_test_store().await;
    let account = make_account("acme");
    store.insert(&account).await.unwrap();

    let updated = store
        .update_version(&account.account_id, "2.0.1")
        .await
        .unwrap();
    assert_eq!(updated.version.as_deref(), Some("2.0.1"));

    let failed = store
        .record_error(&account.account_id, Some("build failed".to_string()))
        .await
        .unwrap();
    assert_eq!(failed.error.as_deref(), Some("build failed"));
    assert_eq!(failed.version.as_deref(), Some("2.0.1"));

    let err = store.update_version("missing", "1").await.unwrap_err();
    assert!(matches!(err, CoreError::AccountNotFound(_)));
}

// ===== WorkflowRepository Tests =====

#[tokio::test]
async fn workflow_save_and_find() {
    let (store, _tmp) = create_test_store().await;
    let account = make_account("acme");
    let first = WorkflowInstance::new(account.clone());
    let mut second = WorkflowInstance::new(account.clone());
    second.advance(WorkflowStep::BuildRelease);

    store.save(&first).await.unwrap();
    store.save(&second).await.unwrap();

    let found = WorkflowRepository::find_by_id(&store, &second.instance_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, second);

    let all = store.find_by_account(&account.account_id).await.unwrap();
    assert_eq!(
        all.iter().map(|i| i.instance_id.as_str()).collect::<Vec<_>>(),
        vec![first.instance_id.as_str(), second.instance_id.as_str()]
    );
}

#[tokio::test]
async fn workflow_save_overwrites() {
    let (store, _tmp) = create_test_store().await;
    let mut instance = WorkflowInstance::new(make_account("acme"));
    store.save(&instance).await.unwrap();

    instance.fail("boom".to_string());
    store.save(&instance).await.unwrap();

    let running = store.find_by_status(WorkflowStatus::Running).await.unwrap();
    assert!(running.is_empty());
    let failed = store.find_by_status(WorkflowStatus::Failed).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].failure.as_deref(), Some("boom"));
}

#[tokio::test]
async fn workflow_resume_token_is_consumed_once() {
    let (store, _tmp) = create_test_store().await;
    let mut instance = WorkflowInstance::new(make_account("acme"));
    instance.suspend("tok-1".to_string());
    store.save(&instance).await.unwrap();

    let claimed = store.consume_resume_token("tok-1").await.unwrap().unwrap();
    assert_eq!(claimed.instance_id, instance.instance_id);
    assert_eq!(claimed.status, WorkflowStatus::Running);
    assert_eq!(claimed.step, WorkflowStep::ResumeAfterProvisioning);
    assert!(claimed.resume_token.is_none());

    assert!(store.consume_resume_token("tok-1").await.unwrap().is_none());
    assert!(store.consume_resume_token("unknown").await.unwrap().is_none());
}

#[tokio::test]
async fn workflow_concurrent_consumers_get_one_instance() {
    let (store, _tmp) = create_test_store().await;
    let store = Arc::new(store);
    let mut instance = WorkflowInstance::new(make_account("acme"));
    instance.suspend("tok-1".to_string());
    store.save(&instance).await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        tasks.spawn(async move { store.consume_resume_token("tok-1").await });
    }
    let mut claimed = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap().unwrap().is_some() {
            claimed += 1;
        }
    }
    assert_eq!(claimed, 1);
}

#[tokio::test]
async fn store_reopens_with_existing_data() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("nested/dir/test.db");
    let account = make_account("acme");
    {
        let store = SqliteStore::new(&db_path).await.unwrap();
        store.insert(&account).await.unwrap();
    }

    let store = SqliteStore::new(&db_path).await.unwrap();
    assert!(
        AccountRepository::find_by_id(&store, &account.account_id)
            .await
            .unwrap()
            .is_some()
    );
}
