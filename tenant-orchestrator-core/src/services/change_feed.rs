//! Change feed
//!
//! [`ChangeFeedRepository`] wraps the account store and queues the new image of
//! every successful mutation. A background worker writes each one to a
//! [`ChangeFeedSink`] as `accounts/<mutation id>.json`. The queue is bounded;
//! when it is full the change is dropped with a warning and the store write is
//! unaffected.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::CoreResult;
use crate::traits::{AccountDetails, AccountGuard, AccountRepository, ChangeFeedSink};
use crate::types::Account;

/// One mirrored mutation
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub mutation_id: String,
    /// Account as it is after the mutation
    pub account: Account,
}

impl ChangeRecord {
    fn new(account: Account) -> Self {
        Self {
            mutation_id: uuid::Uuid::new_v4().to_string(),
            account,
        }
    }

    pub fn key(&self) -> String {
        format!("accounts/{}.json", self.mutation_id)
    }
}

/// Change-feed worker entry point
pub struct ChangeFeed;

impl ChangeFeed {
    /// Start the worker.
    ///
    /// It stops when the returned handle is closed or dropped, flushing the
    /// queue first. It also stops once every [`ChangeFeedRepository`] using the
    /// sender is gone.
    pub fn spawn(
        sink: Arc<dyn ChangeFeedSink>,
        capacity: usize,
    ) -> (mpsc::Sender<ChangeRecord>, ChangeFeedHandle) {
        let (tx, mut rx) = mpsc::channel::<ChangeRecord>(capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    record = rx.recv() => match record {
                        Some(record) => write_record(sink.as_ref(), record).await,
                        None => break,
                    },
                    _ = &mut shutdown_rx => {
                        // Refuse new changes, then write what is already queued
                        rx.close();
                        let mut flushed = 0_usize;
                        while let Some(record) = rx.recv().await {
                            write_record(sink.as_ref(), record).await;
                            flushed += 1;
                        }
                        log::info!("Change feed closed, flushed {flushed} queued change(s)");
                        break;
                    }
                }
            }
            log::debug!("Change feed worker stopped");
        });
        let handle = ChangeFeedHandle {
            shutdown: shutdown_tx,
            worker,
        };
        (tx, handle)
    }
}

async fn write_record(sink: &dyn ChangeFeedSink, record: ChangeRecord) {
    let key = record.key();
    let body = match serde_json::to_vec(&record.account) {
        Ok(body) => body,
        Err(e) => {
            log::error!("Change feed: cannot serialize {key}: {e}");
            return;
        }
    };
    match sink.put(&key, &body).await {
        Ok(()) => log::debug!("Change feed: wrote {key}"),
        Err(e) => log::warn!("Change feed: failed to write {key}: {e}"),
    }
}

/// Owner of a running change-feed worker.
pub struct ChangeFeedHandle {
    shutdown: oneshot::Sender<()>,
    worker: JoinHandle<()>,
}

impl ChangeFeedHandle {
    /// Stop accepting changes, write the queued ones and wait for the worker.
    ///
    /// Changes published afterwards are dropped with a warning.
    pub async fn close(self) {
        // Err means the worker already stopped on its own
        let _ = self.shutdown.send(());
        if let Err(e) = self.worker.await {
            log::error!("Change feed worker panicked: {e}");
        }
    }
}

/// Account store decorator publishing every successful mutation.
pub struct ChangeFeedRepository {
    inner: Arc<dyn AccountRepository>,
    sender: mpsc::Sender<ChangeRecord>,
}

impl ChangeFeedRepository {
    #[must_use]
    pub fn new(inner: Arc<dyn AccountRepository>, sender: mpsc::Sender<ChangeRecord>) -> Self {
        Self { inner, sender }
    }

    fn publish(&self, account: &Account) {
        let record = ChangeRecord::new(account.clone());
        if let Err(e) = self.sender.try_send(record) {
            match e {
                mpsc::error::TrySendError::Full(r) => log::warn!(
                    "Change feed full, dropping change of account {}",
                    r.account.account_id
                ),
                mpsc::error::TrySendError::Closed(r) => log::warn!(
                    "Change feed closed, dropping change of account {}",
                    r.account.account_id
                ),
            }
        }
    }
}

#[async_trait]
impl AccountRepository for ChangeFeedRepository {
    async fn find_all(&self) -> CoreResult<Vec<Account>> {
        self.inner.find_all().await
    }

    async fn find_by_id(&self, id: &str) -> CoreResult<Option<Account>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_customer_name(&self, name: &str) -> CoreResult<Vec<Account>> {
        self.inner.find_by_customer_name(name).await
    }

    async fn insert(&self, account: &Account) -> CoreResult<()> {
        self.inner.insert(account).await?;
        self.publish(account);
        Ok(())
    }

    async fn replace_if(&self, guard: &AccountGuard, account: &Account) -> CoreResult<Account> {
        let stored = self.inner.replace_if(guard, account).await?;
        self.publish(&stored);
        Ok(stored)
    }

    async fn merge_details(&self, id: &str, details: &AccountDetails) -> CoreResult<Account> {
        let account = self.inner.merge_details(id, details).await?;
        self.publish(&account);
        Ok(account)
    }

    async fn record_error(&self, id: &str, error: Option<String>) -> CoreResult<Account> {
        let account = self.inner.record_error(id, error).await?;
        self.publish(&account);
        Ok(account)
    }

    async fn update_version(&self, id: &str, version: &str) -> CoreResult<Account> {
        let account = self.inner.update_version(id, version).await?;
        self.publish(&account);
        Ok(account)
    }
}
