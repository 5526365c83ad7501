//! Workflow instance persistence abstract Trait

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::CoreResult;
use crate::types::{WorkflowInstance, WorkflowStatus, WorkflowStep};

/// Continuation records of workflow instances
///
/// A suspended instance survives restarts here; its resume token is the only
/// way back in.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Insert or overwrite an instance
    async fn save(&self, instance: &WorkflowInstance) -> CoreResult<()>;

    async fn find_by_id(&self, instance_id: &str) -> CoreResult<Option<WorkflowInstance>>;

    /// Instances of one account, oldest first
    async fn find_by_account(&self, account_id: &str) -> CoreResult<Vec<WorkflowInstance>>;

    async fn find_by_status(&self, status: WorkflowStatus) -> CoreResult<Vec<WorkflowInstance>>;

    /// Atomically claim the suspended instance holding `token`.
    ///
    /// The instance moves to `Running` at `ResumeAfterProvisioning` and the token
    /// is cleared. Returns `None` when no suspended instance holds the token,
    /// so a second claim of the same token always gets `None`.
    async fn consume_resume_token(&self, token: &str) -> CoreResult<Option<WorkflowInstance>>;
}

/// In-memory workflow store
#[derive(Clone, Default)]
pub struct InMemoryWorkflowRepository {
    instances: Arc<RwLock<HashMap<String, WorkflowInstance>>>,
}

impl InMemoryWorkflowRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn save(&self, instance: &WorkflowInstance) -> CoreResult<()> {
        self.instances
            .write()
            .await
            .insert(instance.instance_id.clone(), instance.clone());
        Ok(())
    }

    async fn find_by_id(&self, instance_id: &str) -> CoreResult<Option<WorkflowInstance>> {
        Ok(self.instances.read().await.get(instance_id).cloned())
    }

    async fn find_by_account(&self, account_id: &str) -> CoreResult<Vec<WorkflowInstance>> {
        let mut found: Vec<_> = self
            .instances
            .read()
            .await
            .values()
            .filter(|i| i.account_id == account_id)
            .cloned()
            .collect();
        found.sort_by_key(|i| i.created_at);
        Ok(found)
    }

    async fn find_by_status(&self, status: WorkflowStatus) -> CoreResult<Vec<WorkflowInstance>> {
        Ok(self
            .instances
            .read()
            .await
            .values()
            .filter(|i| i.status == status)
            .cloned()
            .collect())
    }

    async fn consume_resume_token(&self, token: &str) -> CoreResult<Option<WorkflowInstance>> {
        let mut store = self.instances.write().await;
        let Some(instance) = store.values_mut().find(|i| {
            i.status == WorkflowStatus::Suspended && i.resume_token.as_deref() == Some(token)
        }) else {
            return Ok(None);
        };
        instance.status = WorkflowStatus::Running;
        instance.step = WorkflowStep::ResumeAfterProvisioning;
        instance.resume_token = None;
        instance.updated_at = Utc::now();
        Ok(Some(instance.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Account;
    use std::collections::BTreeSet;

    fn suspended(token: &str) -> WorkflowInstance {
        let mut inst = WorkflowInstance::new(Account::new(
            "acme".to_string(),
            Vec::new(),
            BTreeSet::new(),
            Utc::now(),
        ));
        inst.suspend(token.to_string());
        inst
    }

    #[tokio::test]
    async fn token_is_consumed_once() {
        let repo = InMemoryWorkflowRepository::new();
        repo.save(&suspended("tok")).await.unwrap();

        let claimed = repo.consume_resume_token("tok").await.unwrap().unwrap();
        assert_eq!(claimed.status, WorkflowStatus::Running);
        assert_eq!(claimed.step, WorkflowStep::ResumeAfterProvisioning);
        assert!(claimed.resume_token.is_none());

        assert!(repo.consume_resume_token("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_consumers_get_one_instance() {
        let repo = InMemoryWorkflowRepository::new();
        repo.save(&suspended("tok")).await.unwrap();

        let (a, b) = tokio::join!(
            repo.consume_resume_token("tok"),
            repo.consume_resume_token("tok")
        );
        let claimed = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(Option::is_some)
            .count();
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn finds_by_status() {
        let repo = InMemoryWorkflowRepository::new();
        repo.save(&suspended("a")).await.unwrap();
        let mut running = suspended("b");
        running.status = WorkflowStatus::Running;
        repo.save(&running).await.unwrap();

        let found = repo.find_by_status(WorkflowStatus::Running).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].instance_id, running.instance_id);
    }
}
