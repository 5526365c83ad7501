//! `WorkflowRepository` implementation for `SqliteStore`.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, sea_query::OnConflict,
};

use tenant_orchestrator_core::error::CoreResult;
use tenant_orchestrator_core::traits::WorkflowRepository;
use tenant_orchestrator_core::types::{WorkflowInstance, WorkflowStatus, WorkflowStep};

use super::entity::workflow_instance;
use super::{SqliteStore, parse_timestamp, storage_error, timestamp};

impl workflow_instance::Model {
    fn into_instance(self) -> CoreResult<WorkflowInstance> {
        Ok(WorkflowInstance {
            step: self.step.parse()?,
            status: self.status.parse()?,
            snapshot: serde_json::from_str(&self.snapshot)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            instance_id: self.instance_id,
            account_id: self.account_id,
            resume_token: self.resume_token,
            failure: self.failure,
            execution_id: self.execution_id,
        })
    }
}

fn instance_to_active_model(instance: &WorkflowInstance) -> CoreResult<workflow_instance::ActiveModel> {
    Ok(workflow_instance::ActiveModel {
        instance_id: Set(instance.instance_id.clone()),
        account_id: Set(instance.account_id.clone()),
        step: Set(instance.step.as_str().to_string()),
        status: Set(instance.status.as_str().to_string()),
        snapshot: Set(serde_json::to_string(&instance.snapshot)?),
        resume_token: Set(instance.resume_token.clone()),
        failure: Set(instance.failure.clone()),
        execution_id: Set(instance.execution_id.clone()),
        created_at: Set(timestamp(&instance.created_at)),
        updated_at: Set(timestamp(&instance.updated_at)),
    })
}

fn into_instances(rows: Vec<workflow_instance::Model>) -> CoreResult<Vec<WorkflowInstance>> {
    rows.into_iter()
        .map(workflow_instance::Model::into_instance)
        .collect()
}

#[async_trait]
impl WorkflowRepository for SqliteStore {
    async fn save(&self, instance: &WorkflowInstance) -> CoreResult<()> {
        workflow_instance::Entity::insert(instance_to_active_model(instance)?)
            .on_conflict(
                OnConflict::column(workflow_instance::Column::InstanceId)
                    .update_columns([
                        workflow_instance::Column::Step,
                        workflow_instance::Column::Status,
                        workflow_instance::Column::Snapshot,
                        workflow_instance::Column::ResumeToken,
                        workflow_instance::Column::Failure,
                        workflow_instance::Column::ExecutionId,
                        workflow_instance::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(|e| storage_error("Failed to save workflow instance", &e))?;
        Ok(())
    }

    async fn find_by_id(&self, instance_id: &str) -> CoreResult<Option<WorkflowInstance>> {
        workflow_instance::Entity::find_by_id(instance_id)
            .one(&self.db)
            .await
            .map_err(|e| storage_error("Failed to query workflow instance", &e))?
            .map(workflow_instance::Model::into_instance)
            .transpose()
    }

    async fn find_by_account(&self, account_id: &str) -> CoreResult<Vec<WorkflowInstance>> {
        let rows = workflow_instance::Entity::find()
            .filter(workflow_instance::Column::AccountId.eq(account_id))
            .order_by_asc(workflow_instance::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| storage_error("Failed to query workflow instances", &e))?;
        into_instances(rows)
    }

    async fn find_by_status(&self, status: WorkflowStatus) -> CoreResult<Vec<WorkflowInstance>> {
        let rows = workflow_instance::Entity::find()
            .filter(workflow_instance::Column::Status.eq(status.as_str()))
            .order_by_asc(workflow_instance::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| storage_error("Failed to query workflow instances", &e))?;
        into_instances(rows)
    }

    async fn consume_resume_token(&self, token: &str) -> CoreResult<Option<WorkflowInstance>> {
        let suspended = WorkflowStatus::Suspended.as_str();
        let Some(row) = workflow_instance::Entity::find()
            .filter(workflow_instance::Column::Status.eq(suspended))
            .filter(workflow_instance::Column::ResumeToken.eq(token))
            .one(&self.db)
            .await
            .map_err(|e| storage_error("Failed to query workflow instance", &e))?
        else {
            return Ok(None);
        };

        // The claim is the guarded update; a concurrent claimer matches no row
        let claim = workflow_instance::ActiveModel {
            status: Set(WorkflowStatus::Running.as_str().to_string()),
            step: Set(WorkflowStep::ResumeAfterProvisioning.as_str().to_string()),
            resume_token: Set(None),
            updated_at: Set(timestamp(&Utc::now())),
            ..Default::default()
        };
        let result = workflow_instance::Entity::update_many()
            .set(claim)
            .filter(workflow_instance::Column::InstanceId.eq(row.instance_id.as_str()))
            .filter(workflow_instance::Column::Status.eq(suspended))
            .filter(workflow_instance::Column::ResumeToken.eq(token))
            .exec(&self.db)
            .await
            .map_err(|e| storage_error("Failed to claim workflow instance", &e))?;
        if result.rows_affected == 0 {
            return Ok(None);
        }

        WorkflowRepository::find_by_id(self, &row.instance_id).await
    }
}
