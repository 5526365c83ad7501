use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Account::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Account::AccountId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Account::CustomerName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Account::Products).string().not_null())
                    .col(ColumnDef::new(Account::AdminEmails).string().not_null())
                    .col(ColumnDef::new(Account::Expiration).string().not_null())
                    .col(ColumnDef::new(Account::AccountStatus).string().not_null())
                    .col(ColumnDef::new(Account::CloudAccountId).string().null())
                    .col(ColumnDef::new(Account::ExternalOperationId).string().null())
                    .col(ColumnDef::new(Account::ResumeToken).string().null())
                    .col(ColumnDef::new(Account::ProvisionedProductId).string().null())
                    .col(ColumnDef::new(Account::PipelineName).string().not_null())
                    .col(ColumnDef::new(Account::LastUpdated).string().not_null())
                    .col(ColumnDef::new(Account::Error).string().null())
                    .col(ColumnDef::new(Account::Version).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WorkflowInstance::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkflowInstance::InstanceId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WorkflowInstance::AccountId).string().not_null())
                    .col(ColumnDef::new(WorkflowInstance::Step).string().not_null())
                    .col(ColumnDef::new(WorkflowInstance::Status).string().not_null())
                    .col(ColumnDef::new(WorkflowInstance::Snapshot).string().not_null())
                    .col(ColumnDef::new(WorkflowInstance::ResumeToken).string().null())
                    .col(ColumnDef::new(WorkflowInstance::Failure).string().null())
                    .col(ColumnDef::new(WorkflowInstance::ExecutionId).string().null())
                    .col(ColumnDef::new(WorkflowInstance::CreatedAt).string().not_null())
                    .col(ColumnDef::new(WorkflowInstance::UpdatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflow_instances_account_id")
                    .table(WorkflowInstance::Table)
                    .col(WorkflowInstance::AccountId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_workflow_instances_resume_token")
                    .table(WorkflowInstance::Table)
                    .col(WorkflowInstance::ResumeToken)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkflowInstance::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Account::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Account {
    #[sea_orm(iden = "accounts")]
    Table,
    AccountId,
    CustomerName,
    Products,
    AdminEmails,
    Expiration,
    AccountStatus,
    CloudAccountId,
    ExternalOperationId,
    ResumeToken,
    ProvisionedProductId,
    PipelineName,
    LastUpdated,
    Error,
    Version,
}

#[derive(DeriveIden)]
enum WorkflowInstance {
    #[sea_orm(iden = "workflow_instances")]
    Table,
    InstanceId,
    AccountId,
    Step,
    Status,
    Snapshot,
    ResumeToken,
    Failure,
    ExecutionId,
    CreatedAt,
    UpdatedAt,
}
