//! `SeaORM` entity for the `workflow_instances` table.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "workflow_instances")]
/// Database row model for a workflow instance; `snapshot` is the account JSON.
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub instance_id: String,
    pub account_id: String,
    pub step: String,
    pub status: String,
    pub snapshot: String,
    pub resume_token: Option<String>,
    pub failure: Option<String>,
    pub execution_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
