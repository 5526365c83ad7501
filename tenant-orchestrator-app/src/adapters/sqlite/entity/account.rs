//! `SeaORM` entity for the `accounts` table.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
/// Database row model for a tenant account.
///
/// `products` and `admin_emails` hold JSON arrays. Timestamps are RFC3339 with
/// nanoseconds, so they sort as text.
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: String,
    #[sea_orm(unique)]
    pub customer_name: String,
    pub products: String,
    pub admin_emails: String,
    pub expiration: String,
    pub account_status: String,
    pub cloud_account_id: Option<String>,
    pub external_operation_id: Option<String>,
    pub resume_token: Option<String>,
    pub provisioned_product_id: Option<String>,
    pub pipeline_name: String,
    pub last_updated: String,
    pub error: Option<String>,
    pub version: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
