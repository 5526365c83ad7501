//! `SeaORM` entities backing `SqliteStore`.

pub mod account;
pub mod workflow_instance;
