//! SQLite-based store using `SeaORM`.
//!
//! A single `SqliteStore` implements `AccountRepository` and
//! `WorkflowRepository`, backed by a local `SQLite` database. Conditional
//! writes are single `UPDATE ... WHERE` statements; the unique index on
//! `customer_name` rejects duplicate tenants.

mod account_repo;
pub(crate) mod entity;
mod migration;
mod workflow_repo;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{Database, DatabaseConnection, DbErr, SqlErr};
use sea_orm_migration::MigratorTrait;

use tenant_orchestrator_core::error::{CoreError, CoreResult};

use migration::Migrator;

/// SQLite-based store for accounts and workflow instances.
pub struct SqliteStore {
    /// Shared `SeaORM` database connection.
    pub(crate) db: DatabaseConnection,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and bring its schema up to date.
    ///
    /// # Errors
    /// Returns `CoreError::StorageError` if directory creation, database
    /// connection, or schema migration fails.
    pub async fn new(db_path: &Path) -> CoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::StorageError(format!("Failed to create directory: {e}")))?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let db = Database::connect(&db_url)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to connect to SQLite: {e}")))?;

        let store = Self { db };

        // Ensure schema is up to date before the store is used.
        Migrator::up(&store.db, None)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to run migrations: {e}")))?;

        Ok(store)
    }
}

/// Fixed-width RFC3339 so stored timestamps order as text.
pub(crate) fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::SerializationError(format!("Invalid {field}: {e}")))
}

pub(crate) fn storage_error(context: &str, err: &DbErr) -> CoreError {
    CoreError::StorageError(format!("{context}: {err}"))
}

/// Map a failed account write, turning unique violations into `Conflict`.
pub(crate) fn account_write_error(context: &str, customer_name: &str, err: &DbErr) -> CoreError {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        CoreError::Conflict(format!("customer name '{customer_name}' is already in use"))
    } else {
        storage_error(context, err)
    }
}
