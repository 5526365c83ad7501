//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

// Re-export library error type
pub use tenant_orchestrator_gateway::GatewayError;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// No account with this id
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Customer name already owned by another account
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation not allowed in the account's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A provisioning outcome could not be matched to exactly one account
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    /// An external step reported failure
    #[error("{operation} failed: {message}")]
    ExternalOperationFailure { operation: String, message: String },

    /// An external step exceeded its deadline
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// A conditional write found the record changed underneath it
    #[error("Condition failed for account: {0}")]
    ConditionFailed(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Gateway error (converting from library)
    #[error("{0}")]
    Gateway(#[from] GatewayError),
}

impl CoreError {
    /// Whether it is expected behavior (caller input, lost race, missing resource); used for log levels.
    ///
    /// Use `warn` when this returns `true` and `error` when it returns `false`.
    /// **Keep this in sync when adding variants.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::AccountNotFound(_)
            | Self::Conflict(_)
            | Self::InvalidState(_)
            | Self::Reconciliation(_)
            | Self::ConditionFailed(_)
            | Self::ValidationError(_) => true,
            Self::Gateway(e) => e.is_expected(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
