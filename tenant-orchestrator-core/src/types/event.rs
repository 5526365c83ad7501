//! Provisioning outcome notifications

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningOutcome {
    Succeeded,
    Failed,
}

/// Out-of-band report that an account-factory operation finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningOutcomeEvent {
    /// Cloud account created by the factory
    #[serde(rename = "awsAccountId")]
    pub external_account_id: String,
    /// Tenant name the account was provisioned for
    #[serde(rename = "accountName")]
    pub tenant_name: String,
    #[serde(rename = "state")]
    pub outcome: ProvisioningOutcome,
}

/// What reconciling an outcome event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileResult {
    /// The suspended instance was resumed
    Resumed,
    /// The event had already been applied
    Duplicate,
}
