//! Request and response types shared by the gateway clients.

use serde::{Deserialize, Serialize};

// ============ Account factory ============

/// Request to provision a brand new cloud account for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionAccountRequest {
    /// Tenant name; becomes the provisioned product name and the account name.
    pub customer_name: String,
    /// Root e-mail address of the new cloud account.
    pub account_email: String,
    /// E-mail of the initial administrator (single sign-on user).
    pub admin_email: String,
    /// Idempotency token. Resubmitting with the same token must not create a second account.
    pub correlation_token: String,
}

/// Request to update an already provisioned account (currently: rename).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProvisionedAccountRequest {
    /// Identifier returned by the original `submit_create`.
    pub provisioned_product_id: String,
    /// New tenant name.
    pub customer_name: String,
    /// New root e-mail address derived from the new name.
    pub account_email: String,
    /// Idempotency token for the update.
    pub update_token: String,
}

/// A single provisioning parameter in the account factory wire format.
///
/// Either `value` is set, or `use_previous_value` asks the factory to keep
/// whatever the product was provisioned with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningParameter {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_previous_value: Option<bool>,
}

impl ProvisioningParameter {
    pub fn value(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: Some(value.into()),
            use_previous_value: None,
        }
    }

    pub fn keep(key: &str) -> Self {
        Self {
            key: key.to_string(),
            value: None,
            use_previous_value: Some(true),
        }
    }
}

// ============ Delivery (builds / pipelines) ============

/// Plain reference to the role the infra build assumes inside the tenant's cloud account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRole {
    pub role_name: String,
}

/// Input of the infrastructure build for a freshly provisioned account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraBuildRequest {
    /// Tenant account id (control plane key).
    pub account_id: String,
    /// Provisioned cloud account id.
    pub cloud_account_id: String,
    /// Role the build assumes in the cloud account.
    pub execution_role: ExecutionRole,
}

/// Input of the tenant-specific release build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseBuildRequest {
    pub account_id: String,
    pub cloud_account_id: String,
    /// Branch, tag or version to build.
    pub source_version: String,
}

/// Build status as reported by the delivery service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    InProgress,
    Succeeded,
    Failed,
    Fault,
    Stopped,
    TimedOut,
}

impl BuildStatus {
    /// Whether the build has reached a final state.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Final result of a build run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutcome {
    pub build_id: String,
    pub status: BuildStatus,
    /// Artifact location for release builds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl BuildOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == BuildStatus::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioning_parameter_wire_format() {
        let set = serde_json::to_value(ProvisioningParameter::value("AccountName", "acme")).unwrap();
        assert_eq!(set, serde_json::json!({"key": "AccountName", "value": "acme"}));

        let keep = serde_json::to_value(ProvisioningParameter::keep("SSOUserEmail")).unwrap();
        assert_eq!(
            keep,
            serde_json::json!({"key": "SSOUserEmail", "usePreviousValue": true})
        );
    }

    #[test]
    fn build_status_parses_screaming_case() {
        let status: BuildStatus = serde_json::from_str("\"TIMED_OUT\"").unwrap();
        assert_eq!(status, BuildStatus::TimedOut);
        assert!(status.is_terminal());
        assert!(!BuildStatus::InProgress.is_terminal());
    }
}
