//! Account related type definitions

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Provisioning lifecycle of a tenant account.
///
/// Progresses forward only; `AccountCreationFailed` may go back to
/// `AccountProvisioning` when a fresh request retries the creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Initiating,
    AccountProvisioning,
    AccountCreated,
    AccountCreationFailed,
    Available,
}

impl AccountStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initiating => "INITIATING",
            Self::AccountProvisioning => "ACCOUNT_PROVISIONING",
            Self::AccountCreated => "ACCOUNT_CREATED",
            Self::AccountCreationFailed => "ACCOUNT_CREATION_FAILED",
            Self::Available => "AVAILABLE",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIATING" => Ok(Self::Initiating),
            "ACCOUNT_PROVISIONING" => Ok(Self::AccountProvisioning),
            "ACCOUNT_CREATED" => Ok(Self::AccountCreated),
            "ACCOUNT_CREATION_FAILED" => Ok(Self::AccountCreationFailed),
            "AVAILABLE" => Ok(Self::Available),
            other => Err(CoreError::SerializationError(format!(
                "unknown account status '{other}'"
            ))),
        }
    }
}

/// A product deployed into the tenant account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    /// Branch, tag or version released for this tenant
    pub version: String,
}

/// Marker of an outstanding account-factory operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningHandle {
    /// Identifier returned by the account factory
    pub external_operation_id: String,
    /// Token of the suspended workflow instance waiting on the operation
    pub resume_token: String,
}

/// Tenant account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account ID (UUID)
    pub account_id: String,
    /// Tenant name, unique across accounts
    pub customer_name: String,
    pub products: Vec<Product>,
    pub admin_emails: BTreeSet<String>,
    #[serde(with = "crate::utils::datetime")]
    pub expiration: DateTime<Utc>,
    pub account_status: AccountStatus,
    /// Provisioned cloud account id; write-once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_account_id: Option<String>,
    /// Present exactly while an account-factory operation is outstanding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_handle: Option<ProvisioningHandle>,
    /// Account-factory product id, kept after the handle clears
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned_product_id: Option<String>,
    /// Always `<customerName>-pipeline`
    pub pipeline_name: String,
    #[serde(with = "crate::utils::datetime")]
    pub last_updated: DateTime<Utc>,
    /// Last orchestration failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Last version reported by the release pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Account {
    /// New record in `INITIATING` with a generated id.
    pub fn new(
        customer_name: String,
        products: Vec<Product>,
        admin_emails: BTreeSet<String>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id: uuid::Uuid::new_v4().to_string(),
            pipeline_name: Self::pipeline_name_for(&customer_name),
            customer_name,
            products,
            admin_emails,
            expiration,
            account_status: AccountStatus::Initiating,
            cloud_account_id: None,
            provisioning_handle: None,
            provisioned_product_id: None,
            last_updated: Utc::now(),
            error: None,
            version: None,
        }
    }

    pub fn pipeline_name_for(customer_name: &str) -> String {
        format!("{customer_name}-pipeline")
    }

    /// Record a mutation: recompute derived fields and bump `last_updated`.
    pub fn touch(&mut self) {
        self.pipeline_name = Self::pipeline_name_for(&self.customer_name);
        self.last_updated = Utc::now();
    }

    /// Copy the fields owned by the provisioning workflow from `other`.
    ///
    /// Products, expiration, admin e-mails, error and version belong to the
    /// ingestion and release callbacks and are left untouched.
    pub fn apply_workflow_state(&mut self, other: &Account) {
        self.customer_name.clone_from(&other.customer_name);
        self.pipeline_name.clone_from(&other.pipeline_name);
        self.account_status = other.account_status;
        self.cloud_account_id.clone_from(&other.cloud_account_id);
        self.provisioning_handle.clone_from(&other.provisioning_handle);
        self.provisioned_product_id
            .clone_from(&other.provisioned_product_id);
        self.last_updated = other.last_updated;
    }

    pub fn has_outstanding_operation(&self) -> bool {
        self.provisioning_handle.is_some()
    }

    pub fn resume_token(&self) -> Option<&str> {
        self.provisioning_handle
            .as_ref()
            .map(|h| h.resume_token.as_str())
    }

    /// Idempotency token for account creation, derived from `last_updated`.
    ///
    /// Resubmitting the same record yields the same token.
    pub fn correlation_token(&self) -> String {
        self.last_updated
            .to_rfc3339()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
            .collect()
    }

    /// Idempotency token for account updates.
    pub fn update_token(&self) -> String {
        self.last_updated.to_rfc3339()
    }

    /// Version of the first product, the branch released for this tenant.
    pub fn release_branch(&self) -> Option<&str> {
        self.products
            .first()
            .map(|p| p.version.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

/// Create or update request accepted by the ingestion API.
///
/// Without `accountId` it creates; with one it updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default, with = "crate::utils::datetime::option")]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(default)]
    pub products: Option<Vec<Product>>,
    #[serde(default)]
    pub admin_emails: Option<Vec<String>>,
}

/// A request whose required fields are all present.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedRequest {
    pub customer_name: String,
    pub expiration: DateTime<Utc>,
    pub products: Vec<Product>,
    pub admin_emails: BTreeSet<String>,
}

impl AccountRequest {
    pub(crate) fn validate(&self) -> CoreResult<ValidatedRequest> {
        let customer_name = self
            .customer_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CoreError::ValidationError("customerName is required".into()))?;
        let expiration = self
            .expiration
            .ok_or_else(|| CoreError::ValidationError("expiration is required".into()))?;
        let products = self
            .products
            .clone()
            .ok_or_else(|| CoreError::ValidationError("products is required".into()))?;
        if let Some(p) = products
            .iter()
            .find(|p| p.name.trim().is_empty() || p.version.trim().is_empty())
        {
            return Err(CoreError::ValidationError(format!(
                "product '{}' needs both name and version",
                p.name
            )));
        }
        let admin_emails = self
            .admin_emails
            .as_ref()
            .ok_or_else(|| CoreError::ValidationError("adminEmails is required".into()))?
            .iter()
            .map(|e| e.trim().to_string())
            .collect::<BTreeSet<_>>();
        if admin_emails.iter().any(|e| !e.contains('@')) {
            return Err(CoreError::ValidationError(
                "adminEmails must be e-mail addresses".into(),
            ));
        }

        Ok(ValidatedRequest {
            customer_name: customer_name.to_string(),
            expiration,
            products,
            admin_emails,
        })
    }
}

/// Response of the ingestion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub status: AccountStatus,
    pub account_id: String,
}
