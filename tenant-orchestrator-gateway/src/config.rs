//! Client configuration.
//!
//! Every option is explicit; nothing is read from the process environment here.

use serde::{Deserialize, Serialize};

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_artifact_name() -> String {
    "AWS Control Tower Account Factory".to_string()
}

fn default_organizational_unit() -> String {
    "Sandbox".to_string()
}

fn default_sso_first_name() -> String {
    "System".to_string()
}

fn default_sso_last_name() -> String {
    "Admin".to_string()
}

fn default_poll_interval_secs() -> u64 {
    15
}

/// Where and how to reach one external HTTP service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EndpointConfig {
    /// Base URL, e.g. `https://factory.internal/api`
    pub base_url: String,
    /// Bearer token sent with every request
    #[serde(default)]
    pub api_token: Option<String>,
    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retries for transient failures (0 disables retrying)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl EndpointConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }

    /// Join `path` onto the base URL.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn validate(&self, section: &str, problems: &mut Vec<String>) {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            problems.push(format!("{section}.base_url must be an http(s) URL"));
        }
        if self.request_timeout_secs == 0 {
            problems.push(format!("{section}.request_timeout_secs must be > 0"));
        }
    }
}

/// Account factory client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountFactoryConfig {
    #[serde(flatten)]
    pub endpoint: EndpointConfig,
    /// Catalog product used to vend accounts
    pub product_name: String,
    #[serde(default = "default_artifact_name")]
    pub provisioning_artifact_name: String,
    /// Organizational unit new accounts are placed in
    #[serde(default = "default_organizational_unit")]
    pub organizational_unit: String,
    #[serde(default = "default_sso_first_name")]
    pub sso_user_first_name: String,
    #[serde(default = "default_sso_last_name")]
    pub sso_user_last_name: String,
}

impl AccountFactoryConfig {
    pub fn new(endpoint: EndpointConfig, product_name: impl Into<String>) -> Self {
        Self {
            endpoint,
            product_name: product_name.into(),
            provisioning_artifact_name: default_artifact_name(),
            organizational_unit: default_organizational_unit(),
            sso_user_first_name: default_sso_first_name(),
            sso_user_last_name: default_sso_last_name(),
        }
    }
}

/// Delivery (build + pipeline) client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeliveryConfig {
    #[serde(flatten)]
    pub endpoint: EndpointConfig,
    /// Build project provisioning tenant infrastructure
    pub infra_build_project: String,
    /// Build project producing the tenant release bundle
    pub release_build_project: String,
    /// How often a running build is polled
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

/// All gateway settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub account_factory: AccountFactoryConfig,
    pub delivery: DeliveryConfig,
}

impl GatewayConfig {
    /// Check every option, returning all problems found.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut problems = Vec::new();

        self.account_factory
            .endpoint
            .validate("account_factory", &mut problems);
        if self.account_factory.product_name.trim().is_empty() {
            problems.push("account_factory.product_name must not be empty".to_string());
        }

        self.delivery.endpoint.validate("delivery", &mut problems);
        if self.delivery.infra_build_project.trim().is_empty() {
            problems.push("delivery.infra_build_project must not be empty".to_string());
        }
        if self.delivery.release_build_project.trim().is_empty() {
            problems.push("delivery.release_build_project must not be empty".to_string());
        }
        if self.delivery.poll_interval_secs == 0 {
            problems.push("delivery.poll_interval_secs must be > 0".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}
