//! Orchestrator configuration.
//!
//! Every recognised option is listed here and checked once at startup by
//! [`OrchestratorConfig::validate`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::utils::release_window::parse_window;

fn default_role_name() -> String {
    "AWSControlTowerExecution".to_string()
}

fn default_infra_build_timeout_secs() -> u64 {
    3600
}

fn default_release_build_timeout_secs() -> u64 {
    3600
}

fn default_pipeline_timeout_secs() -> u64 {
    120
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_release_window() -> String {
    "00:00".to_string()
}

fn default_change_feed_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Local part used to derive account e-mail addresses
    pub account_email_user: String,
    /// Domain used to derive account e-mail addresses
    pub account_email_domain: String,
    /// Role the infrastructure build assumes inside the tenant's cloud account
    #[serde(default = "default_role_name")]
    pub account_role_name: String,
    #[serde(default = "default_infra_build_timeout_secs")]
    pub infra_build_timeout_secs: u64,
    #[serde(default = "default_release_build_timeout_secs")]
    pub release_build_timeout_secs: u64,
    #[serde(default = "default_pipeline_timeout_secs")]
    pub pipeline_timeout_secs: u64,
    /// Branch built when the account's first product carries no version
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Daily release window start, `HH:MM` UTC
    #[serde(default = "default_release_window")]
    pub release_window: String,
    /// Pending change-feed entries kept before new ones are dropped
    #[serde(default = "default_change_feed_capacity")]
    pub change_feed_capacity: usize,
}

impl OrchestratorConfig {
    pub fn new(account_email_user: impl Into<String>, account_email_domain: impl Into<String>) -> Self {
        Self {
            account_email_user: account_email_user.into(),
            account_email_domain: account_email_domain.into(),
            account_role_name: default_role_name(),
            infra_build_timeout_secs: default_infra_build_timeout_secs(),
            release_build_timeout_secs: default_release_build_timeout_secs(),
            pipeline_timeout_secs: default_pipeline_timeout_secs(),
            default_branch: default_branch(),
            release_window: default_release_window(),
            change_feed_capacity: default_change_feed_capacity(),
        }
    }

    /// Root e-mail of a tenant's cloud account: `user+name@domain`.
    pub fn account_email(&self, customer_name: &str) -> String {
        format!(
            "{}+{customer_name}@{}",
            self.account_email_user, self.account_email_domain
        )
    }

    /// E-mail of the administrator provisioned into every account.
    pub fn admin_email(&self) -> String {
        format!("{}@{}", self.account_email_user, self.account_email_domain)
    }

    pub fn infra_build_timeout(&self) -> Duration {
        Duration::from_secs(self.infra_build_timeout_secs)
    }

    pub fn release_build_timeout(&self) -> Duration {
        Duration::from_secs(self.release_build_timeout_secs)
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline_timeout_secs)
    }

    pub fn validate(&self) -> CoreResult<()> {
        let mut problems = Vec::new();

        if self.account_email_user.trim().is_empty() {
            problems.push("account_email_user must not be empty");
        }
        if self.account_email_user.contains('@') {
            problems.push("account_email_user must not contain '@'");
        }
        if self.account_email_domain.trim().is_empty() {
            problems.push("account_email_domain must not be empty");
        }
        if self.account_role_name.trim().is_empty() {
            problems.push("account_role_name must not be empty");
        }
        if self.infra_build_timeout_secs == 0
            || self.release_build_timeout_secs == 0
            || self.pipeline_timeout_secs == 0
        {
            problems.push("step timeouts must be > 0");
        }
        if self.default_branch.trim().is_empty() {
            problems.push("default_branch must not be empty");
        }
        if parse_window(&self.release_window).is_none() {
            problems.push("release_window must be HH:MM");
        }
        if self.change_feed_capacity == 0 {
            problems.push("change_feed_capacity must be > 0");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CoreError::ConfigError(problems.join("; ")))
        }
    }
}
