//! Server configuration.
//!
//! Loaded from a TOML file; a few orchestrator options can be overridden from
//! the environment.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::Deserialize;

use tenant_orchestrator_core::OrchestratorConfig;
use tenant_orchestrator_gateway::GatewayConfig;
use tenant_orchestrator_gateway::log_sanitizer::mask_secret;

/// Environment variables overriding `[orchestrator]` options.
const ENV_OVERRIDES: [&str; 3] = [
    "ACCOUNT_EMAIL_USER",
    "ACCOUNT_EMAIL_DOMAIN",
    "ACCOUNT_ROLE_NAME",
];

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/tenant-orchestrator.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// HTTP worker threads; actix picks the core count when unset
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Directory receiving change-feed records; disabled when unset
    #[serde(default)]
    pub change_feed_dir: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            change_feed_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Also write a daily rolling log file here
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

/// Complete configuration of the server binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
    pub orchestrator: OrchestratorConfig,
    pub gateway: GatewayConfig,
}

impl ServerConfig {
    /// Read `path`, apply environment overrides and validate.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::parse(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply overrides looked up through `lookup`; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in ENV_OVERRIDES {
            let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let target = match key {
                "ACCOUNT_EMAIL_USER" => &mut self.orchestrator.account_email_user,
                "ACCOUNT_EMAIL_DOMAIN" => &mut self.orchestrator.account_email_domain,
                _ => &mut self.orchestrator.account_role_name,
            };
            *target = value;
        }
    }

    /// Check every section, reporting all problems at once.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut problems = Vec::new();
        if let Err(e) = self.orchestrator.validate() {
            problems.push(e.to_string());
        }
        if let Err(gateway) = self.gateway.validate() {
            problems.extend(gateway);
        }
        if self.server.workers == Some(0) {
            problems.push("server.workers must be > 0".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            bail!("invalid configuration: {}", problems.join("; "))
        }
    }

    /// One-line summary for the startup log, with secrets masked.
    pub fn summary(&self) -> String {
        let token = |t: &Option<String>| t.as_deref().map_or_else(|| "none".to_string(), mask_secret);
        format!(
            "bind={} db={} change_feed={} factory={} (token {}) delivery={} (token {})",
            self.server.bind,
            self.storage.database_path.display(),
            self.storage
                .change_feed_dir
                .as_ref()
                .map_or_else(|| "disabled".to_string(), |d| d.display().to_string()),
            self.gateway.account_factory.endpoint.base_url,
            token(&self.gateway.account_factory.endpoint.api_token),
            self.gateway.delivery.endpoint.base_url,
            token(&self.gateway.delivery.endpoint.api_token),
        )
    }
}
