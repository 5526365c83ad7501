//! Build and pipeline HTTP client

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::common::{authorize, send_json};
use crate::config::DeliveryConfig;
use crate::error::Result;
use crate::http_client::create_http_client;
use crate::traits::{DeliveryService, ServiceErrorMapper};
use crate::types::{BuildOutcome, BuildStatus, InfraBuildRequest, ReleaseBuildRequest};

const SERVICE_NAME: &str = "delivery";

// Environment variables handed to build projects
const ENV_CLOUD_ACCOUNT_ID: &str = "AWS_ACCOUNT_ID";
const ENV_ACCOUNT_ID: &str = "ACCOUNT_ID";
const ENV_ROLE_NAME: &str = "ACCOUNT_ROLE_NAME";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBuildBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    source_version: Option<&'a str>,
    environment_overrides: BTreeMap<&'static str, &'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartBuildResponse {
    build_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildResponse {
    build_id: String,
    status: BuildStatus,
    #[serde(default)]
    artifact_location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionResponse {
    pipeline_execution_id: String,
}

/// [`DeliveryService`] backed by the build/pipeline REST API.
///
/// Builds are started and then polled every `poll_interval_secs` until they
/// reach a terminal status. There is no deadline here; callers wrap the call.
pub struct HttpDeliveryService {
    client: Client,
    config: DeliveryConfig,
}

impl HttpDeliveryService {
    pub fn new(config: DeliveryConfig) -> Result<Self> {
        let client = create_http_client(
            SERVICE_NAME,
            Duration::from_secs(config.endpoint.request_timeout_secs),
        )?;
        Ok(Self { client, config })
    }

    async fn start_build(&self, project: &str, body: &StartBuildBody<'_>) -> Result<String> {
        let url = self
            .config
            .endpoint
            .url(&format!("/projects/{}/builds", urlencoding::encode(project)));
        let builder = authorize(self.client.post(&url).json(body), &self.config.endpoint);
        let response: StartBuildResponse = send_json(
            self,
            builder,
            "start_build",
            &url,
            project,
            self.config.endpoint.max_retries,
        )
        .await?;
        log::info!(
            "[{SERVICE_NAME}] Started build {} of {project}",
            response.build_id
        );
        Ok(response.build_id)
    }

    async fn get_build(&self, build_id: &str) -> Result<BuildResponse> {
        let url = self
            .config
            .endpoint
            .url(&format!("/builds/{}", urlencoding::encode(build_id)));
        let builder = authorize(self.client.get(&url), &self.config.endpoint);
        send_json(
            self,
            builder,
            "get_build",
            &url,
            build_id,
            self.config.endpoint.max_retries,
        )
        .await
    }

    async fn wait_for_build(&self, build_id: String) -> Result<BuildOutcome> {
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        loop {
            let build = self.get_build(&build_id).await?;
            if build.status.is_terminal() {
                log::info!(
                    "[{SERVICE_NAME}] Build {} finished: {:?}",
                    build.build_id,
                    build.status
                );
                return Ok(BuildOutcome {
                    build_id: build.build_id,
                    status: build.status,
                    artifact: build.artifact_location,
                });
            }
            log::debug!("[{SERVICE_NAME}] Build {build_id} still running");
            tokio::time::sleep(interval).await;
        }
    }
}

impl ServiceErrorMapper for HttpDeliveryService {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }
}

#[async_trait]
impl DeliveryService for HttpDeliveryService {
    fn id(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn run_infra_build(&self, request: &InfraBuildRequest) -> Result<BuildOutcome> {
        let body = StartBuildBody {
            source_version: None,
            environment_overrides: BTreeMap::from([
                (ENV_CLOUD_ACCOUNT_ID, request.cloud_account_id.as_str()),
                (ENV_ACCOUNT_ID, request.account_id.as_str()),
                (ENV_ROLE_NAME, request.execution_role.role_name.as_str()),
            ]),
        };
        let build_id = self
            .start_build(&self.config.infra_build_project, &body)
            .await?;
        self.wait_for_build(build_id).await
    }

    async fn run_release_build(&self, request: &ReleaseBuildRequest) -> Result<BuildOutcome> {
        let body = StartBuildBody {
            source_version: Some(&request.source_version),
            environment_overrides: BTreeMap::from([
                (ENV_CLOUD_ACCOUNT_ID, request.cloud_account_id.as_str()),
                (ENV_ACCOUNT_ID, request.account_id.as_str()),
            ]),
        };
        let build_id = self
            .start_build(&self.config.release_build_project, &body)
            .await?;
        self.wait_for_build(build_id).await
    }

    async fn start_pipeline_execution(&self, pipeline_name: &str) -> Result<String> {
        let url = self.config.endpoint.url(&format!(
            "/pipelines/{}/executions",
            urlencoding::encode(pipeline_name)
        ));
        let builder = authorize(
            self.client.post(&url).json(&serde_json::json!({})),
            &self.config.endpoint,
        );
        let response: StartExecutionResponse = send_json(
            self,
            builder,
            "start_pipeline_execution",
            &url,
            pipeline_name,
            self.config.endpoint.max_retries,
        )
        .await?;
        log::info!(
            "[{SERVICE_NAME}] Started {pipeline_name} execution {}",
            response.pipeline_execution_id
        );
        Ok(response.pipeline_execution_id)
    }
}
