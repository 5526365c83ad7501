use async_trait::async_trait;

use crate::error::{GatewayError, Result};
use crate::types::{
    BuildOutcome, InfraBuildRequest, ProvisionAccountRequest, ReleaseBuildRequest,
    UpdateProvisionedAccountRequest,
};

/// Raw API error (internal)
#[derive(Debug, Clone)]
pub(crate) struct RawApiError {
    /// HTTP status code
    pub status: u16,
    /// Error message extracted from the body (or the raw body)
    pub message: String,
}

impl RawApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Maps non-success HTTP responses to [`GatewayError`] (internal)
pub(crate) trait ServiceErrorMapper {
    /// Service identifier used in errors and logs
    fn service_name(&self) -> &'static str;

    /// Map a raw API error; `resource` names what the request was about
    fn map_error(&self, raw: RawApiError, resource: &str) -> GatewayError {
        let service = self.service_name().to_string();
        match raw.status {
            401 | 403 => GatewayError::Unauthorized {
                service,
                raw_message: Some(raw.message),
            },
            404 => GatewayError::NotFound {
                service,
                resource: resource.to_string(),
                raw_message: Some(raw.message),
            },
            400..=499 => GatewayError::Rejected {
                service,
                status: raw.status,
                raw_message: raw.message,
            },
            _ => GatewayError::Unknown {
                service,
                status: Some(raw.status),
                raw_message: raw.message,
            },
        }
    }

    /// Shortcut: parse error
    fn parse_error(&self, detail: impl ToString) -> GatewayError {
        GatewayError::ParseError {
            service: self.service_name().to_string(),
            detail: detail.to_string(),
        }
    }
}

/// External account factory.
///
/// Creation is fire-and-forget: the returned operation id only acknowledges the
/// submission; the outcome arrives later as a provisioning outcome event.
#[async_trait]
pub trait AccountFactory: Send + Sync {
    /// Implementation identifier
    fn id(&self) -> &'static str;

    /// Submit a create request, returning the external operation (provisioned product) id.
    async fn submit_create(&self, request: &ProvisionAccountRequest) -> Result<String>;

    /// Submit an update to an existing provisioned account; returns once acknowledged.
    async fn submit_update(&self, request: &UpdateProvisionedAccountRequest) -> Result<()>;
}

/// External build and release pipeline service.
///
/// Build calls block until the build reaches a terminal state. Callers bound them
/// with their own deadline.
#[async_trait]
pub trait DeliveryService: Send + Sync {
    /// Implementation identifier
    fn id(&self) -> &'static str;

    /// Run the infrastructure build for a provisioned cloud account.
    async fn run_infra_build(&self, request: &InfraBuildRequest) -> Result<BuildOutcome>;

    /// Run the tenant release build producing a deployable artifact.
    async fn run_release_build(&self, request: &ReleaseBuildRequest) -> Result<BuildOutcome>;

    /// Start an execution of the named release pipeline, returning the execution id.
    async fn start_pipeline_execution(&self, pipeline_name: &str) -> Result<String>;
}
