//! HTTP mapping of core errors.

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use tenant_orchestrator_core::CoreError;

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            CoreError::ValidationError(_) => StatusCode::BAD_REQUEST,
            CoreError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_)
            | CoreError::InvalidState(_)
            | CoreError::Reconciliation(_)
            | CoreError::ConditionFailed(_) => StatusCode::CONFLICT,
            CoreError::ExternalOperationFailure { .. } | CoreError::Gateway(_) => {
                StatusCode::BAD_GATEWAY
            }
            CoreError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CoreError::StorageError(_)
            | CoreError::SerializationError(_)
            | CoreError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `{code, details, message}`
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if self.0.is_expected() {
            tracing::warn!(status = status.as_u16(), "request rejected: {}", self.0);
        } else {
            tracing::error!(status = status.as_u16(), "request failed: {}", self.0);
        }

        let mut body = serde_json::to_value(&self.0).unwrap_or_else(|_| json!({}));
        if let Some(map) = body.as_object_mut() {
            map.insert("message".to_string(), json!(self.0.to_string()));
        }
        HttpResponse::build(status).json(body)
    }
}
