use actix_web::{HttpResponse, web};
use serde_json::json;

use tenant_orchestrator_app::AppState;
use tenant_orchestrator_core::types::ProvisioningOutcomeEvent;

use crate::error::ApiError;

/// Out-of-band notification from the account factory.
pub async fn provisioning_outcome(
    state: web::Data<AppState>,
    body: web::Json<ProvisioningOutcomeEvent>,
) -> Result<HttpResponse, ApiError> {
    let result = state.reconciler.reconcile(&body).await?;
    Ok(HttpResponse::Ok().json(json!({ "result": result })))
}
