use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use tenant_orchestrator_app::AppState;
use tenant_orchestrator_core::types::AccountRequest;

use crate::error::ApiError;

type ApiResult = Result<HttpResponse, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    provisioned: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionBody {
    version_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateBody {
    cloud_account_id: String,
}

/// `PUT /` and `PUT /accounts`: create without `accountId`, update with it.
pub async fn ingest(state: web::Data<AppState>, body: web::Json<AccountRequest>) -> ApiResult {
    let response = state.ingestion_service.ingest(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn list(state: web::Data<AppState>, query: web::Query<ListQuery>) -> ApiResult {
    let accounts = if query.provisioned {
        state.account_service.list_provisioned().await?
    } else {
        state.account_service.list_accounts().await?
    };
    Ok(HttpResponse::Ok().json(accounts))
}

pub async fn get(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult {
    let account = state.account_service.get_account(&path).await?;
    Ok(HttpResponse::Ok().json(account))
}

/// Called by the release pipeline once a version is deployed.
pub async fn update_version(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<VersionBody>,
) -> ApiResult {
    let account = state
        .account_service
        .update_version(&path, &body.version_number)
        .await?;
    Ok(HttpResponse::Ok().json(account))
}

pub async fn activate(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ActivateBody>,
) -> ApiResult {
    let account = state
        .account_service
        .activate_existing(&path, &body.cloud_account_id)
        .await?;
    Ok(HttpResponse::Ok().json(account))
}

pub async fn release_window(state: web::Data<AppState>) -> ApiResult {
    let seconds = state.account_service.seconds_until_release_window(Utc::now())?;
    Ok(HttpResponse::Ok().json(json!({ "timeUntilNextDeploymentWindowSeconds": seconds })))
}
