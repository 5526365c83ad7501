//! HTTP handlers and route table.

mod accounts;
mod events;

use actix_web::{HttpRequest, HttpResponse, error, web};
use serde_json::json;
use std::sync::atomic::Ordering;

use tenant_orchestrator_app::AppState;
use tenant_orchestrator_core::CoreError;

use crate::error::ApiError;

/// Register every route on `cfg`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .route("/", web::put().to(accounts::ingest))
        .route("/healthz", web::get().to(health))
        .route("/release-window", web::get().to(accounts::release_window))
        .route(
            "/events/provisioning-outcome",
            web::post().to(events::provisioning_outcome),
        )
        .service(
            web::scope("/accounts")
                .route("", web::put().to(accounts::ingest))
                .route("", web::get().to(accounts::list))
                .route("/{account_id}", web::get().to(accounts::get))
                .route("/{account_id}/version", web::put().to(accounts::update_version))
                .route("/{account_id}/activate", web::post().to(accounts::activate)),
        );
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    let ready = state.startup_completed.load(Ordering::SeqCst);
    let body = json!({"status": if ready { "ok" } else { "starting" }});
    if ready {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Malformed bodies answer 400 in the same shape as other errors.
fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError(CoreError::ValidationError(err.to_string())).into()
}

fn query_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError(CoreError::ValidationError(err.to_string())).into()
}
