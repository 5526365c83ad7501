//! Request helpers shared by the HTTP clients

use reqwest::RequestBuilder;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::EndpointConfig;
use crate::error::Result;
use crate::http_client::HttpUtils;
use crate::traits::{RawApiError, ServiceErrorMapper};
use crate::utils::log_sanitizer::truncate_for_log;

/// Attach the bearer token, if one is configured.
pub(crate) fn authorize(request: RequestBuilder, endpoint: &EndpointConfig) -> RequestBuilder {
    match endpoint.api_token.as_deref() {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Pull a human readable message out of an error body.
///
/// Services answer `{"message": ...}` or `{"error": ...}`; anything else is logged raw.
pub(crate) fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| truncate_for_log(body))
}

/// Send a request and decode a JSON success body.
///
/// Non-2xx statuses are mapped through the client's [`ServiceErrorMapper`].
pub(crate) async fn send_json<M, T>(
    mapper: &M,
    request: RequestBuilder,
    method_name: &str,
    url: &str,
    resource: &str,
    max_retries: u32,
) -> Result<T>
where
    M: ServiceErrorMapper,
    T: DeserializeOwned,
{
    let service = mapper.service_name();
    let (status, body) =
        HttpUtils::execute_request_with_retry(request, service, method_name, url, max_retries)
            .await?;

    if !(200..300).contains(&status) {
        let err = mapper.map_error(RawApiError::new(status, error_message(&body)), resource);
        log::warn!("[{service}] {method_name} {url} failed: {err}");
        return Err(err);
    }

    HttpUtils::parse_json(&body, service)
}

/// Send a request whose success body is irrelevant.
pub(crate) async fn send_ack<M>(
    mapper: &M,
    request: RequestBuilder,
    method_name: &str,
    url: &str,
    resource: &str,
    max_retries: u32,
) -> Result<()>
where
    M: ServiceErrorMapper,
{
    let service = mapper.service_name();
    let (status, body) =
        HttpUtils::execute_request_with_retry(request, service, method_name, url, max_retries)
            .await?;

    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(mapper.map_error(RawApiError::new(status, error_message(&body)), resource))
    }
}
