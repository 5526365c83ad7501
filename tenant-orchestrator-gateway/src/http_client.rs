//! Shared HTTP plumbing for the gateway clients
//!
//! Every client builds its own `RequestBuilder` (URL, body, auth) and hands it to
//! [`HttpUtils`], which owns sending, logging, status classification and retries.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::error::GatewayError;
use crate::utils::log_sanitizer::truncate_for_log;

/// Default connect timeout (seconds)
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Build a `reqwest::Client` with the given request timeout.
pub(crate) fn create_http_client(
    service_name: &str,
    request_timeout: Duration,
) -> Result<Client, GatewayError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .timeout(request_timeout)
        .build()
        .map_err(|e| GatewayError::ClientError {
            service: service_name.to_string(),
            detail: format!("Failed to create HTTP client: {e}"),
        })
}

/// HTTP tool function set
pub(crate) struct HttpUtils;

impl HttpUtils {
    /// Performs an HTTP request and returns status code and response text
    ///
    /// 429 becomes `RateLimited`, 502/503/504 become `NetworkError` (both retryable).
    /// Every other status is returned to the caller for interpretation.
    pub async fn execute_request(
        request_builder: RequestBuilder,
        service_name: &str,
        method_name: &str,
        url: &str,
    ) -> Result<(u16, String), GatewayError> {
        log::debug!("[{service_name}] {method_name} {url}");

        let response = request_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout {
                    service: service_name.to_string(),
                    detail: e.to_string(),
                }
            } else {
                GatewayError::NetworkError {
                    service: service_name.to_string(),
                    detail: e.to_string(),
                }
            }
        })?;

        let status_code = response.status().as_u16();
        log::debug!("[{service_name}] Response Status: {status_code}");

        // Read Retry-After before the body consumes the response
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if status_code == 429 {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[{service_name}] Rate limited (HTTP 429), retry_after={retry_after:?}");
            return Err(GatewayError::RateLimited {
                service: service_name.to_string(),
                retry_after,
                raw_message: Some(body),
            });
        }

        if matches!(status_code, 502..=504) {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[{service_name}] Server error (HTTP {status_code})");
            return Err(GatewayError::NetworkError {
                service: service_name.to_string(),
                detail: format!("HTTP {status_code}: {}", truncate_for_log(&body)),
            });
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| GatewayError::NetworkError {
                service: service_name.to_string(),
                detail: format!("Failed to read response body: {e}"),
            })?;

        log::debug!(
            "[{service_name}] Response Body: {}",
            truncate_for_log(&response_text)
        );

        Ok((status_code, response_text))
    }

    /// Parse a JSON response body
    pub fn parse_json<T>(response_text: &str, service_name: &str) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(response_text).map_err(|e| {
            log::error!("[{service_name}] JSON parse failed: {e}");
            log::error!(
                "[{service_name}] Raw response: {}",
                truncate_for_log(response_text)
            );
            GatewayError::ParseError {
                service: service_name.to_string(),
                detail: e.to_string(),
            }
        })
    }

    /// Performs an HTTP request with retries on transient failures
    ///
    /// # Retry strategy
    /// - Only `NetworkError`, `Timeout` and `RateLimited` are retried
    /// - Exponential backoff: 100ms, 200ms, 400ms, ... (maximum 10 seconds),
    ///   or the server's `Retry-After` (capped at 30s)
    pub async fn execute_request_with_retry(
        request_builder: RequestBuilder,
        service_name: &str,
        method_name: &str,
        url: &str,
        max_retries: u32,
    ) -> Result<(u16, String), GatewayError> {
        if max_retries == 0 {
            return Self::execute_request(request_builder, service_name, method_name, url).await;
        }

        let mut last_error = None;

        for attempt in 0..=max_retries {
            // RequestBuilder is single-use
            let Some(req) = request_builder.try_clone() else {
                log::warn!("[{service_name}] Cannot clone request, disabling retry");
                return Self::execute_request(request_builder, service_name, method_name, url)
                    .await;
            };

            match Self::execute_request(req, service_name, method_name, url).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < max_retries && e.is_retryable() => {
                    let delay = retry_delay(&e, attempt);
                    log::warn!(
                        "[{}] Request failed (attempt {}/{}), retrying in {:.1}s: {}",
                        service_name,
                        attempt + 1,
                        max_retries,
                        delay.as_secs_f32(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::NetworkError {
            service: service_name.to_string(),
            detail: "All retries exhausted with no error captured".to_string(),
        }))
    }
}

/// Server-provided `Retry-After` (capped at 30s), otherwise exponential backoff.
fn retry_delay(error: &GatewayError, attempt: u32) -> Duration {
    if let GatewayError::RateLimited {
        retry_after: Some(secs),
        ..
    } = error
    {
        Duration::from_secs((*secs).min(30))
    } else {
        backoff_delay(attempt)
    }
}

/// 100ms doubling per attempt, capped at 10 seconds
fn backoff_delay(attempt: u32) -> Duration {
    let capped_attempt = attempt.min(20);
    let delay_ms = 100_u64.saturating_mul(1_u64 << capped_attempt);
    Duration::from_millis(delay_ms.min(10_000))
}
