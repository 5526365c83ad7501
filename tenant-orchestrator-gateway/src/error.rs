use serde::{Deserialize, Serialize};

/// Unified error type for all calls to external services.
///
/// Each variant carries a `service` field naming the collaborator that produced
/// the error (`account-factory`, `delivery`, ...). All variants are serializable
/// for structured error reporting.
///
/// # Retryable Errors
///
/// The following variants represent transient failures that may succeed on retry:
/// - [`NetworkError`](Self::NetworkError): network connectivity issues
/// - [`Timeout`](Self::Timeout): request timed out
/// - [`RateLimited`](Self::RateLimited): API rate limit exceeded
///
/// The built-in HTTP client retries these with exponential backoff. Submissions to
/// the account factory carry an idempotency token, so retrying them never creates a
/// second external account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum GatewayError {
    /// A network-level error occurred (DNS resolution failure, connection refused, etc.).
    NetworkError {
        /// Service that produced the error.
        service: String,
        /// Error details.
        detail: String,
    },

    /// The HTTP request timed out.
    Timeout {
        /// Service that produced the error.
        service: String,
        /// Error details.
        detail: String,
    },

    /// The API rate limit has been exceeded (HTTP 429).
    RateLimited {
        /// Service that produced the error.
        service: String,
        /// Suggested wait time in seconds before retrying, if provided by the API.
        retry_after: Option<u64>,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// The configured API token was refused (HTTP 401/403).
    Unauthorized {
        /// Service that produced the error.
        service: String,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// The referenced resource (provisioned product, build, pipeline) does not exist.
    NotFound {
        /// Service that produced the error.
        service: String,
        /// Identifier of the missing resource.
        resource: String,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// The service refused the request (any other 4xx response).
    Rejected {
        /// Service that produced the error.
        service: String,
        /// HTTP status code.
        status: u16,
        /// Original error message from the API.
        raw_message: String,
    },

    /// Failed to parse the service's response.
    ParseError {
        /// Service that produced the error.
        service: String,
        /// Details about the parse failure.
        detail: String,
    },

    /// Failed to build the HTTP client or serialize a request body.
    ClientError {
        /// Service that produced the error.
        service: String,
        /// Details about the failure.
        detail: String,
    },

    /// An unrecognized error from the service (5xx that is not retryable, odd payloads).
    Unknown {
        /// Service that produced the error.
        service: String,
        /// HTTP status code, if one was received.
        status: Option<u16>,
        /// Raw error message from the API.
        raw_message: String,
    },
}

impl GatewayError {
    /// Whether this is expected behavior (bad input, missing resource, etc.); used for log levels.
    ///
    /// Use `warn` when this returns `true` and `error` when it returns `false`.
    /// **Keep this in sync when adding variants.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Rejected { .. } | Self::RateLimited { .. }
        )
    }

    /// Whether the error is transient and the request may be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }

    /// Name of the service that produced the error.
    #[must_use]
    pub fn service(&self) -> &str {
        match self {
            Self::NetworkError { service, .. }
            | Self::Timeout { service, .. }
            | Self::RateLimited { service, .. }
            | Self::Unauthorized { service, .. }
            | Self::NotFound { service, .. }
            | Self::Rejected { service, .. }
            | Self::ParseError { service, .. }
            | Self::ClientError { service, .. }
            | Self::Unknown { service, .. } => service,
        }
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkError { service, detail } => {
                write!(f, "[{service}] Network error: {detail}")
            }
            Self::Timeout { service, detail } => {
                write!(f, "[{service}] Request timeout: {detail}")
            }
            Self::RateLimited {
                service,
                retry_after,
                ..
            } => {
                if let Some(secs) = retry_after {
                    write!(f, "[{service}] Rate limited (retry after {secs}s)")
                } else {
                    write!(f, "[{service}] Rate limited")
                }
            }
            Self::Unauthorized {
                service,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{service}] Unauthorized: {msg}")
                } else {
                    write!(f, "[{service}] Unauthorized")
                }
            }
            Self::NotFound {
                service, resource, ..
            } => {
                write!(f, "[{service}] '{resource}' not found")
            }
            Self::Rejected {
                service,
                status,
                raw_message,
            } => {
                write!(f, "[{service}] Request rejected (HTTP {status}): {raw_message}")
            }
            Self::ParseError { service, detail } => {
                write!(f, "[{service}] Parse error: {detail}")
            }
            Self::ClientError { service, detail } => {
                write!(f, "[{service}] Client error: {detail}")
            }
            Self::Unknown {
                service,
                status,
                raw_message,
            } => match status {
                Some(code) => write!(f, "[{service}] HTTP {code}: {raw_message}"),
                None => write!(f, "[{service}] {raw_message}"),
            },
        }
    }
}

impl std::error::Error for GatewayError {}

/// Convenience type alias for `Result<T, GatewayError>`.
pub type Result<T> = std::result::Result<T, GatewayError>;
