//! # tenant-orchestrator-gateway
//!
//! Clients for the external services a tenant account is provisioned through.
//!
//! ## Services
//!
//! | Service | Trait | Behaviour |
//! |---------|-------|-----------|
//! | Account factory | [`AccountFactory`] | Fire-and-forget create/update of cloud accounts |
//! | Delivery | [`DeliveryService`] | Blocking builds, pipeline executions |
//!
//! ## Feature Flags
//!
//! - **`native-tls`** *(default)*: use the platform's native TLS implementation.
//! - **`rustls`**: use rustls.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tenant_orchestrator_gateway::{
//!     create_account_factory, AccountFactoryConfig, EndpointConfig, ProvisionAccountRequest,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = create_account_factory(AccountFactoryConfig::new(
//!         EndpointConfig::new("https://factory.internal"),
//!         "AccountFactory",
//!     ))?;
//!
//!     let operation_id = factory
//!         .submit_create(&ProvisionAccountRequest {
//!             customer_name: "acme".to_string(),
//!             account_email: "ops+acme@example.com".to_string(),
//!             admin_email: "ops@example.com".to_string(),
//!             correlation_token: "2024-05-01T10-00-00Z".to_string(),
//!         })
//!         .await?;
//!     println!("submitted: {operation_id}");
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, GatewayError>`](GatewayError). Transient errors
//! (`NetworkError`, `Timeout`, `RateLimited`) are retried with exponential backoff
//! before they reach the caller.

mod clients;
mod config;
mod error;
mod factory;
mod http_client;
mod traits;
mod types;
mod utils;

pub use error::{GatewayError, Result};

pub use factory::{create_account_factory, create_delivery_service};

pub use config::{AccountFactoryConfig, DeliveryConfig, EndpointConfig, GatewayConfig};

// Public traits only; the error mapper stays internal
pub use traits::{AccountFactory, DeliveryService};

pub use types::{
    BuildOutcome, BuildStatus, ExecutionRole, InfraBuildRequest, ProvisionAccountRequest,
    ProvisioningParameter, ReleaseBuildRequest, UpdateProvisionedAccountRequest,
};

pub use clients::{HttpAccountFactory, HttpDeliveryService};

pub use utils::log_sanitizer;
