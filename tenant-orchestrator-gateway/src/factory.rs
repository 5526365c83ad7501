//! Client factory functions.

use std::sync::Arc;

use crate::clients::{HttpAccountFactory, HttpDeliveryService};
use crate::config::{AccountFactoryConfig, DeliveryConfig};
use crate::error::Result;
use crate::traits::{AccountFactory, DeliveryService};

/// Creates the [`AccountFactory`] client for the given configuration.
///
/// The returned client is wrapped in `Arc<dyn AccountFactory>` for sharing across
/// async tasks.
///
/// # Examples
///
/// ```rust,no_run
/// use tenant_orchestrator_gateway::{create_account_factory, AccountFactoryConfig, EndpointConfig};
///
/// let factory = create_account_factory(AccountFactoryConfig::new(
///     EndpointConfig::new("https://factory.internal"),
///     "AccountFactory",
/// )).unwrap();
/// ```
pub fn create_account_factory(config: AccountFactoryConfig) -> Result<Arc<dyn AccountFactory>> {
    Ok(Arc::new(HttpAccountFactory::new(config)?))
}

/// Creates the [`DeliveryService`] client for the given configuration.
pub fn create_delivery_service(config: DeliveryConfig) -> Result<Arc<dyn DeliveryService>> {
    Ok(Arc::new(HttpDeliveryService::new(config)?))
}
