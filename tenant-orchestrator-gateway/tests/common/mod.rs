//! Shared helpers for the live gateway tests

#![allow(dead_code)]

use std::env;
use std::sync::Arc;

use tenant_orchestrator_gateway::{
    AccountFactory, AccountFactoryConfig, DeliveryConfig, DeliveryService, EndpointConfig,
    create_account_factory, create_delivery_service,
};

/// Return early when a required environment variable is missing
#[macro_export]
macro_rules! skip_if_no_env {
    ($($var:expr),+) => {
        $(
            if std::env::var($var).is_err() {
                eprintln!("skipping test: missing environment variable {}", $var);
                return;
            }
        )+
    };
}

/// Assert `Option` is `Some` and unwrap it (fails the test otherwise).
#[macro_export]
macro_rules! require_some {
    ($expr:expr, $($msg:tt)+) => {{
        let opt = $expr;
        assert!(opt.is_some(), "{}", format_args!($($msg)+));
        let Some(val) = opt else {
            return;
        };
        val
    }};
}

/// Assert `Result` is `Ok` and unwrap it (fails the test otherwise).
#[macro_export]
macro_rules! require_ok {
    ($expr:expr, $($msg:tt)+) => {{
        let res = $expr;
        assert!(
            res.is_ok(),
            "{}: {res:?}",
            format_args!($($msg)+)
        );
        let Ok(val) = res else {
            return;
        };
        val
    }};
}

/// Unique tenant name for a test run
pub fn generate_test_tenant_name() -> String {
    let uuid = uuid::Uuid::new_v4();
    format!("test-{}", &uuid.to_string()[..8])
}

fn endpoint(url_var: &str, token_var: &str) -> Option<EndpointConfig> {
    let mut endpoint = EndpointConfig::new(env::var(url_var).ok()?);
    endpoint.api_token = env::var(token_var).ok();
    Some(endpoint)
}

/// Account factory client from `FACTORY_URL`, `FACTORY_TOKEN`, `FACTORY_PRODUCT`
pub fn account_factory() -> Option<Arc<dyn AccountFactory>> {
    let config = AccountFactoryConfig::new(
        endpoint("FACTORY_URL", "FACTORY_TOKEN")?,
        env::var("FACTORY_PRODUCT").ok()?,
    );
    create_account_factory(config).ok()
}

/// Delivery client from `DELIVERY_URL`, `DELIVERY_TOKEN`, `DELIVERY_INFRA_PROJECT`, `DELIVERY_RELEASE_PROJECT`
pub fn delivery() -> Option<Arc<dyn DeliveryService>> {
    let config = DeliveryConfig {
        endpoint: endpoint("DELIVERY_URL", "DELIVERY_TOKEN")?,
        infra_build_project: env::var("DELIVERY_INFRA_PROJECT").ok()?,
        release_build_project: env::var("DELIVERY_RELEASE_PROJECT").ok()?,
        poll_interval_secs: 5,
    };
    create_delivery_service(config).ok()
}
