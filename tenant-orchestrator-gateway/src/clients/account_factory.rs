//! Account factory HTTP client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::common::{authorize, send_ack, send_json};
use crate::config::AccountFactoryConfig;
use crate::error::Result;
use crate::http_client::create_http_client;
use crate::traits::{AccountFactory, ServiceErrorMapper};
use crate::types::{ProvisionAccountRequest, ProvisioningParameter, UpdateProvisionedAccountRequest};

const SERVICE_NAME: &str = "account-factory";

// Parameter keys understood by the account factory product
const PARAM_ACCOUNT_NAME: &str = "AccountName";
const PARAM_ACCOUNT_EMAIL: &str = "AccountEmail";
const PARAM_SSO_FIRST_NAME: &str = "SSOUserFirstName";
const PARAM_SSO_LAST_NAME: &str = "SSOUserLastName";
const PARAM_SSO_EMAIL: &str = "SSOUserEmail";
const PARAM_ORGANIZATIONAL_UNIT: &str = "ManagedOrganizationalUnit";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionProductBody<'a> {
    product_name: &'a str,
    provisioning_artifact_name: &'a str,
    provisioned_product_name: &'a str,
    provision_token: &'a str,
    provisioning_parameters: Vec<ProvisioningParameter>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProductBody<'a> {
    update_token: &'a str,
    provisioning_parameters: Vec<ProvisioningParameter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionProductResponse {
    provisioned_product_id: String,
}

/// [`AccountFactory`] backed by the account factory REST API.
pub struct HttpAccountFactory {
    client: Client,
    config: AccountFactoryConfig,
}

impl HttpAccountFactory {
    pub fn new(config: AccountFactoryConfig) -> Result<Self> {
        let client = create_http_client(
            SERVICE_NAME,
            Duration::from_secs(config.endpoint.request_timeout_secs),
        )?;
        Ok(Self { client, config })
    }

    fn create_parameters(&self, request: &ProvisionAccountRequest) -> Vec<ProvisioningParameter> {
        vec![
            ProvisioningParameter::value(PARAM_ACCOUNT_NAME, &request.customer_name),
            ProvisioningParameter::value(PARAM_ACCOUNT_EMAIL, &request.account_email),
            ProvisioningParameter::value(PARAM_SSO_FIRST_NAME, &self.config.sso_user_first_name),
            ProvisioningParameter::value(PARAM_SSO_LAST_NAME, &self.config.sso_user_last_name),
            ProvisioningParameter::value(PARAM_SSO_EMAIL, &request.admin_email),
            ProvisioningParameter::value(
                PARAM_ORGANIZATIONAL_UNIT,
                &self.config.organizational_unit,
            ),
        ]
    }

    fn update_parameters(request: &UpdateProvisionedAccountRequest) -> Vec<ProvisioningParameter> {
        vec![
            ProvisioningParameter::value(PARAM_ACCOUNT_EMAIL, &request.account_email),
            ProvisioningParameter::value(PARAM_ACCOUNT_NAME, &request.customer_name),
            ProvisioningParameter::keep(PARAM_SSO_FIRST_NAME),
            ProvisioningParameter::keep(PARAM_SSO_LAST_NAME),
            ProvisioningParameter::keep(PARAM_SSO_EMAIL),
            ProvisioningParameter::keep(PARAM_ORGANIZATIONAL_UNIT),
        ]
    }
}

impl ServiceErrorMapper for HttpAccountFactory {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }
}

#[async_trait]
impl AccountFactory for HttpAccountFactory {
    fn id(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn submit_create(&self, request: &ProvisionAccountRequest) -> Result<String> {
        let url = self.config.endpoint.url("/provisioned-products");
        let body = ProvisionProductBody {
            product_name: &self.config.product_name,
            provisioning_artifact_name: &self.config.provisioning_artifact_name,
            provisioned_product_name: &request.customer_name,
            provision_token: &request.correlation_token,
            provisioning_parameters: self.create_parameters(request),
        };

        let builder = authorize(self.client.post(&url).json(&body), &self.config.endpoint);
        let response: ProvisionProductResponse = send_json(
            self,
            builder,
            "submit_create",
            &url,
            &request.customer_name,
            self.config.endpoint.max_retries,
        )
        .await?;

        if response.provisioned_product_id.is_empty() {
            return Err(self.parse_error("empty provisionedProductId"));
        }

        log::info!(
            "[{SERVICE_NAME}] Submitted account creation for '{}' ({})",
            request.customer_name,
            response.provisioned_product_id
        );
        Ok(response.provisioned_product_id)
    }

    async fn submit_update(&self, request: &UpdateProvisionedAccountRequest) -> Result<()> {
        let path = format!(
            "/provisioned-products/{}",
            urlencoding::encode(&request.provisioned_product_id)
        );
        let url = self.config.endpoint.url(&path);
        let body = UpdateProductBody {
            update_token: &request.update_token,
            provisioning_parameters: Self::update_parameters(request),
        };

        let builder = authorize(self.client.put(&url).json(&body), &self.config.endpoint);
        send_ack(
            self,
            builder,
            "submit_update",
            &url,
            &request.provisioned_product_id,
            self.config.endpoint.max_retries,
        )
        .await?;

        log::info!(
            "[{SERVICE_NAME}] Submitted update of {} to '{}'",
            request.provisioned_product_id,
            request.customer_name
        );
        Ok(())
    }
}
