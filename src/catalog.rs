//! Upstream catalog client
//!
//! Read-only service listing plus the side-effecting integration create.
//! The create call is not idempotent upstream; callers are expected to
//! filter before calling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::types::Service;

/// Default API endpoint for the managed-service provider.
pub const DEFAULT_API_URL: &str = "https://api.aiven.io";

/// Capabilities of the upstream catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// List every service in `project`. Idempotent.
    async fn list_services(&self, project: &str) -> Result<Vec<Service>, CatalogError>;

    /// Enroll `service_name` with the integration endpoint. NOT idempotent
    /// upstream.
    async fn create_integration(
        &self,
        project: &str,
        service_name: &str,
        endpoint_id: &str,
        integration_type: &str,
    ) -> Result<(), CatalogError>;
}

#[derive(Debug, Deserialize)]
struct ListServicesResponse {
    #[serde(default)]
    services: Vec<Service>,
}

#[derive(Debug, Serialize)]
struct CreateIntegrationRequest<'a> {
    source_service: &'a str,
    dest_endpoint_id: &'a str,
    integration_type: &'a str,
}

/// Token-authenticated HTTP client for the Aiven API.
pub struct AivenCatalog {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl AivenCatalog {
    /// Create a client against the default API endpoint.
    pub fn new(token: impl Into<String>, user_agent: &str) -> Result<Self, CatalogError> {
        Self::with_base_url(DEFAULT_API_URL, token, user_agent)
    }

    /// Create a client against an explicit endpoint (tests point this at a
    /// local server).
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
        user_agent: &str,
    ) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn auth_header(&self) -> String {
        format!("aivenv1 {}", self.token)
    }
}

#[async_trait]
impl Catalog for AivenCatalog {
    async fn list_services(&self, project: &str) -> Result<Vec<Service>, CatalogError> {
        let url = format!("{}/v1/project/{}/service", self.base_url, project);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let listed: ListServicesResponse = response.json().await?;
        Ok(listed.services)
    }

    async fn create_integration(
        &self,
        project: &str,
        service_name: &str,
        endpoint_id: &str,
        integration_type: &str,
    ) -> Result<(), CatalogError> {
        let url = format!("{}/v1/project/{}/integration", self.base_url, project);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&CreateIntegrationRequest {
                source_service: service_name,
                dest_endpoint_id: endpoint_id,
                integration_type,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
