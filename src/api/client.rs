use super::constants::{self, headers};
use super::schema::{CustomFieldDefinition, SchemaLookup};
use super::update::{Batch, BulkTransport, TransportResponse};
use crate::config::Credentials;
use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use std::time::Duration;

/// Copper developer API client with connection pooling
#[derive(Clone)]
pub struct CopperClient {
    base_url: String,
    http_client: reqwest::Client,
    credentials: Credentials,
}

impl CopperClient {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)           // Max idle connections per host
            .pool_idle_timeout(Duration::from_secs(90))  // Keep connections alive for 90s
            .timeout(Duration::from_secs(30))     // Request timeout
            .connect_timeout(Duration::from_secs(10))    // Connection timeout
            .user_agent(concat!("copper-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_custom_client(base_url, credentials, http_client))
    }

    /// Create a new client with custom HTTP client configuration
    pub fn with_custom_client(
        base_url: impl Into<String>,
        credentials: Credentials,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            http_client,
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(headers::ACCESS_TOKEN, &self.credentials.access_token)
            .header(headers::APPLICATION, headers::APPLICATION_DEVELOPER_API)
            .header(headers::USER_EMAIL, &self.credentials.user_email)
            .header("Content-Type", headers::CONTENT_TYPE_JSON)
    }
}

#[async_trait]
impl BulkTransport for CopperClient {
    async fn send_batch(&self, batch: &Batch) -> anyhow::Result<TransportResponse> {
        let url = constants::bulk_update_endpoint(&self.base_url);
        debug!("POST {} (batch {}, {} record(s))", url, batch.index, batch.len());

        let response = self
            .authorized(self.http_client.post(&url))
            .json(&batch.to_request())
            .send()
            .await
            .with_context(|| format!("Failed to send batch {}", batch.index))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(headers::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        debug!("Batch {} answered with status {}", batch.index, status);
        Ok(TransportResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[async_trait]
impl SchemaLookup for CopperClient {
    async fn custom_field_definitions(&self) -> anyhow::Result<Vec<CustomFieldDefinition>> {
        let url = constants::custom_field_definitions_endpoint(&self.base_url);
        let response = self
            .authorized(self.http_client.get(&url))
            .send()
            .await
            .context("Failed to request custom field definitions")?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<Vec<CustomFieldDefinition>>()
                .await
                .context("Failed to parse custom field definitions")
        } else {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Custom field fetch failed with status {}: {}", status, error_text)
        }
    }
}
