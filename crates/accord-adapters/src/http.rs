//! reqwest clients for the retrieval and compliance services.

use crate::error::{AdapterError, AdapterResult};
use accord_core::{
    ComplianceRequest, ComplianceVerdict, CompliancePolicyService, ExtractionRequest,
    ExtractionResponse, ExtractionService, IntegrationError,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::debug;

/// Shared JSON-over-HTTP plumbing.
#[derive(Debug, Clone)]
struct JsonClient {
    client: Client,
    base_url: String,
}

impl JsonClient {
    fn new(base_url: &str, timeout: Duration) -> AdapterResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AdapterResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "calling external service");
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(AdapterError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// `POST {base}/v1/extract` client.
#[derive(Debug, Clone)]
pub struct HttpExtractionClient {
    inner: JsonClient,
}

impl HttpExtractionClient {
    pub fn new(base_url: &str, timeout: Duration) -> AdapterResult<Self> {
        Ok(Self {
            inner: JsonClient::new(base_url, timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }
}

#[async_trait]
impl ExtractionService for HttpExtractionClient {
    async fn extract(
        &self,
        request: ExtractionRequest,
    ) -> Result<ExtractionResponse, IntegrationError> {
        Ok(self.inner.post("/v1/extract", &request).await?)
    }
}

/// `POST {base}/v1/evaluate` client.
#[derive(Debug, Clone)]
pub struct HttpComplianceClient {
    inner: JsonClient,
}

impl HttpComplianceClient {
    pub fn new(base_url: &str, timeout: Duration) -> AdapterResult<Self> {
        Ok(Self {
            inner: JsonClient::new(base_url, timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }
}

#[async_trait]
impl CompliancePolicyService for HttpComplianceClient {
    async fn evaluate(
        &self,
        request: ComplianceRequest,
    ) -> Result<ComplianceVerdict, IntegrationError> {
        Ok(self.inner.post("/v1/evaluate", &request).await?)
    }
}
