//! Layout-analysis service client.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use tracing::{debug, trace};

use crate::error::{FormlensError, Result};
use crate::models::config::LayoutConfig;
use crate::models::layout::OperationStatus;

const SUBSCRIPTION_KEY_HEADER: &str = "ocp-apim-subscription-key";
const OPERATION_LOCATION_HEADER: &str = "operation-location";

/// Opaque reference to a submitted analysis operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Asynchronous layout-analysis back-end.
#[async_trait]
pub trait LayoutService: Send + Sync {
    /// Submit a document, returning the handle to poll.
    async fn submit(&self, bytes: &[u8], content_type: &str) -> Result<OperationHandle>;

    /// Query the current status of an operation.
    async fn status(&self, handle: &OperationHandle) -> Result<OperationStatus>;
}

/// HTTP implementation of [`LayoutService`].
pub struct HttpLayoutService {
    client: reqwest::Client,
    analyze_url: String,
    api_key: Option<String>,
}

impl HttpLayoutService {
    /// Create a client from configuration.
    pub fn new(config: &LayoutConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(FormlensError::Config("layout.endpoint is not set".to_string()));
        }

        let mut analyze_url = format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            endpoint, config.model_id, config.api_version
        );
        if !config.features.is_empty() {
            analyze_url.push_str("&features=");
            analyze_url.push_str(&config.features.join(","));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            analyze_url,
            api_key: config.resolved_api_key(),
        })
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(SUBSCRIPTION_KEY_HEADER, key),
            None => request,
        }
    }
}

/// Extract the operation location from submission response headers.
pub fn operation_handle_from_headers(headers: &HeaderMap) -> Result<OperationHandle> {
    headers
        .get(OPERATION_LOCATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(|v| OperationHandle::new(v.trim()))
        .ok_or(FormlensError::MissingOperationHandle)
}

#[async_trait]
impl LayoutService for HttpLayoutService {
    async fn submit(&self, bytes: &[u8], content_type: &str) -> Result<OperationHandle> {
        debug!("Submitting {} bytes ({}) for layout analysis", bytes.len(), content_type);

        let response = self
            .authorized(self.client.post(&self.analyze_url))
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FormlensError::service(status, body));
        }

        operation_handle_from_headers(response.headers())
    }

    async fn status(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        let response = self
            .authorized(self.client.get(handle.as_str()))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FormlensError::service(status, body));
        }

        trace!("Status payload: {} bytes", body.len());
        Ok(serde_json::from_str(&body)?)
    }
}
