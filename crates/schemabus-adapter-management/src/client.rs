//! HTTP client for the RabbitMQ management API.
//!
//! Covers the calls exchange resolution needs on one virtual host: read a
//! single exchange, list all exchanges, declare a stamped fanout exchange.
//! A `404` on lookup is the one status that means "absent"; every other
//! non-success status is an error.

use crate::encoding::encode_segment;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use schemabus_core::{
    BrokerError, ExchangeDescriptor, ExchangeName, ExchangeRecord, ExchangeRegistry,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Management API client configuration.
#[derive(Debug, Clone)]
pub struct ManagementConfig {
    /// Base URL of the management API, without credentials
    /// (e.g., <http://localhost:15672>)
    pub base_url: String,
    /// Virtual host all calls are scoped to
    pub vhost: String,
    /// API user
    pub user: String,
    /// API password
    pub password: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:15672".to_string(),
            vhost: "/".to_string(),
            user: "guest".to_string(),
            password: "guest".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Exchange as returned by `GET /api/exchanges/{vhost}[/{name}]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeInfo {
    /// Exchange name
    pub name: String,
    /// Owning virtual host
    #[serde(default)]
    pub vhost: String,
    /// Exchange type (`fanout`, `direct`, ...)
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Survives broker restarts
    #[serde(default)]
    pub durable: bool,
    /// Removed when the last binding goes away
    #[serde(default)]
    pub auto_delete: bool,
    /// Not publishable by clients
    #[serde(default)]
    pub internal: bool,
    /// Declared arguments
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl From<ExchangeInfo> for ExchangeRecord {
    fn from(info: ExchangeInfo) -> Self {
        Self {
            name: ExchangeName::new(info.name),
            durable: info.durable,
            arguments: info.arguments,
        }
    }
}

/// Body of `PUT /api/exchanges/{vhost}/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSettings {
    /// Exchange type
    #[serde(rename = "type")]
    pub kind: String,
    /// Survives broker restarts
    pub durable: bool,
    /// Removed when the last binding goes away
    pub auto_delete: bool,
    /// Not publishable by clients
    pub internal: bool,
    /// Declared arguments
    pub arguments: Map<String, Value>,
}

impl ExchangeSettings {
    /// Settings for a schemabus exchange: fanout, never auto-deleted.
    #[must_use]
    pub fn fanout(durable: bool, arguments: Map<String, Value>) -> Self {
        Self {
            kind: "fanout".to_string(),
            durable,
            auto_delete: false,
            internal: false,
            arguments,
        }
    }
}

impl From<&ExchangeDescriptor> for ExchangeSettings {
    fn from(descriptor: &ExchangeDescriptor) -> Self {
        Self::fanout(descriptor.durable, descriptor.arguments())
    }
}

/// HTTP client for management API operations.
pub struct ManagementClient {
    client: Client,
    config: ManagementConfig,
}

impl ManagementClient {
    /// Create a new management client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: ManagementConfig) -> Result<Self, ManagementError> {
        let mut builder = Client::builder().timeout(config.timeout);
        if config.base_url.starts_with("https://") {
            builder = builder.use_rustls_tls();
        }

        let client = builder
            .build()
            .map_err(|e| ManagementError::Init(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/api/{tail}", self.config.base_url.trim_end_matches('/'))
    }

    fn exchanges_url(&self) -> String {
        self.url(&format!("exchanges/{}", encode_segment(&self.config.vhost)))
    }

    fn exchange_url(&self, name: &ExchangeName) -> String {
        format!("{}/{}", self.exchanges_url(), encode_segment(name.as_str()))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.config.user, Some(&self.config.password))
    }

    /// Check that the API is reachable and accepts the credentials.
    ///
    /// # Errors
    ///
    /// Returns error on network errors or when authentication is refused.
    pub async fn whoami(&self) -> Result<String, ManagementError> {
        let url = self.url("whoami");
        tracing::debug!(url = %url, "GET whoami");

        let response = self.send(self.authorized(self.client.get(&url))).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ManagementError::Parse(e.to_string()))?;

        Ok(body
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Get one exchange. Returns `Ok(None)` when the API answers `404`.
    ///
    /// # Errors
    ///
    /// Returns error on network errors or any other non-success status.
    pub async fn get_exchange(
        &self,
        name: &ExchangeName,
    ) -> Result<Option<ExchangeInfo>, ManagementError> {
        let url = self.exchange_url(name);
        tracing::debug!(exchange = %name, url = %url, "GET exchange");

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ManagementError::Request(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| ManagementError::Parse(e.to_string()))
    }

    /// List every exchange on the virtual host, in API order.
    ///
    /// # Errors
    ///
    /// Returns error on network or API errors.
    pub async fn list_exchanges(&self) -> Result<Vec<ExchangeInfo>, ManagementError> {
        let url = self.exchanges_url();
        tracing::debug!(url = %url, "GET exchanges list");

        let response = self.send(self.authorized(self.client.get(&url))).await?;

        response
            .json()
            .await
            .map_err(|e| ManagementError::Parse(e.to_string()))
    }

    /// Declare an exchange.
    ///
    /// # Errors
    ///
    /// Returns error on network or API errors, including a declaration that
    /// conflicts with an existing exchange.
    pub async fn declare_exchange(
        &self,
        name: &ExchangeName,
        settings: &ExchangeSettings,
    ) -> Result<(), ManagementError> {
        let url = self.exchange_url(name);
        tracing::debug!(exchange = %name, url = %url, "PUT exchange");

        let request = self
            .client
            .put(&url)
            .header("Content-Type", "application/json")
            .json(settings);
        self.send(self.authorized(request)).await?;

        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ManagementError> {
        let response = request
            .send()
            .await
            .map_err(|e| ManagementError::Request(e.to_string()))?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, ManagementError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(ManagementError::ApiError {
        status: response.status().as_u16(),
        message: response.text().await.unwrap_or_default(),
    })
}

#[async_trait]
impl ExchangeRegistry for ManagementClient {
    async fn get_exchange(
        &self,
        name: &ExchangeName,
    ) -> Result<Option<ExchangeRecord>, BrokerError> {
        Ok(ManagementClient::get_exchange(self, name)
            .await?
            .map(ExchangeRecord::from))
    }

    async fn list_exchanges(&self) -> Result<Vec<ExchangeRecord>, BrokerError> {
        Ok(ManagementClient::list_exchanges(self)
            .await?
            .into_iter()
            .map(ExchangeRecord::from)
            .collect())
    }

    async fn declare_exchange(&self, descriptor: &ExchangeDescriptor) -> Result<(), BrokerError> {
        let settings = ExchangeSettings::from(descriptor);
        ManagementClient::declare_exchange(self, &descriptor.name, &settings).await?;
        Ok(())
    }
}

/// Errors that can occur with the management client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ManagementError {
    /// Client initialization failed
    #[error("client init error: {0}")]
    Init(String),
    /// HTTP request failed
    #[error("request error: {0}")]
    Request(String),
    /// API returned an error status
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from API
        message: String,
    },
    /// Response parsing failed
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<ManagementError> for BrokerError {
    fn from(err: ManagementError) -> Self {
        match err {
            ManagementError::Init(message) | ManagementError::Request(message) => {
                Self::Request(message)
            }
            ManagementError::ApiError { status, message } => Self::Api { status, message },
            ManagementError::Parse(message) => Self::Parse(message),
        }
    }
}
