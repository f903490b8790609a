//! LibreLinkUp API Module
//!
//! Handles HTTP communication with the LibreLinkUp cloud: the login call
//! that yields a bearer token and the connections call that yields the
//! latest glucose measurement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::Credentials;
use crate::config::{ClientConfig, Region};

/// Fallback message when the server rejects a login without saying why
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed";

/// The two calls a fetch cycle is made of
#[async_trait]
pub trait GlucoseApi: Send + Sync {
    /// Exchange credentials for a bearer token
    async fn authenticate(&self, credentials: &Credentials) -> Result<String, ApiError>;

    /// Fetch the latest glucose measurement for the token's account
    async fn fetch_latest_measurement(&self, token: &str, region: Region) -> Result<Value, ApiError>;
}

/// API client for the LibreLinkUp backend
pub struct LibreLinkClient {
    config: ClientConfig,
    client: reqwest::Client,
}

impl LibreLinkClient {
    /// Create a new API client
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn client_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("product", &self.config.product)
            .header("version", &self.config.version)
    }
}

#[async_trait]
impl GlucoseApi for LibreLinkClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<String, ApiError> {
        let url = &self.config.endpoints.get(credentials.region).auth;

        debug!("Authenticating {} at: {}", credentials.email, url);

        let response = self
            .client_headers(self.client.post(url))
            .json(&LoginRequest {
                email: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|e| {
                warn!("Login request failed: {}", e);
                ApiError::Authentication(format!("{}: {}", AUTH_FAILED_MESSAGE, e))
            })?;

        let body = response.json::<LoginResponse>().await.map_err(|e| {
            warn!("Unreadable login response: {}", e);
            ApiError::Authentication(format!("{}: {}", AUTH_FAILED_MESSAGE, e))
        })?;

        body.into_token()
    }

    async fn fetch_latest_measurement(&self, token: &str, region: Region) -> Result<Value, ApiError> {
        let url = &self.config.endpoints.get(region).data;

        debug!("Fetching glucose data from: {}", url);

        let response = self
            .client_headers(self.client.get(url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Error fetching glucose data: {}", status);
            return Err(ApiError::DataFetch {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response
            .json::<ConnectionsResponse>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        body.into_latest_measurement()
    }
}

// Request/Response types

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    status: i64,
    #[serde(default)]
    error: Option<LoginError>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct LoginError {
    #[serde(default)]
    message: Option<String>,
}

impl LoginResponse {
    fn into_token(self) -> Result<String, ApiError> {
        if self.status != 0 {
            let message = self
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| AUTH_FAILED_MESSAGE.to_string());
            warn!("Login rejected with status {}: {}", self.status, message);
            return Err(ApiError::Authentication(message));
        }

        let token = self
            .data
            .as_ref()
            .and_then(|data| data.pointer("/authTicket/token"))
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Authentication(AUTH_FAILED_MESSAGE.to_string()))?;

        info!("Authentication succeeded");
        Ok(token.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ConnectionsResponse {
    #[serde(default)]
    data: Option<Vec<Value>>,
}

impl ConnectionsResponse {
    fn into_latest_measurement(self) -> Result<Value, ApiError> {
        self.data
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|connection| match connection {
                Value::Object(mut fields) => fields.remove("glucoseMeasurement"),
                _ => None,
            })
            .filter(|measurement| !measurement.is_null())
            .ok_or(ApiError::NoData)
    }
}

/// API errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Authentication(String),

    #[error("Failed to fetch glucose data: {status} {reason}")]
    DataFetch { status: u16, reason: String },

    #[error("No glucose data available in the response")]
    NoData,

    #[error("Login cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
