//! Modelmart HTTP client implementation.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::error::ClientError;
use crate::types::{
    AnalyticsSnapshot, ApiErrorResponse, BalanceResponse, PredictResponse, ValidationIssue,
};

/// Modelmart API client.
///
/// Calls models with an account API key and reads the account's balance.
/// Analytics calls take a session token instead.
#[derive(Debug, Clone)]
pub struct MarketClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_key_header: String,
}

impl MarketClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the service (e.g., `"http://modelmart:8080"`)
    /// * `api_key` - Account API key
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_key_header: options.api_key_header,
        })
    }

    /// Run a prediction.
    ///
    /// Pass an `idempotency_key` to make retries safe: a replay is rejected
    /// with a `duplicate_request` API error instead of charging twice.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientCredits`, `Validation`, `ModelNotFound` or
    /// `Unauthorized` for the corresponding service rejections, and `Api`
    /// for anything else.
    pub async fn predict(
        &self,
        model_id: &str,
        input: &Value,
        idempotency_key: Option<&str>,
    ) -> Result<PredictResponse, ClientError> {
        let url = format!("{}/v1/models/{model_id}/predict", self.base_url);

        let mut request = self
            .client
            .post(&url)
            .header(self.api_key_header.as_str(), &self.api_key)
            .json(input);
        if let Some(key) = idempotency_key {
            request = request.header("idempotency-key", key);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Get the account's current balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn balance(&self) -> Result<BalanceResponse, ClientError> {
        let url = format!("{}/v1/credits/balance", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(self.api_key_header.as_str(), &self.api_key)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the session owner's analytics over the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn analytics(
        &self,
        session_token: &str,
        days: Option<u32>,
    ) -> Result<AnalyticsSnapshot, ClientError> {
        let url = format!("{}/v1/analytics", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {session_token}"));
        if let Some(days) = days {
            request = request.query(&[("days", days)]);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let Ok(api_error) = response.json::<ApiErrorResponse>().await else {
            return Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            });
        };

        tracing::debug!(
            status = status.as_u16(),
            code = %api_error.code,
            "Request rejected"
        );

        let detail = |name: &str| {
            api_error
                .details
                .as_ref()
                .and_then(|d| d.get(name))
                .and_then(Value::as_i64)
                .unwrap_or(0)
        };

        match api_error.code.as_str() {
            "insufficient_credits" => Err(ClientError::InsufficientCredits {
                required: detail("required"),
                available: detail("available"),
            }),
            "validation_failed" => {
                let errors = api_error
                    .details
                    .as_ref()
                    .and_then(|d| d.get("errors"))
                    .cloned()
                    .and_then(|e| serde_json::from_value::<Vec<ValidationIssue>>(e).ok())
                    .unwrap_or_default();
                Err(ClientError::Validation { errors })
            }
            "model_not_found" => Err(ClientError::ModelNotFound),
            "missing_api_key" | "invalid_api_key" | "unauthorized" => {
                Err(ClientError::Unauthorized(api_error.error))
            }
            code => Err(ClientError::Api {
                code: code.to_string(),
                message: api_error.error,
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Header carrying the API key (default: `x-api-key`).
    pub api_key_header: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            api_key_header: "x-api-key".to_string(),
        }
    }
}
