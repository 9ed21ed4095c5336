//! Inference backends.
//!
//! The gateway treats inference as an opaque capability: validated input
//! goes in, a JSON value comes out and is forwarded to the caller unchanged.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use modelmart_core::{Model, ModelId};

/// Errors from an inference backend.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// The backend could not be reached.
    #[error("inference request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("inference backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// The backend answered with something that is not JSON.
    #[error("invalid inference response: {0}")]
    InvalidResponse(String),

    /// The model itself reported a failure.
    #[error("model failed: {0}")]
    Model(String),
}

/// An opaque "run model" capability.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run `model` on already validated `input`.
    async fn run(&self, model: &Model, input: &Value) -> Result<Value, InferenceError>;
}

/// Backend returning canned predictions without running anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockInference;

#[async_trait]
impl InferenceBackend for MockInference {
    async fn run(&self, model: &Model, _input: &Value) -> Result<Value, InferenceError> {
        let result = match model.output_type.as_str() {
            "classification" => json!({ "label": "class_a", "confidence": 0.92 }),
            "regression" => json!({ "value": 0.5 }),
            "text" => json!({ "text": "mock output" }),
            _ => json!({ "result": "ok" }),
        };

        Ok(json!({
            "model": model.name,
            "framework": model.framework,
            "output": result,
        }))
    }
}

/// Request body sent to a remote inference endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoteRequest<'a> {
    model_id: ModelId,
    input: &'a Value,
}

/// Backend delegating to a remote HTTP endpoint.
///
/// Sends `POST <url>` with `{"modelId": ..., "input": ...}` and forwards the
/// JSON response body verbatim.
#[derive(Debug, Clone)]
pub struct HttpInference {
    client: reqwest::Client,
    url: String,
}

const MAX_ERROR_BODY: usize = 512;

impl HttpInference {
    /// Create a client for `url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl InferenceBackend for HttpInference {
    async fn run(&self, model: &Model, input: &Value) -> Result<Value, InferenceError> {
        let response = self
            .client
            .post(&self.url)
            .json(&RemoteRequest {
                model_id: model.id,
                input,
            })
            .send()
            .await
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelmart_core::AccountId;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model() -> Model {
        Model::new(ModelId::generate(), AccountId::generate(), "iris").with_framework("sklearn")
    }

    #[tokio::test]
    async fn mock_inference_echoes_model_metadata() {
        let model = model();
        let output = MockInference.run(&model, &json!({})).await.unwrap();
        assert_eq!(output["model"], "iris");
        assert_eq!(output["framework"], "sklearn");
    }

    #[tokio::test]
    async fn http_inference_forwards_response_verbatim() {
        let server = MockServer::start().await;
        let model = model();

        Mock::given(method("POST"))
            .and(path("/infer"))
            .and(body_partial_json(json!({
                "modelId": model.id.to_string(),
                "input": { "age": 30 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "label": "setosa" })))
            .mount(&server)
            .await;

        let backend =
            HttpInference::new(&format!("{}/infer", server.uri()), Duration::from_secs(5)).unwrap();
        let output = backend.run(&model, &json!({ "age": 30 })).await.unwrap();

        assert_eq!(output, json!({ "label": "setosa" }));
    }

    #[tokio::test]
    async fn http_inference_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let backend = HttpInference::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = backend.run(&model(), &json!({})).await.unwrap_err();

        assert!(matches!(err, InferenceError::Status { status: 503, ref body } if body == "overloaded"));
    }
}
