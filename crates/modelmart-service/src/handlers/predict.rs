//! Prediction handler.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use modelmart_core::{FieldError, ModelId};

use crate::auth::ApiKeyAuth;
use crate::error::ApiError;
use crate::gateway::{self, PredictionRequest, Stage};
use crate::state::AppState;

/// Header carrying the optional idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Longest accepted idempotency key.
const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Successful prediction response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    /// Always `true`.
    pub success: bool,
    /// Inference output, verbatim.
    pub prediction: Value,
    /// Credits charged for this call.
    pub credits_used: i64,
    /// Caller balance after the call.
    pub remaining_credits: i64,
}

/// Run a prediction against a model.
///
/// The body must be a JSON object; anything else (including invalid JSON)
/// is reported as a validation failure.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<String>,
    auth: ApiKeyAuth,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    tracing::debug!(
        stage = Stage::Received.as_str(),
        model_id = %model_id,
        "Prediction stage"
    );

    let model_id = model_id
        .parse::<ModelId>()
        .map_err(|_| ApiError::ModelNotFound(model_id.clone()))?;

    let idempotency_key = idempotency_key(&headers)?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::Validation(vec![FieldError::NotAnObject]))?;

    let outcome = gateway::predict(
        &state,
        PredictionRequest {
            caller: auth.account,
            model_id,
            payload,
            idempotency_key,
        },
    )
    .await?;

    Ok(Json(PredictResponse {
        success: true,
        prediction: outcome.prediction,
        credits_used: outcome.credits_used,
        remaining_credits: outcome.remaining_credits,
    }))
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(raw) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };

    let key = raw
        .to_str()
        .map_err(|_| ApiError::BadRequest("Idempotency-Key must be ASCII".into()))?
        .trim();

    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ApiError::BadRequest(format!(
            "Idempotency-Key must be 1-{MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }

    Ok(Some(key.to_string()))
}
