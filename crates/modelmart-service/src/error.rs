//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use modelmart_core::FieldError;
use modelmart_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No API key header on a prediction call.
    #[error("missing API key")]
    MissingApiKey,

    /// API key does not belong to any account.
    #[error("invalid API key")]
    InvalidApiKey,

    /// Unauthorized - missing or invalid session or admin credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but insufficient permissions.
    #[error("forbidden")]
    Forbidden,

    /// The requested model does not exist.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Other resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Payload does not match the model's input schema.
    #[error("input validation failed")]
    Validation(Vec<FieldError>),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller balance is below the model's price.
    #[error("insufficient credits: required={required}, available={available}")]
    InsufficientCredits {
        /// Credits the call costs.
        required: i64,
        /// Caller balance.
        available: i64,
    },

    /// Idempotency key already used by this caller.
    #[error("duplicate request: {0}")]
    DuplicateRequest(String),

    /// Storage timed out or is unavailable; safe to retry.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Inference failed after the charge step.
    #[error("inference failed: {reason}")]
    InferenceFailed {
        /// Backend error, logged but not returned to the caller.
        reason: String,
        /// What happened to the charge.
        refund: RefundOutcome,
    },

    /// The request exceeded the router deadline.
    #[error("request timed out")]
    RequestTimeout,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// State of the charge when inference fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    /// Nothing was charged (free model).
    NotCharged,
    /// The charge was reversed.
    Refunded,
    /// The reversal failed and the charge is still in force.
    Pending,
}

impl RefundOutcome {
    /// Outcome name for the error details.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotCharged => "not_charged",
            Self::Refunded => "refunded",
            Self::Pending => "pending",
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::NotCharged => "Model inference failed; no credits were charged",
            Self::Refunded => "Model inference failed; the charge was refunded",
            Self::Pending => "Model inference failed; the charge could not be refunded automatically",
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::InvalidApiKey => "invalid_api_key",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::ModelNotFound(_) => "model_not_found",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_failed",
            Self::BadRequest(_) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::InsufficientCredits { .. } => "insufficient_credits",
            Self::DuplicateRequest(_) => "duplicate_request",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::InferenceFailed { .. } => "inference_failed",
            Self::RequestTimeout => "request_timeout",
            Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for the error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingApiKey | Self::InvalidApiKey | Self::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::ModelNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::DuplicateRequest(_) => StatusCode::CONFLICT,
            Self::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::InferenceFailed { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (message, details) = match &self {
            Self::Validation(errors) => (
                self.to_string(),
                Some(serde_json::json!({
                    "errors": errors
                        .iter()
                        .map(|e| serde_json::json!({
                            "field": e.field(),
                            "message": e.to_string(),
                        }))
                        .collect::<Vec<_>>()
                })),
            ),
            Self::InsufficientCredits {
                required,
                available,
            } => (
                self.to_string(),
                Some(serde_json::json!({
                    "required": required,
                    "available": available
                })),
            ),
            Self::StoreUnavailable(msg) => {
                tracing::warn!(error = %msg, "Store unavailable");
                (
                    "Storage is temporarily unavailable, retry later".to_string(),
                    None,
                )
            }
            Self::InferenceFailed { reason, refund } => {
                tracing::error!(error = %reason, refund = refund.as_str(), "Inference failed");
                (
                    refund.message().to_string(),
                    Some(serde_json::json!({ "refund": refund.as_str() })),
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                ("An internal error occurred".to_string(), None)
            }
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code(),
            details,
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity: "model", id } => Self::ModelNotFound(id),
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            StoreError::AlreadyExists { entity, id } => {
                Self::Conflict(format!("{entity} already exists: {id}"))
            }
            StoreError::InsufficientCredits {
                required,
                available,
            } => Self::InsufficientCredits {
                required,
                available,
            },
            StoreError::DuplicateTransfer { key } => Self::DuplicateRequest(key),
            StoreError::InvalidAmount(msg) => Self::BadRequest(msg),
            StoreError::Database(msg) => Self::StoreUnavailable(msg),
            StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_translate_to_taxonomy() {
        let err: ApiError = StoreError::InsufficientCredits {
            required: 3,
            available: 2,
        }
        .into();
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.code(), "insufficient_credits");

        let err: ApiError = StoreError::NotFound {
            entity: "model",
            id: "m1".into(),
        }
        .into();
        assert_eq!(err.code(), "model_not_found");

        let err: ApiError = StoreError::Database("io".into()).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = StoreError::DuplicateTransfer { key: "k".into() }.into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn inference_failure_reports_refund_state() {
        let err = ApiError::InferenceFailed {
            reason: "backend exploded".into(),
            refund: RefundOutcome::Pending,
        };
        assert_eq!(err.code(), "inference_failed");
        assert!(!RefundOutcome::Pending.message().contains("no credits were charged"));
        assert!(RefundOutcome::NotCharged.message().contains("no credits were charged"));
        assert_eq!(RefundOutcome::Refunded.as_str(), "refunded");
    }

    #[test]
    fn request_timeout_is_408() {
        assert_eq!(ApiError::RequestTimeout.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(ApiError::RequestTimeout.code(), "request_timeout");
    }

    #[test]
    fn internal_message_is_redacted() {
        let response = ApiError::Internal("secret path /var/db".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
