//! Client error types.

use crate::types::ValidationIssue;

/// Errors that can occur when using the modelmart client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response not covered by a typed variant.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Caller balance is below the model's price.
    #[error("insufficient credits: required={required}, available={available}")]
    InsufficientCredits {
        /// Credits the call costs.
        required: i64,
        /// Caller balance.
        available: i64,
    },

    /// Input did not match the model's schema.
    #[error("validation failed: {} error(s)", errors.len())]
    Validation {
        /// Every field error reported by the service.
        errors: Vec<ValidationIssue>,
    },

    /// The model does not exist.
    #[error("model not found")]
    ModelNotFound,

    /// Missing or rejected credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}
