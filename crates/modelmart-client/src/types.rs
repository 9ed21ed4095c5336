//! Request and response types for the modelmart client.

use serde::{Deserialize, Serialize};

pub use modelmart_core::{AnalyticsSnapshot, DailyUsage, ModelUsage, UsageOverview};

/// Successful prediction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    /// Always `true` on this path.
    pub success: bool,
    /// Model output, as returned by the inference backend.
    pub prediction: serde_json::Value,
    /// Credits charged for the call.
    pub credits_used: i64,
    /// Balance after the call.
    pub remaining_credits: i64,
}

/// Current balance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    /// Account ID.
    pub account_id: String,
    /// Balance in credits.
    pub balance: i64,
}

/// One field error from a failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Offending field, absent when the whole body was rejected.
    #[serde(default)]
    pub field: Option<String>,
    /// Human-readable message.
    pub message: String,
}

/// Error body returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
