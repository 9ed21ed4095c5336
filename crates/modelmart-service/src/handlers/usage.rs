//! Usage history handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use modelmart_core::{EventId, ModelId, TimeRange, UsageEvent};
use modelmart_store::EventQuery;

use crate::analytics::clamp_days;
use crate::auth::{ApiKeyAuth, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

/// Usage history query parameters.
#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    /// Trailing window in days (default: 30).
    pub days: Option<u32>,
    /// Page size (default: 50, max: 500).
    pub limit: Option<usize>,
    /// Resume after this event ID.
    pub cursor: Option<String>,
}

impl UsageQuery {
    fn to_event_query(&self, max_days: u32) -> Result<EventQuery, ApiError> {
        let cursor = self
            .cursor
            .as_deref()
            .map(str::parse::<EventId>)
            .transpose()
            .map_err(|_| ApiError::BadRequest("invalid cursor".into()))?;

        let days = clamp_days(self.days, max_days);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        Ok(EventQuery::new(TimeRange::last_days(Utc::now(), days))
            .after(cursor)
            .limit(limit))
    }
}

/// One usage event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    /// Event ID.
    pub event_id: String,
    /// Model called.
    pub model_id: String,
    /// Model owner.
    pub owner_id: String,
    /// Calling account.
    pub caller_id: String,
    /// Call time.
    pub timestamp: String,
    /// Credits moved from caller to owner.
    pub credits_transferred: i64,
    /// `success` or `error`.
    pub status: &'static str,
    /// Inference latency.
    pub latency_ms: u64,
    /// Model framework at call time.
    pub framework: String,
    /// Pricing mode at call time.
    pub pricing_mode: &'static str,
}

impl From<&UsageEvent> for EventResponse {
    fn from(event: &UsageEvent) -> Self {
        Self {
            event_id: event.event_id.to_string(),
            model_id: event.model_id.to_string(),
            owner_id: event.owner_id.to_string(),
            caller_id: event.caller_id.to_string(),
            timestamp: event.timestamp.to_rfc3339(),
            credits_transferred: event.credits_transferred,
            status: event.status.as_str(),
            latency_ms: event.latency_ms,
            framework: event.framework.clone(),
            pricing_mode: event.pricing_mode.as_str(),
        }
    }
}

/// A page of usage events.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePageResponse {
    /// Events in timestamp-ascending order.
    pub events: Vec<EventResponse>,
    /// Cursor for the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// List the caller's own prediction calls.
pub async fn history(
    State(state): State<Arc<AppState>>,
    auth: ApiKeyAuth,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsagePageResponse>, ApiError> {
    let event_query = query.to_event_query(state.config.analytics_max_days)?;
    let events = Arc::clone(&state.events);
    let caller_id = auth.account.id;

    let page = state
        .run_store("query_by_caller", move || {
            events.query_by_caller(&caller_id, &event_query)
        })
        .await?;

    Ok(Json(UsagePageResponse {
        events: page.events.iter().map(EventResponse::from).collect(),
        next_cursor: page.next.map(|id| id.to_string()),
    }))
}

/// List calls against a model. Only the model's owner may read them.
pub async fn model_usage(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<String>,
    user: AuthUser,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsagePageResponse>, ApiError> {
    let parsed = model_id
        .parse::<ModelId>()
        .map_err(|_| ApiError::ModelNotFound(model_id.clone()))?;
    let event_query = query.to_event_query(state.config.analytics_max_days)?;

    let models = Arc::clone(&state.models);
    let model = state
        .run_store("get_model", move || models.get_model(&parsed))
        .await?
        .ok_or(ApiError::ModelNotFound(model_id))?;

    if model.owner_id != user.account_id {
        tracing::warn!(
            model_id = %model.id,
            account_id = %user.account_id,
            "Usage read denied for non-owner"
        );
        return Err(ApiError::Forbidden);
    }

    let events = Arc::clone(&state.events);
    let page = state
        .run_store("query_by_model", move || {
            events.query_by_model(&model.id, &event_query)
        })
        .await?;

    Ok(Json(UsagePageResponse {
        events: page.events.iter().map(EventResponse::from).collect(),
        next_cursor: page.next.map(|id| id.to_string()),
    }))
}
