//! Analytics handler.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use modelmart_core::AnalyticsSnapshot;

use crate::analytics::{clamp_days, reconstruct};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Analytics query parameters.
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// Trailing window in days.
    pub days: Option<u32>,
}

/// Get the session owner's analytics snapshot.
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsSnapshot>, ApiError> {
    let days = clamp_days(query.days, state.config.analytics_max_days);
    let snapshot = reconstruct(&state, user.account_id, days).await?;
    Ok(Json(snapshot))
}
