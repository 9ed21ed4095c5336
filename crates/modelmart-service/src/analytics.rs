//! Analytics reconstruction.
//!
//! Replays an owner's usage events over a trailing window and folds them
//! into an [`AnalyticsSnapshot`]. Read-only: neither the ledger nor the
//! usage log is touched.

use std::sync::Arc;

use chrono::Utc;

use modelmart_core::{AccountId, AnalyticsSnapshot, SnapshotBuilder, TimeRange};
use modelmart_store::{EventIndex, EventScan};

use crate::error::ApiError;
use crate::state::AppState;

/// Window used when the request does not name one.
pub const DEFAULT_RANGE_DAYS: u32 = 30;

/// Clamp a requested window to `[1, max_days]`.
#[must_use]
pub fn clamp_days(requested: Option<u32>, max_days: u32) -> u32 {
    requested
        .unwrap_or(DEFAULT_RANGE_DAYS)
        .clamp(1, max_days.max(1))
}

/// Build the analytics snapshot for `owner_id` over the last `days` days.
///
/// An owner without events gets a zeroed snapshot that still carries the
/// current model count. A store failure is an error, never a zero snapshot.
pub async fn reconstruct(
    state: &Arc<AppState>,
    owner_id: AccountId,
    days: u32,
) -> Result<AnalyticsSnapshot, ApiError> {
    let models = Arc::clone(&state.models);
    let events = Arc::clone(&state.events);
    let top_n = state.config.analytics_top_n;

    let snapshot = state
        .run_store_within("reconstruct_analytics", state.config.handler_budget(), move || {
            let model_count = models.count_models_by_owner(&owner_id)?;
            let range = TimeRange::last_days(Utc::now(), days);

            let mut builder = SnapshotBuilder::new(owner_id, days, model_count);
            for event in EventScan::new(events.as_ref(), EventIndex::Owner(owner_id), range) {
                builder.push(&event?);
            }

            Ok(builder.finish(top_n))
        })
        .await?;

    tracing::debug!(
        owner_id = %owner_id,
        days,
        calls = snapshot.overview.total_calls,
        credits = snapshot.overview.total_credits_earned,
        "Analytics reconstructed"
    );

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_are_clamped() {
        assert_eq!(clamp_days(None, 365), DEFAULT_RANGE_DAYS);
        assert_eq!(clamp_days(Some(0), 365), 1);
        assert_eq!(clamp_days(Some(7), 365), 7);
        assert_eq!(clamp_days(Some(10_000), 365), 365);
        assert_eq!(clamp_days(Some(10), 0), 1);
    }
}
