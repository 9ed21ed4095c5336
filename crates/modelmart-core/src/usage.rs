//! Usage event types for modelmart.
//!
//! One [`UsageEvent`] is written for every prediction attempt that reaches
//! the recording step. Events are immutable once stored and are the only
//! input of the analytics reconstruction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Model, PricingMode};
use crate::{AccountId, EventId, ModelId};

/// An immutable record of one prediction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Unique event ID; its time component equals `timestamp`.
    pub event_id: EventId,

    /// The model that was called.
    pub model_id: ModelId,

    /// Owner of the model at call time.
    pub owner_id: AccountId,

    /// The calling account.
    pub caller_id: AccountId,

    /// When the call completed.
    pub timestamp: DateTime<Utc>,

    /// Net credits moved from caller to owner (0 for free or refunded calls).
    pub credits_transferred: i64,

    /// Outcome of the call.
    pub status: CallStatus,

    /// Wall-clock latency of the inference step in milliseconds.
    pub latency_ms: u64,

    /// Framework of the model at call time.
    pub framework: String,

    /// Pricing mode of the model at call time.
    pub pricing_mode: PricingMode,
}

impl UsageEvent {
    /// Build an event for a call against `model`, snapshotting its metadata.
    #[must_use]
    pub fn record(
        model: &Model,
        caller_id: AccountId,
        credits_transferred: i64,
        status: CallStatus,
        latency_ms: u64,
    ) -> Self {
        Self::record_at(
            Utc::now(),
            model,
            caller_id,
            credits_transferred,
            status,
            latency_ms,
        )
    }

    /// Same as [`UsageEvent::record`] with an explicit timestamp.
    #[must_use]
    pub fn record_at(
        timestamp: DateTime<Utc>,
        model: &Model,
        caller_id: AccountId,
        credits_transferred: i64,
        status: CallStatus,
        latency_ms: u64,
    ) -> Self {
        Self {
            event_id: EventId::at(timestamp),
            model_id: model.id,
            owner_id: model.owner_id,
            caller_id,
            timestamp,
            credits_transferred,
            status,
            latency_ms,
            framework: model.framework.clone(),
            pricing_mode: model.pricing_mode,
        }
    }

    /// Whether the call succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == CallStatus::Success
    }
}

/// Outcome of a recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Inference returned a result.
    Success,
    /// Inference failed; any charge was refunded.
    Error,
}

impl CallStatus {
    /// Get the status name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Inclusive time window used by event queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Window start (inclusive).
    pub start: DateTime<Utc>,
    /// Window end (inclusive).
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a window from `start` to `end`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The window covering the last `days` days up to `now`.
    #[must_use]
    pub fn last_days(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: now - chrono::Duration::days(i64::from(days)),
            end: now,
        }
    }

    /// A window covering all representable event times.
    #[must_use]
    pub fn all() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Whether `timestamp` lies inside the window.
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    /// Start as a millisecond timestamp, clamped at the epoch.
    #[must_use]
    pub fn start_ms(&self) -> u64 {
        u64::try_from(self.start.timestamp_millis()).unwrap_or(0)
    }

    /// End as a millisecond timestamp, clamped to the ULID time range.
    #[must_use]
    pub fn end_ms(&self) -> u64 {
        const MAX_ULID_MS: u64 = (1 << 48) - 1;
        u64::try_from(self.end.timestamp_millis())
            .unwrap_or(0)
            .min(MAX_ULID_MS)
    }
}
