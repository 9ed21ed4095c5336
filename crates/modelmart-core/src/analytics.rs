//! Usage analytics rebuilt from the event log.
//!
//! [`SnapshotBuilder`] folds [`UsageEvent`]s one at a time, so callers can
//! feed it straight from a paged store scan without collecting the window.
//!
//! Daily series are sparse: a day appears only if it has at least one event.
//! Consumers that chart a continuous axis must fill the gaps themselves.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::usage::UsageEvent;
use crate::{AccountId, ModelId};

/// Aggregated usage for one owner over a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    /// Owner the snapshot was built for.
    pub owner_id: AccountId,

    /// Size of the window in days.
    pub range_days: u32,

    /// When the snapshot was built.
    pub generated_at: DateTime<Utc>,

    /// Number of models the owner currently has registered.
    pub model_count: usize,

    /// Totals across all models.
    pub overview: UsageOverview,

    /// Per-model breakdown, ordered by model ID.
    pub models: Vec<ModelUsage>,

    /// Highest earning models, best first.
    pub top_models: Vec<ModelUsage>,

    /// One point per UTC day with at least one event, oldest first.
    pub daily: Vec<DailyUsage>,

    /// Calls per framework, from the event snapshot.
    pub by_framework: BTreeMap<String, u64>,

    /// Calls per pricing mode, from the event snapshot.
    pub by_pricing_mode: BTreeMap<String, u64>,
}

impl AnalyticsSnapshot {
    /// A snapshot with no usage.
    #[must_use]
    pub fn empty(owner_id: AccountId, range_days: u32, model_count: usize) -> Self {
        SnapshotBuilder::new(owner_id, range_days, model_count).finish(0)
    }
}

/// Totals across all of an owner's models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOverview {
    /// Number of recorded calls.
    pub total_calls: u64,
    /// Number of successful calls.
    pub successful_calls: u64,
    /// Credits earned.
    pub total_credits_earned: i64,
    /// `successful_calls / total_calls`, 0 when there were no calls.
    pub success_rate: f64,
    /// Mean latency over all calls.
    pub average_latency_ms: f64,
    /// Number of distinct calling accounts.
    pub distinct_callers: usize,
    /// Number of models with at least one call.
    pub active_models: usize,
}

/// Usage of a single model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    /// Model ID.
    pub model_id: ModelId,
    /// Number of recorded calls.
    pub calls: u64,
    /// Number of successful calls.
    pub successful_calls: u64,
    /// Credits earned.
    pub credits_earned: i64,
    /// `successful_calls / calls`.
    pub success_rate: f64,
    /// Mean latency.
    pub average_latency_ms: f64,
}

/// Usage on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
    /// The day.
    pub date: NaiveDate,
    /// Number of calls.
    pub calls: u64,
    /// Number of successful calls.
    pub successful_calls: u64,
    /// Credits earned.
    pub credits_earned: i64,
}

#[derive(Debug, Default)]
struct Tally {
    calls: u64,
    successful_calls: u64,
    credits: i64,
    latency_total_ms: u128,
}

impl Tally {
    fn add(&mut self, event: &UsageEvent) {
        self.calls += 1;
        if event.is_success() {
            self.successful_calls += 1;
        }
        self.credits += event.credits_transferred;
        self.latency_total_ms += u128::from(event.latency_ms);
    }

    #[allow(clippy::cast_precision_loss)]
    fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.successful_calls as f64 / self.calls as f64
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn average_latency_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.latency_total_ms as f64 / self.calls as f64
        }
    }
}

/// Incremental builder for an [`AnalyticsSnapshot`].
#[derive(Debug)]
pub struct SnapshotBuilder {
    owner_id: AccountId,
    range_days: u32,
    model_count: usize,
    total: Tally,
    per_model: BTreeMap<ModelId, Tally>,
    per_day: BTreeMap<NaiveDate, Tally>,
    callers: HashSet<AccountId>,
    by_framework: BTreeMap<String, u64>,
    by_pricing_mode: BTreeMap<String, u64>,
}

impl SnapshotBuilder {
    /// Start an empty aggregation.
    #[must_use]
    pub fn new(owner_id: AccountId, range_days: u32, model_count: usize) -> Self {
        Self {
            owner_id,
            range_days,
            model_count,
            total: Tally::default(),
            per_model: BTreeMap::new(),
            per_day: BTreeMap::new(),
            callers: HashSet::new(),
            by_framework: BTreeMap::new(),
            by_pricing_mode: BTreeMap::new(),
        }
    }

    /// Fold one event into the aggregation.
    pub fn push(&mut self, event: &UsageEvent) {
        self.total.add(event);
        self.per_model.entry(event.model_id).or_default().add(event);
        self.per_day
            .entry(event.timestamp.date_naive())
            .or_default()
            .add(event);
        self.callers.insert(event.caller_id);
        *self.by_framework.entry(event.framework.clone()).or_default() += 1;
        *self
            .by_pricing_mode
            .entry(event.pricing_mode.as_str().to_string())
            .or_default() += 1;
    }

    /// Number of events folded so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.total.calls
    }

    /// Produce the snapshot, keeping at most `top_n` entries in `top_models`.
    #[must_use]
    pub fn finish(self, top_n: usize) -> AnalyticsSnapshot {
        let models: Vec<ModelUsage> = self
            .per_model
            .iter()
            .map(|(model_id, tally)| ModelUsage {
                model_id: *model_id,
                calls: tally.calls,
                successful_calls: tally.successful_calls,
                credits_earned: tally.credits,
                success_rate: tally.success_rate(),
                average_latency_ms: tally.average_latency_ms(),
            })
            .collect();

        let mut top_models = models.clone();
        top_models.sort_by(|a, b| {
            b.credits_earned
                .cmp(&a.credits_earned)
                .then_with(|| b.calls.cmp(&a.calls))
                .then_with(|| a.model_id.cmp(&b.model_id))
        });
        top_models.truncate(top_n);

        let daily = self
            .per_day
            .iter()
            .map(|(date, tally)| DailyUsage {
                date: *date,
                calls: tally.calls,
                successful_calls: tally.successful_calls,
                credits_earned: tally.credits,
            })
            .collect();

        AnalyticsSnapshot {
            owner_id: self.owner_id,
            range_days: self.range_days,
            generated_at: Utc::now(),
            model_count: self.model_count,
            overview: UsageOverview {
                total_calls: self.total.calls,
                successful_calls: self.total.successful_calls,
                total_credits_earned: self.total.credits,
                success_rate: self.total.success_rate(),
                average_latency_ms: self.total.average_latency_ms(),
                distinct_callers: self.callers.len(),
                active_models: models.len(),
            },
            models,
            top_models,
            daily,
            by_framework: self.by_framework,
            by_pricing_mode: self.by_pricing_mode,
        }
    }
}
