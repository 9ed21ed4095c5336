//! Model metadata as seen by the prediction path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::FieldSpec;
use crate::{AccountId, ModelId};

/// An uploaded model and the metadata needed to call it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// The model ID.
    pub id: ModelId,

    /// The account that uploaded the model and receives its earnings.
    pub owner_id: AccountId,

    /// Display name.
    pub name: String,

    /// Framework the artifact was built with (e.g. "sklearn", "onnx").
    pub framework: String,

    /// Declared input fields, in order.
    pub input_schema: Vec<FieldSpec>,

    /// Descriptor of the prediction output (e.g. "classification").
    pub output_type: String,

    /// Whether calls are free or paid.
    pub pricing_mode: PricingMode,

    /// Credits charged per call. Only meaningful for paid models.
    pub credits_per_call: i64,

    /// When the model was registered.
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Create a free model with an empty schema.
    #[must_use]
    pub fn new(id: ModelId, owner_id: AccountId, name: impl Into<String>) -> Self {
        Self {
            id,
            owner_id,
            name: name.into(),
            framework: "unknown".to_string(),
            input_schema: Vec::new(),
            output_type: "json".to_string(),
            pricing_mode: PricingMode::Free,
            credits_per_call: 0,
            created_at: Utc::now(),
        }
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_schema(mut self, schema: Vec<FieldSpec>) -> Self {
        self.input_schema = schema;
        self
    }

    /// Set the framework name.
    #[must_use]
    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = framework.into();
        self
    }

    /// Make the model paid at `credits_per_call`.
    #[must_use]
    pub fn paid(mut self, credits_per_call: i64) -> Self {
        self.pricing_mode = PricingMode::Paid;
        self.credits_per_call = credits_per_call;
        self
    }

    /// Credits a single call costs right now (zero for free models).
    #[must_use]
    pub fn charge_per_call(&self) -> i64 {
        match self.pricing_mode {
            PricingMode::Free => 0,
            PricingMode::Paid => self.credits_per_call.max(0),
        }
    }
}

/// Pricing mode of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// Calls cost nothing.
    Free,
    /// Calls cost `credits_per_call`.
    Paid,
}

impl PricingMode {
    /// Get the mode name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
        }
    }
}
