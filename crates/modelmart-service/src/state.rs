//! Application state.

use std::sync::Arc;
use std::time::Duration;

use modelmart_store::{AccountDirectory, LedgerStore, ModelRegistry, StoreError, UsageEventStore};

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::inference::{HttpInference, InferenceBackend, MockInference};

/// A backend implementing every storage interface.
pub trait Store: AccountDirectory + ModelRegistry + LedgerStore + UsageEventStore {}

impl<T> Store for T where T: AccountDirectory + ModelRegistry + LedgerStore + UsageEventStore {}

/// Application state shared across handlers.
///
/// Each component gets its own interface handle; all of them usually point
/// at the same backend.
#[derive(Clone)]
pub struct AppState {
    /// Account and API key lookup.
    pub accounts: Arc<dyn AccountDirectory>,

    /// Model metadata.
    pub models: Arc<dyn ModelRegistry>,

    /// Balances and transfers.
    pub ledger: Arc<dyn LedgerStore>,

    /// Usage log.
    pub events: Arc<dyn UsageEventStore>,

    /// Inference capability.
    pub inference: Arc<dyn InferenceBackend>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create application state over one storage backend.
    ///
    /// The inference backend is chosen from the configuration: remote HTTP
    /// when `inference_url` is set, the mock otherwise.
    #[must_use]
    pub fn new<S: Store + 'static>(store: Arc<S>, config: ServiceConfig) -> Self {
        let inference: Arc<dyn InferenceBackend> = match config.inference_url.as_deref() {
            Some(url) => match HttpInference::new(url, config.inference_timeout()) {
                Ok(client) => {
                    tracing::info!(inference_url = %url, "Remote inference enabled");
                    Arc::new(client)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create inference client - using mock");
                    Arc::new(MockInference)
                }
            },
            None => {
                tracing::warn!("INFERENCE_URL not configured - using mock inference");
                Arc::new(MockInference)
            }
        };

        Self {
            accounts: store.clone(),
            models: store.clone(),
            ledger: store.clone(),
            events: store,
            inference,
            config,
        }
    }

    /// Replace the inference backend.
    #[must_use]
    pub fn with_inference(mut self, inference: Arc<dyn InferenceBackend>) -> Self {
        self.inference = inference;
        self
    }

    /// Run a blocking store call off the async runtime, bounded by the
    /// configured store timeout.
    pub async fn run_store<T, F>(&self, op: &'static str, f: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.run_store_within(op, self.config.store_timeout(), f)
            .await
    }

    /// Same as [`AppState::run_store`] with an explicit bound.
    pub async fn run_store_within<T, F>(
        &self,
        op: &'static str,
        limit: Duration,
        f: F,
    ) -> Result<T, ApiError>
    where
        F: FnOnce() -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(limit, tokio::task::spawn_blocking(f)).await {
            Ok(Ok(result)) => result.map_err(ApiError::from),
            Ok(Err(e)) => Err(ApiError::Internal(format!("{op} task failed: {e}"))),
            Err(_) => {
                tracing::warn!(
                    op,
                    timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    "Store call timed out"
                );
                Err(ApiError::StoreUnavailable(format!("{op} timed out")))
            }
        }
    }
}
