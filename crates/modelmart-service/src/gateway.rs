//! Prediction gateway.
//!
//! One request walks through
//! `Received → Authenticated → ModelResolved → Validated → Charged →
//! Predicted → Recorded → Responded`, or ends early in `Aborted`.
//!
//! Side effects are strictly ordered: inference never runs before the charge
//! has committed and the usage event is only written after inference
//! returned. Everything from the charge onwards runs in a spawned task, so a
//! client that disconnects mid-request cannot leave a charge without either a
//! recorded event or a refund.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use modelmart_core::{
    validate, Account, CallStatus, Model, ModelId, TransferReceipt, TransferRequest, UsageEvent,
};

use crate::error::{ApiError, RefundOutcome};
use crate::state::AppState;

/// Gateway state machine stages, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Request accepted by the router.
    Received,
    /// Caller resolved from its API key.
    Authenticated,
    /// Model metadata loaded.
    ModelResolved,
    /// Payload matches the input schema.
    Validated,
    /// Credits moved (or skipped for free models).
    Charged,
    /// Inference returned a result.
    Predicted,
    /// Usage event appended (or its loss logged).
    Recorded,
    /// Response assembled.
    Responded,
    /// Terminal failure.
    Aborted,
}

impl Stage {
    /// Stage name for log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Authenticated => "authenticated",
            Self::ModelResolved => "model_resolved",
            Self::Validated => "validated",
            Self::Charged => "charged",
            Self::Predicted => "predicted",
            Self::Recorded => "recorded",
            Self::Responded => "responded",
            Self::Aborted => "aborted",
        }
    }
}

/// An authenticated prediction request.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    /// The calling account, as loaded during authentication.
    pub caller: Account,
    /// Target model.
    pub model_id: ModelId,
    /// Raw request body.
    pub payload: Value,
    /// Optional client-supplied idempotency key.
    pub idempotency_key: Option<String>,
}

/// Result of a completed prediction.
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    /// Inference output, forwarded verbatim.
    pub prediction: Value,
    /// Credits charged for the call.
    pub credits_used: i64,
    /// Caller balance after the call (best effort).
    pub remaining_credits: i64,
}

fn advance(stage: Stage, request: &PredictionRequest) {
    tracing::debug!(
        stage = stage.as_str(),
        caller_id = %request.caller.id,
        model_id = %request.model_id,
        "Prediction stage"
    );
}

/// Run a prediction for an authenticated caller.
///
/// # Errors
///
/// - `ModelNotFound` if the model does not exist.
/// - `Validation` with every field error if the payload does not match.
/// - `InsufficientCredits` if the caller cannot pay; nothing is mutated.
/// - `DuplicateRequest` if the idempotency key was already used.
/// - `StoreUnavailable` if the charge could not be committed in time.
/// - `InferenceFailed` carrying whether the charge was refunded.
pub async fn predict(
    state: &Arc<AppState>,
    request: PredictionRequest,
) -> Result<PredictionOutcome, ApiError> {
    advance(Stage::Authenticated, &request);

    let models = Arc::clone(&state.models);
    let model_id = request.model_id;
    let model = state
        .run_store("get_model", move || models.get_model(&model_id))
        .await?
        .ok_or_else(|| abort(&request, ApiError::ModelNotFound(model_id.to_string())))?;
    advance(Stage::ModelResolved, &request);

    validate(&request.payload, &model.input_schema)
        .into_result()
        .map_err(|errors| abort(&request, ApiError::Validation(errors)))?;
    advance(Stage::Validated, &request);

    let task_state = Arc::clone(state);
    let outcome = tokio::spawn(async move { settle(&task_state, request, model).await })
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {e}")))??;

    tracing::debug!(stage = Stage::Responded.as_str(), "Prediction stage");
    Ok(outcome)
}

fn abort(request: &PredictionRequest, err: ApiError) -> ApiError {
    tracing::debug!(
        stage = Stage::Aborted.as_str(),
        caller_id = %request.caller.id,
        model_id = %request.model_id,
        code = err.code(),
        "Prediction aborted"
    );
    err
}

/// Charge, infer, record. Runs detached from the client connection.
async fn settle(
    state: &Arc<AppState>,
    request: PredictionRequest,
    model: Model,
) -> Result<PredictionOutcome, ApiError> {
    let transfer = TransferRequest::prediction(
        request.caller.id,
        model.owner_id,
        model.id,
        model.charge_per_call(),
    )
    .with_idempotency_key(request.idempotency_key.clone());

    let receipt = charge(state, transfer)
        .await
        .map_err(|e| abort(&request, e))?;
    advance(Stage::Charged, &request);

    let started = Instant::now();
    let result = tokio::time::timeout(
        state.config.inference_timeout(),
        state.inference.run(&model, &request.payload),
    )
    .await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let outcome = match result {
        Ok(Ok(prediction)) => Ok(prediction),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "inference timed out after {}ms",
            state.config.inference_timeout_ms
        )),
    };
    let prediction = match outcome {
        Ok(prediction) => prediction,
        Err(reason) => {
            return Err(fail(state, &request, &model, &receipt, latency_ms, reason).await);
        }
    };
    advance(Stage::Predicted, &request);

    let event = UsageEvent::record(
        &model,
        request.caller.id,
        receipt.amount,
        CallStatus::Success,
        latency_ms,
    );
    record(state, event).await;
    advance(Stage::Recorded, &request);

    let remaining_credits = remaining_balance(state, &request.caller, &receipt).await;

    Ok(PredictionOutcome {
        prediction,
        credits_used: receipt.amount,
        remaining_credits,
    })
}

/// Commit the transfer under the store timeout.
///
/// A transfer that outlives the timeout may still commit. The blocking task
/// is then watched to completion and reversed, so a 503 never hides a charge.
async fn charge(state: &Arc<AppState>, transfer: TransferRequest) -> Result<TransferReceipt, ApiError> {
    if transfer.amount == 0 {
        return Ok(TransferReceipt::empty(&transfer));
    }

    let self_call = transfer.is_self_transfer();
    let ledger = Arc::clone(&state.ledger);
    let mut task = tokio::task::spawn_blocking(move || ledger.transfer(&transfer));

    match tokio::time::timeout(state.config.store_timeout(), &mut task).await {
        Ok(Ok(result)) => {
            let receipt = result?;
            tracing::info!(
                transfer_id = %receipt.id,
                caller_id = %receipt.debit,
                owner_id = ?receipt.credit,
                credits = receipt.amount,
                self_call,
                "Prediction charged"
            );
            Ok(receipt)
        }
        Ok(Err(e)) => Err(ApiError::Internal(format!("transfer task failed: {e}"))),
        Err(_) => {
            let late_state = Arc::clone(state);
            tokio::spawn(async move {
                if let Ok(Ok(receipt)) = task.await {
                    tracing::warn!(
                        transfer_id = %receipt.id,
                        "Transfer committed after timeout - reversing"
                    );
                    refund(&late_state, &receipt).await;
                }
            });
            Err(ApiError::StoreUnavailable("transfer timed out".into()))
        }
    }
}

/// Refund a committed charge. Failures are logged with the receipt so the
/// refund can be replayed by hand.
async fn refund(state: &Arc<AppState>, receipt: &TransferReceipt) -> RefundOutcome {
    if receipt.is_noop() {
        return RefundOutcome::NotCharged;
    }

    let ledger = Arc::clone(&state.ledger);
    let original = receipt.clone();
    match state
        .run_store("reverse", move || ledger.reverse(&original))
        .await
    {
        Ok(reversal) => {
            tracing::info!(
                transfer_id = %receipt.id,
                reversal_id = %reversal.id,
                credits = receipt.amount,
                "Charge refunded"
            );
            RefundOutcome::Refunded
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                receipt = %serde_json::to_string(receipt).unwrap_or_default(),
                "Refund failed - charge requires manual reversal"
            );
            RefundOutcome::Pending
        }
    }
}

/// Refund, record the failure, and build the error returned to the caller.
async fn fail(
    state: &Arc<AppState>,
    request: &PredictionRequest,
    model: &Model,
    receipt: &TransferReceipt,
    latency_ms: u64,
    reason: String,
) -> ApiError {
    tracing::warn!(
        caller_id = %request.caller.id,
        model_id = %model.id,
        error = %reason,
        "Inference failed"
    );

    let refund = refund(state, receipt).await;
    record(
        state,
        UsageEvent::record(model, request.caller.id, 0, CallStatus::Error, latency_ms),
    )
    .await;

    abort(request, ApiError::InferenceFailed { reason, refund })
}

/// Append a usage event. A failed append degrades analytics, not billing,
/// so it is logged with the full event instead of failing the request.
async fn record(state: &Arc<AppState>, event: UsageEvent) {
    let events = Arc::clone(&state.events);
    let pending = event.clone();

    if let Err(e) = state
        .run_store("append_event", move || events.append(&pending))
        .await
    {
        tracing::warn!(
            error = %e,
            event_id = %event.event_id,
            event = %serde_json::to_string(&event).unwrap_or_default(),
            "Usage event lost"
        );
    }
}

/// Re-read the caller balance, falling back to the transfer receipt.
async fn remaining_balance(state: &Arc<AppState>, caller: &Account, receipt: &TransferReceipt) -> i64 {
    let ledger = Arc::clone(&state.ledger);
    let caller_id = caller.id;

    match state
        .run_store("balance_of", move || ledger.balance_of(&caller_id))
        .await
    {
        Ok(balance) => balance,
        Err(e) => {
            tracing::debug!(error = %e, "Balance re-read failed - using receipt");
            receipt.final_debit_balance().unwrap_or(caller.balance)
        }
    }
}
