//! Prediction gateway integration tests.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{
    api_key_header, header_value, idempotency_key_header, FailOnce, FailingInference,
    StalledInference, TestHarness,
};
use modelmart_core::{AccountId, CallStatus, EntryKind, ModelId, TimeRange, UsageEvent};
use modelmart_store::{EventQuery, LedgerStore, UsageEventStore};

fn all_events_by_caller(harness: &TestHarness, caller: AccountId) -> Vec<UsageEvent> {
    harness
        .store
        .query_by_caller(&caller, &EventQuery::new(TimeRange::all()))
        .unwrap()
        .events
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn paid_prediction_moves_credits_and_records_event() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 5);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    let response = harness.predict(&caller, model.id, &json!({ "age": 42 })).await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["creditsUsed"], 3);
    assert_eq!(body["remainingCredits"], 2);
    assert!(body["prediction"].is_object());

    assert_eq!(harness.balance(caller.id), 2);
    assert_eq!(harness.balance(owner.id), 3);

    let events = all_events_by_caller(&harness, caller.id);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].model_id, model.id);
    assert_eq!(events[0].owner_id, owner.id);
    assert_eq!(events[0].credits_transferred, 3);
    assert_eq!(events[0].status, CallStatus::Success);
    assert_eq!(events[0].framework, "sklearn");
}

#[tokio::test]
async fn second_call_without_credits_is_rejected_without_event() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 5);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    harness
        .predict(&caller, model.id, &json!({ "age": 42 }))
        .await
        .assert_status(StatusCode::OK);

    let response = harness.predict(&caller, model.id, &json!({ "age": 42 })).await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "insufficient_credits");
    assert_eq!(body["details"]["required"], 3);
    assert_eq!(body["details"]["available"], 2);

    assert_eq!(harness.balance(caller.id), 2);
    assert_eq!(harness.balance(owner.id), 3);
    assert_eq!(all_events_by_caller(&harness, caller.id).len(), 1);
}

#[tokio::test]
async fn free_model_charges_nothing() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 0);
    let owner = harness.account("owner", 0);
    let model = harness.free_model(owner.id);

    let response = harness.predict(&caller, model.id, &json!({ "age": 1 })).await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["creditsUsed"], 0);
    assert_eq!(body["remainingCredits"], 0);

    let events = all_events_by_caller(&harness, caller.id);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].credits_transferred, 0);
    assert!(harness
        .store
        .entries_for_account(&caller.id, 10, 0)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn owner_calling_own_model_nets_zero() {
    let harness = TestHarness::new();
    let owner = harness.account("owner", 10);
    let model = harness.paid_model(owner.id, 4);

    let response = harness.predict(&owner, model.id, &json!({ "age": 7 })).await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["creditsUsed"], 4);
    assert_eq!(body["remainingCredits"], 10);
    assert_eq!(harness.balance(owner.id), 10);

    let kinds: Vec<EntryKind> = harness
        .store
        .entries_for_account(&owner.id, 2, 0)
        .unwrap()
        .iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds, vec![EntryKind::PredictionEarning, EntryKind::PredictionCharge]);

    let events = all_events_by_caller(&harness, owner.id);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].owner_id, events[0].caller_id);
    assert_eq!(events[0].credits_transferred, 4);
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn validation_reports_every_field_error() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 5);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    let response = harness
        .predict(&caller, model.id, &json!({ "age": "42", "note": "" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "validation_failed");
    let errors = body["details"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["field"], "age");
    assert_eq!(errors[1]["field"], "note");

    assert_eq!(harness.balance(caller.id), 5);
    assert!(all_events_by_caller(&harness, caller.id).is_empty());
}

#[tokio::test]
async fn non_object_body_is_a_validation_failure() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 5);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    let response = harness.predict(&caller, model.id, &json!([1, 2, 3])).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = harness
        .server
        .post(&format!("/v1/models/{}/predict", model.id))
        .add_header(api_key_header(), header_value(&caller.api_key))
        .text("not json at all")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "validation_failed");

    assert_eq!(harness.balance(caller.id), 5);
}

#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    let harness = TestHarness::new();
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    let response = harness
        .server
        .post(&format!("/v1/models/{}/predict", model.id))
        .json(&json!({ "age": 1 }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "missing_api_key");
}

#[tokio::test]
async fn unknown_api_key_is_unauthorized() {
    let harness = TestHarness::new();
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    let response = harness
        .server
        .post(&format!("/v1/models/{}/predict", model.id))
        .add_header(api_key_header(), header_value("mm_not-a-real-key"))
        .json(&json!({ "age": 1 }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "invalid_api_key");
}

#[tokio::test]
async fn unknown_model_is_not_found() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 5);

    let response = harness
        .predict(&caller, ModelId::generate(), &json!({ "age": 1 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "model_not_found");

    let response = harness
        .server
        .post("/v1/models/not-a-uuid/predict")
        .add_header(api_key_header(), header_value(&caller.api_key))
        .json(&json!({ "age": 1 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    assert_eq!(harness.balance(caller.id), 5);
}

// ============================================================================
// Idempotency
// ============================================================================

#[tokio::test]
async fn replayed_idempotency_key_is_not_charged_twice() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 10);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    let send = || {
        harness
            .server
            .post(&format!("/v1/models/{}/predict", model.id))
            .add_header(api_key_header(), header_value(&caller.api_key))
            .add_header(idempotency_key_header(), header_value("order-17"))
            .json(&json!({ "age": 5 }))
    };

    send().await.assert_status(StatusCode::OK);

    let response = send().await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "duplicate_request");

    assert_eq!(harness.balance(caller.id), 7);
    assert_eq!(harness.balance(owner.id), 3);
    assert_eq!(all_events_by_caller(&harness, caller.id).len(), 1);
}

#[tokio::test]
async fn oversized_idempotency_key_is_rejected() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 10);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    let response = harness
        .server
        .post(&format!("/v1/models/{}/predict", model.id))
        .add_header(api_key_header(), header_value(&caller.api_key))
        .add_header(idempotency_key_header(), header_value(&"k".repeat(300)))
        .json(&json!({ "age": 5 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(harness.balance(caller.id), 10);
}

// ============================================================================
// Inference failure
// ============================================================================

#[tokio::test]
async fn inference_failure_refunds_and_records_error_event() {
    let harness = TestHarness::with_inference(Arc::new(FailingInference));
    let caller = harness.account("caller", 5);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    let response = harness.predict(&caller, model.id, &json!({ "age": 42 })).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "inference_failed");

    assert_eq!(harness.balance(caller.id), 5);
    assert_eq!(harness.balance(owner.id), 0);

    let events = all_events_by_caller(&harness, caller.id);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, CallStatus::Error);
    assert_eq!(events[0].credits_transferred, 0);

    let kinds: Vec<EntryKind> = harness
        .store
        .entries_for_account(&owner.id, 10, 0)
        .unwrap()
        .iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds, vec![EntryKind::RefundClawback, EntryKind::PredictionEarning]);
    assert_eq!(body["details"]["refund"], "refunded");
}

#[tokio::test]
async fn retry_after_refunded_failure_reuses_idempotency_key() {
    let harness = TestHarness::with_inference(Arc::new(FailOnce::default()));
    let caller = harness.account("caller", 10);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    let send = || {
        harness
            .server
            .post(&format!("/v1/models/{}/predict", model.id))
            .add_header(api_key_header(), header_value(&caller.api_key))
            .add_header(idempotency_key_header(), header_value("order-1"))
            .json(&json!({ "age": 42 }))
    };

    let first = send().await;
    first.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.balance(caller.id), 10);

    let retry = send().await;
    retry.assert_status(StatusCode::OK);
    let body: Value = retry.json();
    assert_eq!(body["remainingCredits"], 7);
    assert_eq!(harness.balance(owner.id), 3);

    // The key is bound to the successful charge now.
    send().await.assert_status(StatusCode::CONFLICT);
    assert_eq!(harness.balance(caller.id), 7);
}

#[tokio::test]
async fn free_model_failure_reports_nothing_charged() {
    let harness = TestHarness::with_inference(Arc::new(FailingInference));
    let caller = harness.account("caller", 0);
    let owner = harness.account("owner", 0);
    let model = harness.free_model(owner.id);

    let response = harness.predict(&caller, model.id, &json!({ "age": 1 })).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["details"]["refund"], "not_charged");
    assert_eq!(body["error"], "Model inference failed; no credits were charged");
}

#[tokio::test]
async fn inference_timeout_is_refunded() {
    let harness = TestHarness::with_inference(Arc::new(StalledInference));
    let caller = harness.account("caller", 5);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    let response = harness.predict(&caller, model.id, &json!({ "age": 42 })).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.balance(caller.id), 5);
    assert_eq!(harness.balance(owner.id), 0);
}

#[tokio::test]
async fn router_deadline_returns_error_envelope() {
    let harness = TestHarness::configured(Some(Arc::new(StalledInference)), |config| {
        config.request_timeout_seconds = 1;
        config.inference_timeout_ms = 10_000;
    });
    let caller = harness.account("caller", 5);
    let owner = harness.account("owner", 0);
    let model = harness.free_model(owner.id);

    let response = harness.predict(&caller, model.id, &json!({ "age": 42 })).await;

    response.assert_status(StatusCode::REQUEST_TIMEOUT);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "request_timeout");
}
