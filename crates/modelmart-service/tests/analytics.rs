//! Analytics integration tests.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{authorization, header_value, FailingInference, TestHarness};
use modelmart_core::EntryKind;
use modelmart_store::LedgerStore;

#[tokio::test]
async fn owner_without_events_gets_zero_snapshot_with_model_count() {
    let harness = TestHarness::new();
    let owner = harness.account("owner", 0);
    harness.paid_model(owner.id, 3);
    harness.free_model(owner.id);

    let response = harness
        .server
        .get("/v1/analytics")
        .add_header(authorization(), harness.session_header(owner.id))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["modelCount"], 2);
    assert_eq!(body["overview"]["totalCalls"], 0);
    assert_eq!(body["overview"]["totalCreditsEarned"], 0);
    assert_eq!(body["rangeDays"], 30);
    assert!(body["topModels"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn totals_reconcile_with_ledger_earnings() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 20);
    let owner = harness.account("owner", 5);
    let paid = harness.paid_model(owner.id, 3);
    let free = harness.free_model(owner.id);

    for _ in 0..2 {
        harness
            .predict(&caller, paid.id, &json!({ "age": 1 }))
            .await
            .assert_status(StatusCode::OK);
    }
    harness
        .predict(&caller, free.id, &json!({ "age": 1 }))
        .await
        .assert_status(StatusCode::OK);
    // Owners may call their own models; the earning leg offsets the charge.
    harness
        .predict(&owner, paid.id, &json!({ "age": 1 }))
        .await
        .assert_status(StatusCode::OK);

    let response = harness
        .server
        .get("/v1/analytics?days=7")
        .add_header(authorization(), harness.session_header(owner.id))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["rangeDays"], 7);
    assert_eq!(body["overview"]["totalCalls"], 4);
    assert_eq!(body["overview"]["totalCreditsEarned"], 9);
    assert_eq!(body["overview"]["distinctCallers"], 2);

    let top = body["topModels"].as_array().unwrap();
    assert_eq!(top[0]["modelId"], paid.id.to_string());
    assert_eq!(top[0]["calls"], 3);
    assert_eq!(top[0]["creditsEarned"], 9);

    let earned: i64 = harness
        .store
        .entries_for_account(&owner.id, 100, 0)
        .unwrap()
        .iter()
        .filter(|e| matches!(e.kind, EntryKind::PredictionEarning | EntryKind::RefundClawback))
        .map(|e| e.amount)
        .sum();
    assert_eq!(earned, 9);
    assert_eq!(harness.balance(owner.id), 11);
}

#[tokio::test]
async fn failed_calls_count_without_earnings() {
    let harness = TestHarness::with_inference(Arc::new(FailingInference));
    let caller = harness.account("caller", 20);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 3);

    harness
        .predict(&caller, model.id, &json!({ "age": 1 }))
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let response = harness
        .server
        .get("/v1/analytics")
        .add_header(authorization(), harness.session_header(owner.id))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["overview"]["totalCalls"], 1);
    assert_eq!(body["overview"]["totalCreditsEarned"], 0);
}

#[tokio::test]
async fn days_are_clamped_to_configured_maximum() {
    let harness = TestHarness::new();
    let owner = harness.account("owner", 0);

    let response = harness
        .server
        .get("/v1/analytics?days=100000")
        .add_header(authorization(), harness.session_header(owner.id))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["rangeDays"], 365);
}

#[tokio::test]
async fn analytics_requires_a_valid_session() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/analytics")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    harness
        .server
        .get("/v1/analytics")
        .add_header(authorization(), header_value("Bearer not-a-jwt"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
