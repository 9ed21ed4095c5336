//! Admin seeding and health integration tests.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{admin_key_header, api_key_header, header_value, TestHarness, ADMIN_KEY};

#[tokio::test]
async fn health_check() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "modelmart");
}

#[tokio::test]
async fn seeded_account_and_model_can_predict() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/admin/accounts")
        .add_header(admin_key_header(), header_value(ADMIN_KEY))
        .json(&json!({ "name": "owner" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let owner: Value = response.json();
    assert_eq!(owner["balance"], 0);

    let response = harness
        .server
        .post("/v1/admin/accounts")
        .add_header(admin_key_header(), header_value(ADMIN_KEY))
        .json(&json!({ "name": "caller", "initialCredits": 5 }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let caller: Value = response.json();
    assert_eq!(caller["balance"], 5);
    let api_key = caller["apiKey"].as_str().unwrap().to_string();
    assert!(api_key.starts_with("mm_"));

    let response = harness
        .server
        .post("/v1/admin/models")
        .add_header(admin_key_header(), header_value(ADMIN_KEY))
        .json(&json!({
            "ownerId": owner["accountId"],
            "name": "churn",
            "framework": "xgboost",
            "inputSchema": [{ "name": "tenure", "type": "numeric" }],
            "pricingMode": "paid",
            "creditsPerCall": 2
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let model: Value = response.json();
    assert_eq!(model["pricingMode"], "paid");
    let model_id = model["modelId"].as_str().unwrap().to_string();

    let response = harness
        .server
        .post(&format!("/v1/models/{model_id}/predict"))
        .add_header(api_key_header(), header_value(&api_key))
        .json(&json!({ "tenure": 12 }))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["remainingCredits"], 3);
}

#[tokio::test]
async fn model_for_unknown_owner_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/admin/models")
        .add_header(admin_key_header(), header_value(ADMIN_KEY))
        .json(&json!({
            "ownerId": modelmart_core::AccountId::generate(),
            "name": "orphan"
        }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn negative_price_is_rejected() {
    let harness = TestHarness::new();
    let owner = harness.account("owner", 0);

    let response = harness
        .server
        .post("/v1/admin/models")
        .add_header(admin_key_header(), header_value(ADMIN_KEY))
        .json(&json!({
            "ownerId": owner.id,
            "name": "bad",
            "pricingMode": "paid",
            "creditsPerCall": -1
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn grant_credits_success() {
    let harness = TestHarness::new();
    let account = harness.account("caller", 1);

    let response = harness
        .server
        .post("/v1/admin/credits")
        .add_header(admin_key_header(), header_value(ADMIN_KEY))
        .json(&json!({ "accountId": account.id, "amount": 9 }))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["balance"], 10);
    assert_eq!(harness.balance(account.id), 10);
}

#[tokio::test]
async fn grant_requires_positive_amount() {
    let harness = TestHarness::new();
    let account = harness.account("caller", 1);

    let response = harness
        .server
        .post("/v1/admin/credits")
        .add_header(admin_key_header(), header_value(ADMIN_KEY))
        .json(&json!({ "accountId": account.id, "amount": 0 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(harness.balance(account.id), 1);
}

#[tokio::test]
async fn admin_routes_require_admin_key() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/admin/accounts")
        .json(&json!({ "name": "x" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    harness
        .server
        .post("/v1/admin/accounts")
        .add_header(admin_key_header(), header_value("wrong"))
        .json(&json!({ "name": "x" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
