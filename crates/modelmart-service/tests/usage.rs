//! Usage history integration tests.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{api_key_header, authorization, header_value, TestHarness};

#[tokio::test]
async fn history_pages_through_callers_own_events() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 10);
    let other = harness.account("other", 10);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 1);

    for _ in 0..3 {
        harness
            .predict(&caller, model.id, &json!({ "age": 30 }))
            .await
            .assert_status(StatusCode::OK);
    }
    harness
        .predict(&other, model.id, &json!({ "age": 30 }))
        .await
        .assert_status(StatusCode::OK);

    let response = harness
        .server
        .get("/v1/usage/history?limit=2")
        .add_header(api_key_header(), header_value(&caller.api_key))
        .await;

    response.assert_status(StatusCode::OK);
    let first: Value = response.json();
    let events = first["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|e| e["callerId"] == caller.id.to_string()));
    assert_eq!(events[0]["status"], "success");
    assert_eq!(events[0]["pricingMode"], "paid");
    let cursor = first["nextCursor"].as_str().unwrap().to_string();

    let response = harness
        .server
        .get(&format!("/v1/usage/history?limit=2&cursor={cursor}"))
        .add_header(api_key_header(), header_value(&caller.api_key))
        .await;

    response.assert_status(StatusCode::OK);
    let second: Value = response.json();
    assert_eq!(second["events"].as_array().unwrap().len(), 1);
    assert!(second.get("nextCursor").is_none());
}

#[tokio::test]
async fn history_rejects_malformed_cursor() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 0);

    let response = harness
        .server
        .get("/v1/usage/history?cursor=nope")
        .add_header(api_key_header(), header_value(&caller.api_key))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn model_usage_is_visible_to_owner_only() {
    let harness = TestHarness::new();
    let caller = harness.account("caller", 10);
    let owner = harness.account("owner", 0);
    let model = harness.paid_model(owner.id, 2);

    harness
        .predict(&caller, model.id, &json!({ "age": 30 }))
        .await
        .assert_status(StatusCode::OK);

    let path = format!("/v1/models/{}/usage", model.id);

    let response = harness
        .server
        .get(&path)
        .add_header(authorization(), harness.session_header(owner.id))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["creditsTransferred"], 2);
    assert_eq!(events[0]["modelId"], model.id.to_string());

    let response = harness
        .server
        .get(&path)
        .add_header(authorization(), harness.session_header(caller.id))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = harness.server.get(&path).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}
