//! Router configuration.

use std::sync::Arc;

use axum::error_handling::HandleErrorLayer;
use axum::routing::{get, post};
use axum::{BoxError, Router};
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::handlers::{admin, analytics, credits, health, predict, usage};
use crate::state::AppState;

/// Maximum concurrent prediction calls.
const PREDICT_MAX_CONCURRENT_REQUESTS: usize = 200;

/// Maximum concurrent requests for read endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Maximum concurrent admin requests.
const ADMIN_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Predictions (API key auth)
/// - `POST /v1/models/:id/predict` - Run a prediction
///
/// ## Credits and usage (API key auth)
/// - `GET /v1/credits/balance` - Current balance
/// - `GET /v1/credits/ledger` - Ledger entries, newest first
/// - `GET /v1/usage/history` - Caller's own prediction calls
///
/// ## Owner dashboard (session auth)
/// - `GET /v1/models/:id/usage` - Calls against an owned model
/// - `GET /v1/analytics` - Analytics snapshot
///
/// ## Admin (`X-Admin-Key`)
/// - `POST /v1/admin/accounts` - Create account
/// - `POST /v1/admin/models` - Register model
/// - `POST /v1/admin/credits` - Grant credits
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let predict_routes = Router::new()
        .route("/models/:id/predict", post(predict::predict))
        .layer(ConcurrencyLimitLayer::new(PREDICT_MAX_CONCURRENT_REQUESTS));

    let admin_routes = Router::new()
        .route("/accounts", post(admin::create_account))
        .route("/models", post(admin::create_model))
        .route("/credits", post(admin::grant_credits))
        .layer(ConcurrencyLimitLayer::new(ADMIN_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/ledger", get(credits::list_entries))
        .route("/usage/history", get(usage::history))
        .route("/models/:id/usage", get(usage::model_usage))
        .route("/analytics", get(analytics::get_analytics))
        .nest("/admin", admin_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .merge(predict_routes);

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

/// Turn middleware failures into the JSON error envelope.
async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        tracing::warn!("Request exceeded the router deadline");
        ApiError::RequestTimeout
    } else {
        ApiError::Internal(format!("middleware error: {err}"))
    }
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}
