//! Modelmart HTTP API Service.
//!
//! This crate provides the HTTP API for the modelmart marketplace:
//!
//! - The metered prediction gateway (`POST /v1/models/{id}/predict`)
//! - Credit balance and ledger history
//! - Usage history and owner analytics
//! - Admin seeding of accounts, models and credit grants
//!
//! # Authentication
//!
//! 1. **API keys** - Prediction callers send their key in a configurable header
//!    (default `x-api-key`). Keys are stored as peppered HMAC hashes.
//! 2. **Session JWTs** - Model owners reading analytics send an HS256 bearer
//!    token whose `sub` is their account ID.
//! 3. **Admin key** - Seeding routes require `X-Admin-Key`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Read handlers need async for consistency

pub mod analytics;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod inference;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::{ApiError, RefundOutcome};
pub use gateway::{PredictionOutcome, PredictionRequest};
pub use inference::{HttpInference, InferenceBackend, InferenceError, MockInference};
pub use routes::create_router;
pub use state::AppState;
