//! Modelmart Client SDK.
//!
//! A thin client for the modelmart prediction service.
//!
//! # Example
//!
//! ```no_run
//! use modelmart_client::MarketClient;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), modelmart_client::ClientError> {
//! let client = MarketClient::new("http://modelmart:8080", "mm_your-api-key")?;
//!
//! let response = client
//!     .predict("3f2c7a0e-8d1b-4c55-9a8e-2b1f0c6d4e7a", &json!({ "age": 42 }), None)
//!     .await?;
//!
//! println!(
//!     "Used {} credits, {} left",
//!     response.credits_used, response.remaining_credits
//! );
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, MarketClient};
pub use error::ClientError;
pub use types::*;
