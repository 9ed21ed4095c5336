//! Core types for the modelmart prediction marketplace.
//!
//! This crate provides the foundational pieces shared by the store and the
//! service:
//!
//! - **Identifiers**: `AccountId`, `ModelId`, `EventId`, `TransferId`, `EntryId`
//! - **Accounts and models**: `Account`, `Model`, `PricingMode`
//! - **Schema validation**: `FieldSpec`, `FieldType`, `validate`
//! - **Ledger**: `TransferRequest`, `TransferReceipt`, `LedgerEntry`
//! - **Usage**: `UsageEvent`, `CallStatus`, `TimeRange`
//! - **Analytics**: `SnapshotBuilder`, `AnalyticsSnapshot`
//!
//! # Credits
//!
//! Credits are the internal unit of value. They are stored as `i64` and are
//! never negative on an account; paid models charge a fixed number of credits
//! per call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod analytics;
pub mod ids;
pub mod ledger;
pub mod model;
pub mod schema;
pub mod usage;

pub use account::Account;
pub use analytics::{AnalyticsSnapshot, DailyUsage, ModelUsage, SnapshotBuilder, UsageOverview};
pub use ids::{AccountId, EntryId, EventId, IdError, ModelId, TransferId};
pub use ledger::{EntryKind, LedgerEntry, TransferReceipt, TransferRequest};
pub use model::{Model, PricingMode};
pub use schema::{validate, FieldError, FieldSpec, FieldType, ValidationReport};
pub use usage::{CallStatus, TimeRange, UsageEvent};
