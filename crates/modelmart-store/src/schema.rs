//! Column family definitions.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Index: account by API key hash. Value is the `account_id` bytes.
    pub const ACCOUNTS_BY_API_KEY: &str = "accounts_by_api_key";

    /// Model records, keyed by `model_id`.
    pub const MODELS: &str = "models";

    /// Index: models by owner, keyed by `owner_id || model_id`. Empty value.
    pub const MODELS_BY_OWNER: &str = "models_by_owner";

    /// Ledger entries, keyed by `entry_id` (ULID).
    pub const LEDGER_ENTRIES: &str = "ledger_entries";

    /// Index: ledger entries by account, keyed by `account_id || entry_id`. Empty value.
    pub const LEDGER_ENTRIES_BY_ACCOUNT: &str = "ledger_entries_by_account";

    /// Applied transfers by idempotency key, keyed by `debit_id || key`.
    pub const TRANSFERS_BY_KEY: &str = "transfers_by_key";

    /// Usage events, keyed by `event_id` (ULID).
    pub const USAGE_EVENTS: &str = "usage_events";

    /// Index: usage events by model owner, keyed by `owner_id || event_id`. Empty value.
    pub const USAGE_EVENTS_BY_OWNER: &str = "usage_events_by_owner";

    /// Index: usage events by model, keyed by `model_id || event_id`. Empty value.
    pub const USAGE_EVENTS_BY_MODEL: &str = "usage_events_by_model";

    /// Index: usage events by caller, keyed by `caller_id || event_id`. Empty value.
    pub const USAGE_EVENTS_BY_CALLER: &str = "usage_events_by_caller";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::ACCOUNTS_BY_API_KEY,
        cf::MODELS,
        cf::MODELS_BY_OWNER,
        cf::LEDGER_ENTRIES,
        cf::LEDGER_ENTRIES_BY_ACCOUNT,
        cf::TRANSFERS_BY_KEY,
        cf::USAGE_EVENTS,
        cf::USAGE_EVENTS_BY_OWNER,
        cf::USAGE_EVENTS_BY_MODEL,
        cf::USAGE_EVENTS_BY_CALLER,
    ]
}
