//! Storage layer for modelmart.
//!
//! The prediction gateway talks to four narrow interfaces instead of one
//! database handle:
//!
//! - [`AccountDirectory`]: accounts and API key lookup
//! - [`ModelRegistry`]: model metadata
//! - [`LedgerStore`]: balances and atomic transfers
//! - [`UsageEventStore`]: the append-only usage log
//!
//! Two backends implement all of them: [`RocksStore`] (feature
//! `rocksdb-backend`, column families described in [`schema`]) and
//! [`MemoryStore`].
//!
//! # Example
//!
//! ```
//! use modelmart_core::{Account, AccountId, TransferRequest, ModelId};
//! use modelmart_store::{AccountDirectory, LedgerStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let caller = Account::new(AccountId::generate(), "caller", "h1").with_balance(5);
//! let owner = Account::new(AccountId::generate(), "owner", "h2");
//! store.create_account(&caller).unwrap();
//! store.create_account(&owner).unwrap();
//!
//! let request = TransferRequest::prediction(caller.id, owner.id, ModelId::generate(), 3);
//! store.transfer(&request).unwrap();
//! assert_eq!(store.balance_of(&caller.id).unwrap(), 2);
//! assert_eq!(store.balance_of(&owner.id).unwrap(), 3);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod scan;
pub mod schema;
mod transfer;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;
pub use scan::EventScan;

use modelmart_core::{
    Account, AccountId, EventId, LedgerEntry, Model, ModelId, TimeRange, TransferReceipt,
    TransferRequest, UsageEvent,
};

/// Default page size for event queries.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Account records and API key lookup.
///
/// Accounts are created by the signup flow. Balances are only changed
/// through [`LedgerStore`].
pub trait AccountDirectory: Send + Sync {
    /// Insert a new account and index its API key hash.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the ID or API key hash is taken.
    fn create_account(&self, account: &Account) -> Result<()>;

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Find the account owning an API key hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_by_api_key_hash(&self, api_key_hash: &str) -> Result<Option<Account>>;
}

/// Model metadata lookup.
pub trait ModelRegistry: Send + Sync {
    /// Insert or replace a model record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_model(&self, model: &Model) -> Result<()>;

    /// Get a model by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_model(&self, model_id: &ModelId) -> Result<Option<Model>>;

    /// List an owner's models, ordered by model ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_models_by_owner(&self, owner_id: &AccountId) -> Result<Vec<Model>>;

    /// Number of models an owner has registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_models_by_owner(&self, owner_id: &AccountId) -> Result<usize> {
        Ok(self.list_models_by_owner(owner_id)?.len())
    }
}

/// Credit balances with atomic transfers.
///
/// Transfers on one store are linearizable: the balance check and the
/// balance updates of a transfer happen under a single exclusive section.
pub trait LedgerStore: Send + Sync {
    /// Move `request.amount` credits from `request.debit` to `request.credit`.
    ///
    /// A zero amount succeeds without touching any account. A self-transfer
    /// journals both legs against the same account, so its balance is
    /// unchanged but the debit side must still cover the amount.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if the amount is negative.
    /// - `StoreError::InsufficientCredits` if the debit balance is too low; nothing is mutated.
    /// - `StoreError::NotFound` if either account does not exist.
    /// - `StoreError::DuplicateTransfer` if the idempotency key was already used by the debit account.
    fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt>;

    /// Undo a committed transfer.
    ///
    /// The original credit account (if any) is debited and the original
    /// debit account is credited back. The idempotency key the transfer was
    /// recorded under is released in the same atomic write, so a retry
    /// with that key is accepted again.
    ///
    /// # Errors
    ///
    /// - `StoreError::InsufficientCredits` if the credited account no longer holds the amount.
    /// - `StoreError::NotFound` if either account does not exist.
    fn reverse(&self, receipt: &TransferReceipt) -> Result<TransferReceipt>;

    /// Add credits from outside the ledger (purchases, promotions).
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if the amount is not positive.
    /// - `StoreError::NotFound` if the account does not exist.
    fn grant(&self, account_id: &AccountId, amount: i64) -> Result<i64>;

    /// Current balance of an account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account does not exist.
    fn balance_of(&self, account_id: &AccountId) -> Result<i64>;

    /// List ledger entries for an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn entries_for_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>>;
}

/// Secondary access path into the usage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventIndex {
    /// Events for models owned by an account.
    Owner(AccountId),
    /// Events for one model.
    Model(ModelId),
    /// Events made by a calling account.
    Caller(AccountId),
}

impl EventIndex {
    /// Key prefix of the index.
    #[must_use]
    pub fn prefix(&self) -> [u8; 16] {
        match self {
            Self::Owner(id) | Self::Caller(id) => *id.as_bytes(),
            Self::Model(id) => *id.as_bytes(),
        }
    }
}

/// One page request against an event index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventQuery {
    /// Time window (inclusive).
    pub range: TimeRange,
    /// Resume strictly after this event.
    pub after: Option<EventId>,
    /// Maximum number of events to return.
    pub limit: usize,
}

impl EventQuery {
    /// Query the first page of `range`.
    #[must_use]
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            after: None,
            limit: DEFAULT_PAGE_SIZE,
        }
    }

    /// Resume after a cursor.
    #[must_use]
    pub fn after(mut self, cursor: Option<EventId>) -> Self {
        self.after = cursor;
        self
    }

    /// Set the page size.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A page of events in timestamp-ascending order.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    /// Events in this page.
    pub events: Vec<UsageEvent>,
    /// Cursor for the next page, `None` when the window is exhausted.
    pub next: Option<EventId>,
}

/// Append-only usage log.
///
/// There is deliberately no update or delete operation.
pub trait UsageEventStore: Send + Sync {
    /// Durably append an event and its index entries.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the event ID was already written.
    fn append(&self, event: &UsageEvent) -> Result<()>;

    /// Read one page from an index, ordered by timestamp ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn query_events(&self, index: &EventIndex, query: &EventQuery) -> Result<EventPage>;

    /// Read one page of events for models owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn query_by_owner(&self, owner_id: &AccountId, query: &EventQuery) -> Result<EventPage> {
        self.query_events(&EventIndex::Owner(*owner_id), query)
    }

    /// Read one page of events for `model_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn query_by_model(&self, model_id: &ModelId, query: &EventQuery) -> Result<EventPage> {
        self.query_events(&EventIndex::Model(*model_id), query)
    }

    /// Read one page of events made by `caller_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn query_by_caller(&self, caller_id: &AccountId, query: &EventQuery) -> Result<EventPage> {
        self.query_events(&EventIndex::Caller(*caller_id), query)
    }
}

/// Build the next-page cursor for a page of `limit` events.
pub(crate) fn next_cursor(events: &[UsageEvent], limit: usize) -> Option<EventId> {
    if events.len() >= limit {
        events.last().map(|e| e.event_id)
    } else {
        None
    }
}
