//! Account types for modelmart.
//!
//! Accounts are created by the signup flow and hold a credit balance. The
//! balance only changes through ledger operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// A balance-holding account.
///
/// The plaintext API key is never stored; only its keyed hash is kept so a
/// presented key can be looked up without the store knowing the secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The account ID.
    pub id: AccountId,

    /// Display name, informational only.
    pub name: String,

    /// Current credit balance. Never negative.
    pub balance: i64,

    /// Hash of the account's API key (hex encoded).
    pub api_key_hash: String,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account balance was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with zero balance.
    #[must_use]
    pub fn new(id: AccountId, name: impl Into<String>, api_key_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            balance: 0,
            api_key_hash: api_key_hash.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the starting balance.
    #[must_use]
    pub fn with_balance(mut self, balance: i64) -> Self {
        self.balance = balance;
        self
    }

    /// Check if the account can cover a debit of `amount` credits.
    #[must_use]
    pub fn has_sufficient_credits(&self, amount: i64) -> bool {
        self.balance >= amount
    }
}
