//! Credit ledger types for modelmart.
//!
//! A transfer moves credits from a debit account to an optional credit
//! account. Every balance change it causes is journaled as a [`LedgerEntry`],
//! which is what the usage log is reconciled against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, EntryId, ModelId, TransferId};

/// A request to move `amount` credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Account whose balance is decremented.
    pub debit: AccountId,

    /// Account whose balance is incremented, if any. May equal `debit`, in
    /// which case both legs are journaled and the balance nets out.
    pub credit: Option<AccountId>,

    /// Non-negative amount of credits.
    pub amount: i64,

    /// Model the transfer pays for, recorded on the ledger entries.
    pub model_id: Option<ModelId>,

    /// Caller-supplied key; a key already used by `debit` is never applied twice.
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    /// Charge `caller` for a call to `model_id`, paying `owner`.
    #[must_use]
    pub fn prediction(caller: AccountId, owner: AccountId, model_id: ModelId, amount: i64) -> Self {
        Self {
            debit: caller,
            credit: Some(owner),
            amount,
            model_id: Some(model_id),
            idempotency_key: None,
        }
    }

    /// Attach an idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    /// Whether caller and owner are the same account.
    #[must_use]
    pub fn is_self_transfer(&self) -> bool {
        self.credit == Some(self.debit)
    }
}

/// The committed result of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Transfer ID.
    pub id: TransferId,

    /// Debited account.
    pub debit: AccountId,

    /// Credited account, if a credit was applied.
    pub credit: Option<AccountId>,

    /// Amount moved.
    pub amount: i64,

    /// Model the transfer paid for.
    pub model_id: Option<ModelId>,

    /// Debit account balance after the transfer (absent for zero-amount transfers).
    pub debit_balance_after: Option<i64>,

    /// Credit account balance after the transfer.
    pub credit_balance_after: Option<i64>,

    /// When the transfer was committed.
    pub committed_at: DateTime<Utc>,

    /// Idempotency key the transfer was recorded under. Reversing the
    /// transfer releases it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl TransferReceipt {
    /// Receipt for a zero-amount transfer; nothing was mutated.
    #[must_use]
    pub fn empty(request: &TransferRequest) -> Self {
        Self {
            id: TransferId::generate(),
            debit: request.debit,
            credit: None,
            amount: 0,
            model_id: request.model_id,
            debit_balance_after: None,
            credit_balance_after: None,
            committed_at: Utc::now(),
            idempotency_key: None,
        }
    }

    /// Whether the transfer mutated any balance.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.amount == 0
    }

    /// Debit account balance once the whole transfer applied. For a
    /// self-transfer the credit leg ran last and holds the final balance.
    #[must_use]
    pub fn final_debit_balance(&self) -> Option<i64> {
        if self.credit == Some(self.debit) {
            self.credit_balance_after
        } else {
            self.debit_balance_after
        }
    }
}

/// One journaled balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry ID (ULID for time ordering).
    pub id: EntryId,

    /// The account whose balance changed.
    pub account_id: AccountId,

    /// The transfer that caused the change.
    pub transfer_id: TransferId,

    /// Signed amount. Positive = credit, negative = debit.
    pub amount: i64,

    /// Kind of change.
    pub kind: EntryKind,

    /// Balance after this entry.
    pub balance_after: i64,

    /// Model involved, if any.
    pub model_id: Option<ModelId>,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create an entry; the sign of `amount` follows `kind`.
    #[must_use]
    pub fn new(
        account_id: AccountId,
        transfer_id: TransferId,
        kind: EntryKind,
        amount: i64,
        balance_after: i64,
        model_id: Option<ModelId>,
    ) -> Self {
        let magnitude = amount.abs();
        Self {
            id: EntryId::generate(),
            account_id,
            transfer_id,
            amount: if kind.is_credit() { magnitude } else { -magnitude },
            kind,
            balance_after,
            model_id,
            created_at: Utc::now(),
        }
    }
}

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Caller charged for a prediction.
    PredictionCharge,

    /// Owner paid for a prediction.
    PredictionEarning,

    /// Caller refunded after a failed prediction.
    Refund,

    /// Owner earning taken back after a failed prediction.
    RefundClawback,

    /// Credits granted from outside the ledger (purchase, promotion).
    Grant,
}

impl EntryKind {
    /// Check if this entry kind adds credits.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::PredictionEarning | Self::Refund | Self::Grant)
    }

    /// Get the kind name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PredictionCharge => "prediction_charge",
            Self::PredictionEarning => "prediction_earning",
            Self::Refund => "refund",
            Self::RefundClawback => "refund_clawback",
            Self::Grant => "grant",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_sign_follows_kind() {
        let account = AccountId::generate();
        let transfer = TransferId::generate();

        let charge = LedgerEntry::new(account, transfer, EntryKind::PredictionCharge, 3, 2, None);
        assert_eq!(charge.amount, -3);

        let earning = LedgerEntry::new(account, transfer, EntryKind::PredictionEarning, -3, 8, None);
        assert_eq!(earning.amount, 3);

        let clawback = LedgerEntry::new(account, transfer, EntryKind::RefundClawback, 3, 5, None);
        assert_eq!(clawback.amount, -3);
    }

    #[test]
    fn self_transfer_is_detected() {
        let account = AccountId::generate();
        let request = TransferRequest::prediction(account, account, ModelId::generate(), 3);
        assert!(request.is_self_transfer());

        let other = AccountId::generate();
        let request = TransferRequest::prediction(account, other, ModelId::generate(), 3);
        assert!(!request.is_self_transfer());
    }

    #[test]
    fn empty_receipt_is_noop() {
        let request =
            TransferRequest::prediction(AccountId::generate(), AccountId::generate(), ModelId::generate(), 0);
        let receipt = TransferReceipt::empty(&request);
        assert!(receipt.is_noop());
        assert!(receipt.debit_balance_after.is_none());
    }
}
