//! Transfer planning shared by the storage backends.
//!
//! A plan is computed from account snapshots read under the ledger lock and
//! then persisted by the backend in one atomic write. Planning never mutates
//! anything, so a rejected transfer leaves no trace.

use chrono::Utc;

use modelmart_core::{
    Account, EntryKind, LedgerEntry, ModelId, TransferId, TransferReceipt, TransferRequest,
};

use crate::error::{Result, StoreError};

/// One side of a transfer.
pub(crate) struct Leg {
    pub account: Account,
    pub kind: EntryKind,
}

/// Updated accounts and journal entries to persist atomically.
pub(crate) struct TransferPlan {
    pub accounts: Vec<Account>,
    pub entries: Vec<LedgerEntry>,
    pub receipt: TransferReceipt,
}

/// Reject negative amounts before any lock is taken.
pub(crate) fn check_amount(amount: i64) -> Result<()> {
    if amount < 0 {
        return Err(StoreError::InvalidAmount(format!(
            "amount must not be negative, got {amount}"
        )));
    }
    Ok(())
}

/// Plan a forward transfer from loaded accounts.
///
/// `credit` may be the same account as `debit`. Both legs are then journaled
/// against it and its balance nets out.
pub(crate) fn plan_transfer(
    request: &TransferRequest,
    debit: Account,
    credit: Option<Account>,
) -> Result<TransferPlan> {
    let debit_id = debit.id;
    let plan = apply(
        TransferId::generate(),
        request.amount,
        request.model_id,
        Some(Leg {
            account: debit,
            kind: EntryKind::PredictionCharge,
        }),
        credit.map(|account| Leg {
            account,
            kind: EntryKind::PredictionEarning,
        }),
    )?;

    Ok(TransferPlan {
        receipt: TransferReceipt {
            debit: debit_id,
            idempotency_key: request.idempotency_key.clone(),
            ..plan.receipt
        },
        ..plan
    })
}

/// Plan the reversal of `receipt`: claw back from the original credit
/// account (if any) and refund the original debit account.
pub(crate) fn plan_reversal(
    receipt: &TransferReceipt,
    original_debit: Account,
    original_credit: Option<Account>,
) -> Result<TransferPlan> {
    let plan = apply(
        TransferId::generate(),
        receipt.amount,
        receipt.model_id,
        original_credit.map(|account| Leg {
            account,
            kind: EntryKind::RefundClawback,
        }),
        Some(Leg {
            account: original_debit,
            kind: EntryKind::Refund,
        }),
    )?;

    Ok(TransferPlan {
        receipt: TransferReceipt {
            debit: receipt.credit.unwrap_or(receipt.debit),
            credit: Some(receipt.debit),
            ..plan.receipt
        },
        ..plan
    })
}

/// Plan a grant of external credits.
pub(crate) fn plan_grant(account: Account, amount: i64) -> Result<TransferPlan> {
    if amount <= 0 {
        return Err(StoreError::InvalidAmount(format!(
            "grant must be positive, got {amount}"
        )));
    }
    let account_id = account.id;
    let plan = apply(
        TransferId::generate(),
        amount,
        None,
        None,
        Some(Leg {
            account,
            kind: EntryKind::Grant,
        }),
    )?;

    Ok(TransferPlan {
        receipt: TransferReceipt {
            debit: account_id,
            ..plan.receipt
        },
        ..plan
    })
}

fn apply(
    transfer_id: TransferId,
    amount: i64,
    model_id: Option<ModelId>,
    debit: Option<Leg>,
    credit: Option<Leg>,
) -> Result<TransferPlan> {
    let now = Utc::now();
    let mut accounts = Vec::with_capacity(2);
    let mut entries = Vec::with_capacity(2);
    let mut debit_balance_after = None;
    let mut credit_balance_after = None;
    let mut debit_id = None;
    let mut credit_id = None;

    if let Some(Leg { mut account, kind }) = debit {
        if account.balance < amount {
            return Err(StoreError::InsufficientCredits {
                required: amount,
                available: account.balance,
            });
        }
        account.balance -= amount;
        account.updated_at = now;
        entries.push(LedgerEntry::new(
            account.id,
            transfer_id,
            kind,
            amount,
            account.balance,
            model_id,
        ));
        debit_balance_after = Some(account.balance);
        debit_id = Some(account.id);
        accounts.push(account);
    }

    if let Some(Leg { account, kind }) = credit {
        // A self-transfer credits the account the debit leg already updated.
        let mut account = match accounts.iter().position(|existing: &Account| existing.id == account.id) {
            Some(index) => accounts.remove(index),
            None => account,
        };
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| StoreError::InvalidAmount("balance overflow".into()))?;
        account.updated_at = now;
        entries.push(LedgerEntry::new(
            account.id,
            transfer_id,
            kind,
            amount,
            account.balance,
            model_id,
        ));
        credit_balance_after = Some(account.balance);
        credit_id = Some(account.id);
        accounts.push(account);
    }

    let receipt = TransferReceipt {
        id: transfer_id,
        debit: debit_id.or(credit_id).ok_or_else(|| {
            StoreError::InvalidAmount("transfer has neither a debit nor a credit side".into())
        })?,
        credit: credit_id,
        amount,
        model_id,
        debit_balance_after,
        credit_balance_after,
        committed_at: now,
        idempotency_key: None,
    };

    Ok(TransferPlan {
        accounts,
        entries,
        receipt,
    })
}
