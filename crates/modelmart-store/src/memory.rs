//! In-memory storage implementation.
//!
//! Used by tests and by service builds without the `rocksdb-backend` feature.
//! Ledger state sits behind one mutex so transfers are linearizable; the
//! usage log has its own lock so analytics reads never block predictions.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use modelmart_core::{
    Account, AccountId, EntryId, EventId, LedgerEntry, Model, ModelId, TransferId,
    TransferReceipt, TransferRequest, UsageEvent,
};

use crate::error::{Result, StoreError};
use crate::transfer::{check_amount, plan_grant, plan_reversal, plan_transfer, TransferPlan};
use crate::{
    keys, next_cursor, AccountDirectory, EventIndex, EventPage, EventQuery, LedgerStore,
    ModelRegistry, UsageEventStore,
};

/// Storage backend that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    ledger: Mutex<LedgerState>,
    models: RwLock<ModelState>,
    events: RwLock<EventState>,
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    api_keys: HashMap<String, AccountId>,
    entries: HashMap<EntryId, LedgerEntry>,
    entries_by_account: BTreeSet<(AccountId, EntryId)>,
    transfers_by_key: HashMap<Vec<u8>, TransferId>,
}

impl LedgerState {
    fn account(&self, account_id: &AccountId) -> Result<Account> {
        self.accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| StoreError::account_not_found(account_id))
    }

    fn commit(&mut self, accounts: Vec<Account>, entries: Vec<LedgerEntry>) {
        for account in accounts {
            self.accounts.insert(account.id, account);
        }
        for entry in entries {
            self.entries_by_account.insert((entry.account_id, entry.id));
            self.entries.insert(entry.id, entry);
        }
    }
}

#[derive(Default)]
struct ModelState {
    models: HashMap<ModelId, Model>,
    by_owner: BTreeSet<(AccountId, ModelId)>,
}

#[derive(Default)]
struct EventState {
    events: HashMap<EventId, UsageEvent>,
    by_owner: BTreeSet<Vec<u8>>,
    by_model: BTreeSet<Vec<u8>>,
    by_caller: BTreeSet<Vec<u8>>,
}

impl EventState {
    fn index(&self, index: &EventIndex) -> &BTreeSet<Vec<u8>> {
        match index {
            EventIndex::Owner(_) => &self.by_owner,
            EventIndex::Model(_) => &self.by_model,
            EventIndex::Caller(_) => &self.by_caller,
        }
    }
}

fn poisoned(name: &str) -> StoreError {
    StoreError::Database(format!("{name} lock poisoned"))
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> Result<MutexGuard<'_, LedgerState>> {
        self.ledger.lock().map_err(|_| poisoned("ledger"))
    }

    fn models_read(&self) -> Result<RwLockReadGuard<'_, ModelState>> {
        self.models.read().map_err(|_| poisoned("models"))
    }

    fn models_write(&self) -> Result<RwLockWriteGuard<'_, ModelState>> {
        self.models.write().map_err(|_| poisoned("models"))
    }

    fn events_read(&self) -> Result<RwLockReadGuard<'_, EventState>> {
        self.events.read().map_err(|_| poisoned("events"))
    }

    fn events_write(&self) -> Result<RwLockWriteGuard<'_, EventState>> {
        self.events.write().map_err(|_| poisoned("events"))
    }
}

impl AccountDirectory for MemoryStore {
    fn create_account(&self, account: &Account) -> Result<()> {
        let mut state = self.ledger()?;

        if state.accounts.contains_key(&account.id) {
            return Err(StoreError::AlreadyExists {
                entity: "account",
                id: account.id.to_string(),
            });
        }
        if state.api_keys.contains_key(&account.api_key_hash) {
            return Err(StoreError::AlreadyExists {
                entity: "api key",
                id: account.id.to_string(),
            });
        }

        state
            .api_keys
            .insert(account.api_key_hash.clone(), account.id);
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        Ok(self.ledger()?.accounts.get(account_id).cloned())
    }

    fn find_by_api_key_hash(&self, api_key_hash: &str) -> Result<Option<Account>> {
        let state = self.ledger()?;
        Ok(state
            .api_keys
            .get(api_key_hash)
            .and_then(|id| state.accounts.get(id))
            .cloned())
    }
}

impl ModelRegistry for MemoryStore {
    fn put_model(&self, model: &Model) -> Result<()> {
        let mut state = self.models_write()?;
        if let Some(previous) = state.models.insert(model.id, model.clone()) {
            state.by_owner.remove(&(previous.owner_id, previous.id));
        }
        state.by_owner.insert((model.owner_id, model.id));
        Ok(())
    }

    fn get_model(&self, model_id: &ModelId) -> Result<Option<Model>> {
        Ok(self.models_read()?.models.get(model_id).cloned())
    }

    fn list_models_by_owner(&self, owner_id: &AccountId) -> Result<Vec<Model>> {
        let state = self.models_read()?;
        Ok(state
            .by_owner
            .iter()
            .filter(|(owner, _)| owner == owner_id)
            .filter_map(|(_, model_id)| state.models.get(model_id).cloned())
            .collect())
    }

    fn count_models_by_owner(&self, owner_id: &AccountId) -> Result<usize> {
        let state = self.models_read()?;
        Ok(state
            .by_owner
            .iter()
            .filter(|(owner, _)| owner == owner_id)
            .count())
    }
}

impl LedgerStore for MemoryStore {
    fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        check_amount(request.amount)?;
        if request.amount == 0 {
            return Ok(TransferReceipt::empty(request));
        }

        let mut state = self.ledger()?;

        let idempotency = match &request.idempotency_key {
            Some(key) => {
                let store_key = keys::transfer_key(&request.debit, key);
                if state.transfers_by_key.contains_key(&store_key) {
                    return Err(StoreError::DuplicateTransfer { key: key.clone() });
                }
                Some(store_key)
            }
            None => None,
        };

        let debit = state.account(&request.debit)?;
        let credit = request
            .credit
            .map(|id| state.account(&id))
            .transpose()?;

        let TransferPlan {
            accounts,
            entries,
            receipt,
        } = plan_transfer(request, debit, credit)?;

        state.commit(accounts, entries);
        if let Some(store_key) = idempotency {
            state.transfers_by_key.insert(store_key, receipt.id);
        }

        Ok(receipt)
    }

    fn reverse(&self, receipt: &TransferReceipt) -> Result<TransferReceipt> {
        if receipt.is_noop() {
            return Ok(TransferReceipt {
                id: TransferId::generate(),
                committed_at: Utc::now(),
                ..receipt.clone()
            });
        }

        let mut state = self.ledger()?;
        let original_debit = state.account(&receipt.debit)?;
        let original_credit = receipt
            .credit
            .map(|id| state.account(&id))
            .transpose()?;

        let TransferPlan {
            accounts,
            entries,
            receipt: reversal,
        } = plan_reversal(receipt, original_debit, original_credit)?;

        state.commit(accounts, entries);
        if let Some(key) = &receipt.idempotency_key {
            let store_key = keys::transfer_key(&receipt.debit, key);
            if state.transfers_by_key.get(&store_key) == Some(&receipt.id) {
                state.transfers_by_key.remove(&store_key);
            }
        }
        Ok(reversal)
    }

    fn grant(&self, account_id: &AccountId, amount: i64) -> Result<i64> {
        let mut state = self.ledger()?;
        let account = state.account(account_id)?;

        let TransferPlan {
            accounts,
            entries,
            receipt,
        } = plan_grant(account, amount)?;

        state.commit(accounts, entries);
        receipt
            .credit_balance_after
            .ok_or_else(|| StoreError::Database("grant produced no balance".into()))
    }

    fn balance_of(&self, account_id: &AccountId) -> Result<i64> {
        Ok(self.ledger()?.account(account_id)?.balance)
    }

    fn entries_for_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let state = self.ledger()?;
        Ok(state
            .entries_by_account
            .iter()
            .rev()
            .filter(|(account, _)| account == account_id)
            .skip(offset)
            .take(limit)
            .filter_map(|(_, entry_id)| state.entries.get(entry_id).cloned())
            .collect())
    }
}

impl UsageEventStore for MemoryStore {
    fn append(&self, event: &UsageEvent) -> Result<()> {
        let mut state = self.events_write()?;

        if state.events.contains_key(&event.event_id) {
            return Err(StoreError::AlreadyExists {
                entity: "usage event",
                id: event.event_id.to_string(),
            });
        }

        let id = event.event_id;
        state
            .by_owner
            .insert(keys::event_index_key(event.owner_id.as_bytes(), &id));
        state
            .by_model
            .insert(keys::event_index_key(event.model_id.as_bytes(), &id));
        state
            .by_caller
            .insert(keys::event_index_key(event.caller_id.as_bytes(), &id));
        state.events.insert(id, event.clone());
        Ok(())
    }

    fn query_events(&self, index: &EventIndex, query: &EventQuery) -> Result<EventPage> {
        let Some((start, end)) = keys::event_scan_bounds(index, query) else {
            return Ok(EventPage::default());
        };

        let state = self.events_read()?;
        let events: Vec<UsageEvent> = state
            .index(index)
            .range(start..=end)
            .filter_map(|key| keys::extract_event_id(key))
            .filter_map(|id| state.events.get(&id))
            .filter(|event| query.range.contains(event.timestamp))
            .take(query.limit)
            .cloned()
            .collect();

        let next = next_cursor(&events, query.limit);
        Ok(EventPage { events, next })
    }
}
