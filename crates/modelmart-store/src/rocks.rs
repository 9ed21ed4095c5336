//! `RocksDB` storage implementation.
//!
//! Every logical write (a transfer with its journal entries, an event with
//! its three index rows) is one `WriteBatch`. Read-check-write sequences on
//! balances are serialized by `ledger_lock`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use chrono::Utc;

use modelmart_core::{
    Account, AccountId, EntryId, LedgerEntry, Model, ModelId, TransferId, TransferReceipt,
    TransferRequest, UsageEvent,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::transfer::{check_amount, plan_grant, plan_reversal, plan_transfer, TransferPlan};
use crate::{
    next_cursor, AccountDirectory, EventIndex, EventPage, EventQuery, LedgerStore, ModelRegistry,
    UsageEventStore,
};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    ledger_lock: Mutex<()>,
}

fn db_err(e: rocksdb::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// What a committed plan does to the idempotency index.
enum KeyWrite<'a> {
    None,
    Record(&'a [u8]),
    Release(&'a [u8]),
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)
            .map_err(db_err)?;

        tracing::info!(path = %path.as_ref().display(), "opened rocksdb store");

        Ok(Self {
            db: Arc::new(db),
            ledger_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock_ledger(&self) -> Result<MutexGuard<'_, ()>> {
        self.ledger_lock
            .lock()
            .map_err(|_| StoreError::Database("ledger lock poisoned".into()))
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        Ok(self.db.get_pinned_cf(&cf, key).map_err(db_err)?.is_some())
    }

    fn load_account(&self, account_id: &AccountId) -> Result<Account> {
        self.get_account(account_id)?
            .ok_or_else(|| StoreError::account_not_found(account_id))
    }

    /// Collect index keys under `prefix`, in key order.
    fn prefixed_keys(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let mut found = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, _) = item.map_err(db_err)?;
            if !key.starts_with(prefix) {
                break;
            }
            found.push(key.to_vec());
        }
        Ok(found)
    }

    /// The idempotency marker `receipt` was recorded under, if it still
    /// points at `receipt`.
    fn recorded_key(&self, receipt: &TransferReceipt) -> Result<Option<Vec<u8>>> {
        let Some(key) = &receipt.idempotency_key else {
            return Ok(None);
        };
        let store_key = keys::transfer_key(&receipt.debit, key);
        let cf = self.cf(cf::TRANSFERS_BY_KEY)?;
        let owned = self
            .db
            .get_pinned_cf(&cf, &store_key)
            .map_err(db_err)?
            .is_some_and(|id| *id == receipt.id.to_bytes());
        Ok(owned.then_some(store_key))
    }

    /// Write a transfer plan together with its idempotency marker change.
    fn commit(&self, plan: &TransferPlan, idempotency: KeyWrite<'_>) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_entries = self.cf(cf::LEDGER_ENTRIES)?;
        let cf_by_account = self.cf(cf::LEDGER_ENTRIES_BY_ACCOUNT)?;

        let mut batch = WriteBatch::default();
        for account in &plan.accounts {
            batch.put_cf(
                &cf_accounts,
                keys::account_key(&account.id),
                Self::serialize(account)?,
            );
        }
        for entry in &plan.entries {
            batch.put_cf(&cf_entries, keys::entry_key(&entry.id), Self::serialize(entry)?);
            batch.put_cf(
                &cf_by_account,
                keys::account_entry_key(&entry.account_id, &entry.id),
                [],
            );
        }
        match idempotency {
            KeyWrite::None => {}
            KeyWrite::Record(key) => {
                let cf_keys = self.cf(cf::TRANSFERS_BY_KEY)?;
                batch.put_cf(&cf_keys, key, plan.receipt.id.to_bytes());
            }
            KeyWrite::Release(key) => {
                let cf_keys = self.cf(cf::TRANSFERS_BY_KEY)?;
                batch.delete_cf(&cf_keys, key);
            }
        }

        self.db.write(batch).map_err(db_err)?;

        tracing::debug!(
            transfer_id = %plan.receipt.id,
            amount = plan.receipt.amount,
            entries = plan.entries.len(),
            "transfer committed"
        );
        Ok(())
    }
}

impl AccountDirectory for RocksStore {
    fn create_account(&self, account: &Account) -> Result<()> {
        let _guard = self.lock_ledger()?;

        let account_key = keys::account_key(&account.id);
        let api_key = keys::api_key_index_key(&account.api_key_hash);

        if self.exists(cf::ACCOUNTS, &account_key)? {
            return Err(StoreError::AlreadyExists {
                entity: "account",
                id: account.id.to_string(),
            });
        }
        if self.exists(cf::ACCOUNTS_BY_API_KEY, &api_key)? {
            return Err(StoreError::AlreadyExists {
                entity: "api key",
                id: account.id.to_string(),
            });
        }

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_by_key = self.cf(cf::ACCOUNTS_BY_API_KEY)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, &account_key, Self::serialize(account)?);
        batch.put_cf(&cf_by_key, &api_key, account.id.as_bytes());

        self.db.write(batch).map_err(db_err)
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        self.get(cf::ACCOUNTS, &keys::account_key(account_id))
    }

    fn find_by_api_key_hash(&self, api_key_hash: &str) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS_BY_API_KEY)?;
        let Some(raw) = self
            .db
            .get_cf(&cf, keys::api_key_index_key(api_key_hash))
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let bytes: [u8; 16] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Serialization("malformed api key index entry".into()))?;
        self.get_account(&AccountId::from_bytes(bytes))
    }
}

impl ModelRegistry for RocksStore {
    fn put_model(&self, model: &Model) -> Result<()> {
        let cf_models = self.cf(cf::MODELS)?;
        let cf_by_owner = self.cf(cf::MODELS_BY_OWNER)?;
        let key = keys::model_key(&model.id);

        let mut batch = WriteBatch::default();
        if let Some(previous) = self.get::<Model>(cf::MODELS, &key)? {
            if previous.owner_id != model.owner_id {
                batch.delete_cf(
                    &cf_by_owner,
                    keys::owner_model_key(&previous.owner_id, &previous.id),
                );
            }
        }
        batch.put_cf(&cf_models, &key, Self::serialize(model)?);
        batch.put_cf(
            &cf_by_owner,
            keys::owner_model_key(&model.owner_id, &model.id),
            [],
        );

        self.db.write(batch).map_err(db_err)
    }

    fn get_model(&self, model_id: &ModelId) -> Result<Option<Model>> {
        self.get(cf::MODELS, &keys::model_key(model_id))
    }

    fn list_models_by_owner(&self, owner_id: &AccountId) -> Result<Vec<Model>> {
        let mut models = Vec::new();
        for key in self.prefixed_keys(cf::MODELS_BY_OWNER, owner_id.as_bytes())? {
            let Some(model_key) = key.get(16..) else {
                continue;
            };
            if let Some(model) = self.get(cf::MODELS, model_key)? {
                models.push(model);
            }
        }
        Ok(models)
    }

    fn count_models_by_owner(&self, owner_id: &AccountId) -> Result<usize> {
        Ok(self
            .prefixed_keys(cf::MODELS_BY_OWNER, owner_id.as_bytes())?
            .len())
    }
}

impl LedgerStore for RocksStore {
    fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        check_amount(request.amount)?;
        if request.amount == 0 {
            return Ok(TransferReceipt::empty(request));
        }

        let _guard = self.lock_ledger()?;

        let idempotency = match &request.idempotency_key {
            Some(key) => {
                let store_key = keys::transfer_key(&request.debit, key);
                if self.exists(cf::TRANSFERS_BY_KEY, &store_key)? {
                    return Err(StoreError::DuplicateTransfer { key: key.clone() });
                }
                Some(store_key)
            }
            None => None,
        };

        let debit = self.load_account(&request.debit)?;
        let credit = request
            .credit
            .map(|id| self.load_account(&id))
            .transpose()?;

        let plan = plan_transfer(request, debit, credit)?;
        let write = idempotency.as_deref().map_or(KeyWrite::None, KeyWrite::Record);
        self.commit(&plan, write)?;
        Ok(plan.receipt)
    }

    fn reverse(&self, receipt: &TransferReceipt) -> Result<TransferReceipt> {
        if receipt.is_noop() {
            return Ok(TransferReceipt {
                id: TransferId::generate(),
                committed_at: Utc::now(),
                ..receipt.clone()
            });
        }

        let _guard = self.lock_ledger()?;

        let original_debit = self.load_account(&receipt.debit)?;
        let original_credit = receipt
            .credit
            .map(|id| self.load_account(&id))
            .transpose()?;

        let release = self.recorded_key(receipt)?;

        let plan = plan_reversal(receipt, original_debit, original_credit)?;
        let write = release.as_deref().map_or(KeyWrite::None, KeyWrite::Release);
        self.commit(&plan, write)?;
        Ok(plan.receipt)
    }

    fn grant(&self, account_id: &AccountId, amount: i64) -> Result<i64> {
        let _guard = self.lock_ledger()?;

        let account = self.load_account(account_id)?;
        let plan = plan_grant(account, amount)?;
        self.commit(&plan, KeyWrite::None)?;

        plan.receipt
            .credit_balance_after
            .ok_or_else(|| StoreError::Database("grant produced no balance".into()))
    }

    fn balance_of(&self, account_id: &AccountId) -> Result<i64> {
        Ok(self.load_account(account_id)?.balance)
    }

    fn entries_for_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let cf_by_account = self.cf(cf::LEDGER_ENTRIES_BY_ACCOUNT)?;
        let prefix = account_id.as_bytes();
        let upper = keys::account_entry_key(account_id, &EntryId::from_bytes([0xff; 16]));

        let mut entries = Vec::new();
        let mut skipped = 0;

        // Entry IDs are ULIDs, so a reverse scan yields newest first.
        for item in self
            .db
            .iterator_cf(&cf_by_account, IteratorMode::From(&upper, Direction::Reverse))
        {
            let (key, _) = item.map_err(db_err)?;
            if !key.starts_with(prefix) || entries.len() >= limit {
                break;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }

            let Some(entry_id) = keys::extract_entry_id(&key) else {
                continue;
            };
            if let Some(entry) = self.get(cf::LEDGER_ENTRIES, &keys::entry_key(&entry_id))? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }
}

impl UsageEventStore for RocksStore {
    fn append(&self, event: &UsageEvent) -> Result<()> {
        let event_key = keys::event_key(&event.event_id);
        if self.exists(cf::USAGE_EVENTS, &event_key)? {
            return Err(StoreError::AlreadyExists {
                entity: "usage event",
                id: event.event_id.to_string(),
            });
        }

        let cf_events = self.cf(cf::USAGE_EVENTS)?;
        let cf_by_owner = self.cf(cf::USAGE_EVENTS_BY_OWNER)?;
        let cf_by_model = self.cf(cf::USAGE_EVENTS_BY_MODEL)?;
        let cf_by_caller = self.cf(cf::USAGE_EVENTS_BY_CALLER)?;
        let id = &event.event_id;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_events, &event_key, Self::serialize(event)?);
        batch.put_cf(
            &cf_by_owner,
            keys::event_index_key(event.owner_id.as_bytes(), id),
            [],
        );
        batch.put_cf(
            &cf_by_model,
            keys::event_index_key(event.model_id.as_bytes(), id),
            [],
        );
        batch.put_cf(
            &cf_by_caller,
            keys::event_index_key(event.caller_id.as_bytes(), id),
            [],
        );

        self.db.write(batch).map_err(db_err)
    }

    fn query_events(&self, index: &EventIndex, query: &EventQuery) -> Result<EventPage> {
        let Some((start, end)) = keys::event_scan_bounds(index, query) else {
            return Ok(EventPage::default());
        };

        let cf_index = self.cf(match index {
            EventIndex::Owner(_) => cf::USAGE_EVENTS_BY_OWNER,
            EventIndex::Model(_) => cf::USAGE_EVENTS_BY_MODEL,
            EventIndex::Caller(_) => cf::USAGE_EVENTS_BY_CALLER,
        })?;

        let mut events = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf_index, IteratorMode::From(&start, Direction::Forward))
        {
            if events.len() >= query.limit {
                break;
            }
            let (key, _) = item.map_err(db_err)?;
            if &*key > end.as_slice() {
                break;
            }

            let Some(event_id) = keys::extract_event_id(&key) else {
                continue;
            };
            let event: Option<UsageEvent> =
                self.get(cf::USAGE_EVENTS, &keys::event_key(&event_id))?;
            if let Some(event) = event.filter(|e| query.range.contains(e.timestamp)) {
                events.push(event);
            }
        }

        let next = next_cursor(&events, query.limit);
        Ok(EventPage { events, next })
    }
}
