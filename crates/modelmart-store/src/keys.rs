//! Key encoding shared by the storage backends.
//!
//! Secondary indexes use `id (16 bytes) || ulid (16 bytes)` keys. Because a
//! ULID starts with its millisecond timestamp, keys under one prefix sort in
//! time order.

use modelmart_core::{AccountId, EntryId, EventId, ModelId};

use crate::{EventIndex, EventQuery};

/// Create an account key from an account ID.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create an API key index key from a key hash.
#[must_use]
pub fn api_key_index_key(api_key_hash: &str) -> Vec<u8> {
    api_key_hash.as_bytes().to_vec()
}

/// Create a model key from a model ID.
#[must_use]
pub fn model_key(model_id: &ModelId) -> Vec<u8> {
    model_id.as_bytes().to_vec()
}

/// Create an owner-model index key: `owner_id || model_id`.
#[must_use]
pub fn owner_model_key(owner_id: &AccountId, model_id: &ModelId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(owner_id.as_bytes());
    key.extend_from_slice(model_id.as_bytes());
    key
}

/// Create a ledger entry key from an entry ID.
#[must_use]
pub fn entry_key(entry_id: &EntryId) -> Vec<u8> {
    entry_id.to_bytes().to_vec()
}

/// Create an account-entry index key: `account_id || entry_id`.
#[must_use]
pub fn account_entry_key(account_id: &AccountId, entry_id: &EntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&entry_id.to_bytes());
    key
}

/// Extract the entry ID from an account-entry index key.
#[must_use]
pub fn extract_entry_id(key: &[u8]) -> Option<EntryId> {
    trailing_ulid(key).map(EntryId::from_bytes)
}

/// Create an idempotency key: `debit_id || key`.
#[must_use]
pub fn transfer_key(debit: &AccountId, idempotency_key: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + idempotency_key.len());
    key.extend_from_slice(debit.as_bytes());
    key.extend_from_slice(idempotency_key.as_bytes());
    key
}

/// Create a usage event key from an event ID.
#[must_use]
pub fn event_key(event_id: &EventId) -> Vec<u8> {
    event_id.to_bytes().to_vec()
}

/// Create an event index key: `prefix || event_id`.
#[must_use]
pub fn event_index_key(prefix: &[u8; 16], event_id: &EventId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&event_id.to_bytes());
    key
}

/// Extract the event ID from an event index key.
#[must_use]
pub fn extract_event_id(key: &[u8]) -> Option<EventId> {
    trailing_ulid(key).map(EventId::from_bytes)
}

/// Inclusive `[start, end]` key bounds for an event index scan.
///
/// Returns `None` when the query cannot match anything (cursor already past
/// the end of the window).
#[must_use]
pub fn event_scan_bounds(index: &EventIndex, query: &EventQuery) -> Option<(Vec<u8>, Vec<u8>)> {
    let prefix = index.prefix();
    let mut first = EventId::lower_bound(query.range.start_ms());
    let last = EventId::upper_bound(query.range.end_ms());

    if let Some(after) = query.after {
        let next = u128::from_be_bytes(after.to_bytes()).checked_add(1)?;
        let next = EventId::from_bytes(next.to_be_bytes());
        if next > first {
            first = next;
        }
    }

    if first > last {
        return None;
    }

    Some((
        event_index_key(&prefix, &first),
        event_index_key(&prefix, &last),
    ))
}

fn trailing_ulid(key: &[u8]) -> Option<[u8; 16]> {
    key.get(16..32)?.try_into().ok()
}
