//! Credit balance and ledger handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use modelmart_core::LedgerEntry;

use crate::auth::ApiKeyAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    /// Account ID.
    pub account_id: String,
    /// Current balance in credits.
    pub balance: i64,
}

/// Get the caller's current balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: ApiKeyAuth,
) -> Result<Json<BalanceResponse>, ApiError> {
    let ledger = Arc::clone(&state.ledger);
    let account_id = auth.account.id;
    let balance = state
        .run_store("balance_of", move || ledger.balance_of(&account_id))
        .await?;

    Ok(Json(BalanceResponse {
        account_id: account_id.to_string(),
        balance,
    }))
}

/// Ledger list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    /// Maximum number of entries to return (default: 50, max: 500).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

const MAX_LIMIT: usize = 500;

/// One ledger entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    /// Entry ID.
    pub id: String,
    /// Transfer the entry belongs to.
    pub transfer_id: String,
    /// Signed amount (positive = credit, negative = debit).
    pub amount: i64,
    /// Entry kind.
    pub kind: String,
    /// Balance after this entry.
    pub balance_after: i64,
    /// Model involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Timestamp.
    pub created_at: String,
}

impl From<&LedgerEntry> for EntryResponse {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            transfer_id: entry.transfer_id.to_string(),
            amount: entry.amount,
            kind: entry.kind.as_str().to_string(),
            balance_after: entry.balance_after,
            model_id: entry.model_id.map(|id| id.to_string()),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Ledger list response.
#[derive(Debug, Serialize)]
pub struct ListEntriesResponse {
    /// Entries, newest first.
    pub entries: Vec<EntryResponse>,
}

/// List the caller's ledger entries, newest first.
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    auth: ApiKeyAuth,
    Query(query): Query<ListEntriesQuery>,
) -> Result<Json<ListEntriesResponse>, ApiError> {
    let ledger = Arc::clone(&state.ledger);
    let account_id = auth.account.id;
    let limit = query.limit.min(MAX_LIMIT);
    let offset = query.offset;

    let entries = state
        .run_store("entries_for_account", move || {
            ledger.entries_for_account(&account_id, limit, offset)
        })
        .await?;

    Ok(Json(ListEntriesResponse {
        entries: entries.iter().map(EntryResponse::from).collect(),
    }))
}
