//! Admin seeding handlers.
//!
//! Accounts and models are normally created by the signup and upload
//! flows. These endpoints cover the same ground for operators and tests.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use modelmart_core::{Account, AccountId, FieldSpec, Model, ModelId, PricingMode};
use modelmart_store::StoreError;

use crate::auth::AdminAuth;
use crate::crypto::{generate_api_key, hash_api_key};
use crate::error::ApiError;
use crate::state::AppState;

/// Create account request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    /// Display name.
    pub name: String,
    /// Credits granted at creation.
    #[serde(default)]
    pub initial_credits: i64,
}

/// Create account response. The API key is only ever returned here.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountResponse {
    /// New account ID.
    pub account_id: String,
    /// Display name.
    pub name: String,
    /// Plaintext API key.
    pub api_key: String,
    /// Balance after the initial grant.
    pub balance: i64,
}

/// Create an account with a fresh API key.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<CreateAccountResponse>), ApiError> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    if body.initial_credits < 0 {
        return Err(ApiError::BadRequest("initialCredits must not be negative".into()));
    }

    let api_key = generate_api_key();
    let api_key_hash = hash_api_key(&state.config.api_key_pepper, &api_key)
        .map_err(|e| ApiError::Internal(format!("api key hashing failed: {e}")))?;

    let account = Account::new(AccountId::generate(), name, api_key_hash);
    let account_id = account.id;
    let initial_credits = body.initial_credits;

    let accounts = Arc::clone(&state.accounts);
    let ledger = Arc::clone(&state.ledger);
    let created = account.clone();
    let balance = state
        .run_store("create_account", move || {
            accounts.create_account(&created)?;
            if initial_credits > 0 {
                ledger.grant(&created.id, initial_credits)
            } else {
                Ok(0)
            }
        })
        .await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        account_id = %account_id,
        initial_credits,
        "Account created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateAccountResponse {
            account_id: account_id.to_string(),
            name: account.name,
            api_key,
            balance,
        }),
    ))
}

/// Create model request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelRequest {
    /// Owning account.
    pub owner_id: AccountId,
    /// Display name.
    pub name: String,
    /// Framework tag (e.g. `sklearn`).
    #[serde(default)]
    pub framework: Option<String>,
    /// Declared input fields.
    #[serde(default)]
    pub input_schema: Vec<FieldSpec>,
    /// Output type tag.
    #[serde(default)]
    pub output_type: Option<String>,
    /// Pricing mode (default: free).
    #[serde(default)]
    pub pricing_mode: Option<PricingMode>,
    /// Price per call for paid models.
    #[serde(default)]
    pub credits_per_call: i64,
}

/// Model response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponse {
    /// Model ID.
    pub model_id: String,
    /// Owning account.
    pub owner_id: String,
    /// Display name.
    pub name: String,
    /// Framework tag.
    pub framework: String,
    /// Output type tag.
    pub output_type: String,
    /// Pricing mode.
    pub pricing_mode: &'static str,
    /// Price per call.
    pub credits_per_call: i64,
    /// Declared input fields.
    pub input_schema: Vec<FieldSpec>,
}

impl From<&Model> for ModelResponse {
    fn from(model: &Model) -> Self {
        Self {
            model_id: model.id.to_string(),
            owner_id: model.owner_id.to_string(),
            name: model.name.clone(),
            framework: model.framework.clone(),
            output_type: model.output_type.clone(),
            pricing_mode: model.pricing_mode.as_str(),
            credits_per_call: model.credits_per_call,
            input_schema: model.input_schema.clone(),
        }
    }
}

/// Register a model for an existing owner.
pub async fn create_model(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<CreateModelRequest>,
) -> Result<(StatusCode, Json<ModelResponse>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    if body.credits_per_call < 0 {
        return Err(ApiError::BadRequest("creditsPerCall must not be negative".into()));
    }

    let mut model = Model::new(ModelId::generate(), body.owner_id, body.name.trim())
        .with_schema(body.input_schema);
    if let Some(framework) = body.framework {
        model = model.with_framework(framework);
    }
    if let Some(output_type) = body.output_type {
        model.output_type = output_type;
    }
    if body.pricing_mode == Some(PricingMode::Paid) {
        model = model.paid(body.credits_per_call);
    }

    let accounts = Arc::clone(&state.accounts);
    let models = Arc::clone(&state.models);
    let stored = model.clone();
    state
        .run_store("create_model", move || {
            if accounts.get_account(&stored.owner_id)?.is_none() {
                return Err(StoreError::NotFound {
                    entity: "account",
                    id: stored.owner_id.to_string(),
                });
            }
            models.put_model(&stored)
        })
        .await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        model_id = %model.id,
        owner_id = %model.owner_id,
        pricing_mode = model.pricing_mode.as_str(),
        credits_per_call = model.charge_per_call(),
        "Model registered"
    );

    Ok((StatusCode::CREATED, Json(ModelResponse::from(&model))))
}

/// Grant credits request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    /// Account to credit.
    pub account_id: AccountId,
    /// Credits to add (must be positive).
    pub amount: i64,
}

/// Grant response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResponse {
    /// Account credited.
    pub account_id: String,
    /// Balance after the grant.
    pub balance: i64,
}

/// Add credits to an account.
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<GrantRequest>,
) -> Result<Json<GrantResponse>, ApiError> {
    if body.amount <= 0 {
        return Err(ApiError::BadRequest("amount must be positive".into()));
    }

    let ledger = Arc::clone(&state.ledger);
    let account_id = body.account_id;
    let amount = body.amount;
    let balance = state
        .run_store("grant", move || ledger.grant(&account_id, amount))
        .await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        account_id = %account_id,
        amount,
        balance,
        "Credits granted"
    );

    Ok(Json(GrantResponse {
        account_id: account_id.to_string(),
        balance,
    }))
}
