//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `ApiKeyAuth` - Prediction callers via API key header
//! - `AuthUser` - Dashboard sessions via HS256 JWT
//! - `AdminAuth` - Admin seeding endpoints

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use modelmart_core::{Account, AccountId};

use crate::crypto::{constant_time_eq, hash_api_key};
use crate::error::ApiError;
use crate::state::AppState;

/// A caller authenticated by API key.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    /// The caller's account as loaded at authentication time.
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ApiKeyAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get(state.config.api_key_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ApiError::MissingApiKey)?;

        let hash = hash_api_key(&state.config.api_key_pepper, api_key)
            .map_err(|e| ApiError::Internal(format!("api key hashing failed: {e}")))?;

        let accounts = Arc::clone(&state.accounts);
        let account = state
            .run_store("find_by_api_key", move || accounts.find_by_api_key_hash(&hash))
            .await?
            .ok_or(ApiError::InvalidApiKey)?;

        Ok(ApiKeyAuth { account })
    }
}

/// An authenticated dashboard user extracted from a session JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The account ID.
    pub account_id: AccountId,
    /// The raw subject claim from the JWT.
    pub subject: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        // `test-token:<account-id>` sessions, compiled in only for tests.
        #[cfg(any(test, feature = "test-auth"))]
        if let Some(id) = token.strip_prefix("test-token:") {
            let account_id = id.parse::<AccountId>().map_err(|_| ApiError::Unauthorized)?;

            return Ok(AuthUser {
                account_id,
                subject: id.to_string(),
            });
        }

        let secret = state
            .config
            .session_secret
            .as_deref()
            .ok_or(ApiError::Unauthorized)?;
        let claims = validate_session(token, secret)?;

        let account_id = claims
            .sub
            .parse::<AccountId>()
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthUser {
            account_id,
            subject: claims.sub,
        })
    }
}

/// Admin authentication via the `X-Admin-Key` header.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Admin routes are disabled entirely without a configured key.
        let Some(expected) = state.config.admin_api_key.as_deref() else {
            return Err(ApiError::Unauthorized);
        };

        let presented = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        if !constant_time_eq(presented, expected) {
            tracing::warn!("Admin key rejected");
            return Err(ApiError::Unauthorized);
        }

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        tracing::debug!(admin_id = %admin_id, "Admin request authorized");

        Ok(AdminAuth { admin_id })
    }
}

/// Session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (account ID).
    pub sub: String,
    /// Expiration time.
    pub exp: i64,
    /// Issued at.
    #[serde(default)]
    pub iat: i64,
}

/// Validate an HS256 session token.
fn validate_session(token: &str, secret: &str) -> Result<SessionClaims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);

    decode::<SessionClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Session token validation failed");
            ApiError::Unauthorized
        })
}

/// Issue an HS256 session token for `account_id`, valid for `ttl`.
///
/// Token issuance belongs to the dashboard login flow; this helper exists for
/// tooling and tests that need a valid session.
///
/// # Errors
///
/// Returns `ApiError::Internal` if encoding fails.
pub fn issue_session_token(
    account_id: &AccountId,
    secret: &str,
    ttl: chrono::Duration,
) -> Result<String, ApiError> {
    let now = chrono::Utc::now();
    let claims = SessionClaims {
        sub: account_id.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("session token encoding failed: {e}")))
}
