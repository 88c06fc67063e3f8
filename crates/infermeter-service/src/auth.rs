//! Authentication: JWT issuance and the authenticated-user extractor.
//!
//! Tokens are signed with a server-held secret (HS256 by default, algorithm
//! configurable) and carry the account id in `sub`. The extractor rejects
//! missing/invalid/expired tokens with 401 and inactive accounts with 403.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use infermeter_core::{Account, UserId};

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account id).
    pub sub: String,
    /// Expiration time (unix seconds).
    pub exp: i64,
    /// Issued at (unix seconds).
    pub iat: i64,
}

/// Create a signed access token for an account.
///
/// # Errors
///
/// Returns `ApiError::Internal` if signing fails (misconfigured algorithm
/// or key material).
pub fn create_access_token(user_id: UserId, config: &ServiceConfig) -> Result<String, ApiError> {
    let now = Utc::now();
    let expires_at = now + Duration::minutes(config.access_token_expire_minutes);

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::new(config.jwt_algorithm),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
}

/// Validate a token and return its claims.
///
/// # Errors
///
/// Returns `ApiError::Unauthorized` for invalid signatures, wrong
/// algorithms, or expired tokens.
pub fn validate_token(token: &str, config: &ServiceConfig) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })?;

    Ok(token_data.claims)
}

/// An authenticated, active user extracted from a bearer JWT.
///
/// Carries the loaded account so handlers do not re-fetch it.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The account id from the token's `sub` claim.
    pub user_id: UserId,
    /// The materialized account record, known active.
    pub account: Account,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            // Extract the Authorization header
            let auth_header = parts
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .ok_or(ApiError::Unauthorized)?;

            // Extract the Bearer token
            let token = auth_header
                .strip_prefix("Bearer ")
                .ok_or(ApiError::Unauthorized)?;

            let claims = validate_token(token, &state.config)?;

            let user_id = claims
                .sub
                .parse::<UserId>()
                .map_err(|_| ApiError::Unauthorized)?;

            // A valid token referencing no account reads as bad credentials.
            let account = state
                .store
                .get_account(&user_id)?
                .ok_or(ApiError::Unauthorized)?;

            // Inactive accounts are rejected at authentication time.
            if !account.is_active {
                return Err(ApiError::Forbidden("Account inactive".into()));
            }

            Ok(AuthUser { user_id, account })
        })
    }
}
