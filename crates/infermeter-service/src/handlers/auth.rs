//! Registration and login handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use infermeter_core::{Account, UserId};

use crate::auth::create_access_token;
use crate::crypto::{hash_password, verify_password};
use crate::error::ApiError;
use crate::state::AppState;

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// New account's email, unique across the service.
    pub email: String,
    /// Plaintext password, hashed before storage.
    pub password: String,
}

/// Public view of an account.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account id.
    pub id: String,
    /// Account email.
    pub email: String,
    /// Current credit balance.
    pub balance: i64,
    /// Whether the account has admin privileges.
    pub is_admin: bool,
    /// Whether the account is active.
    pub is_active: bool,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            email: account.email.clone(),
            balance: account.balance,
            is_admin: account.is_admin,
            is_active: account.is_active,
        }
    }
}

/// Register a new account.
///
/// Accounts start with a zero balance and no admin rights.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let email = body.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::InvalidArgument("invalid email".into()));
    }
    if body.password.is_empty() {
        return Err(ApiError::InvalidArgument("password must not be empty".into()));
    }

    let password_hash = hash_password(&body.password)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?;
    let account = Account::new(UserId::generate(), email, &password_hash);

    state.store.create_account(&account)?;

    tracing::info!(user_id = %account.id, "account registered");

    Ok((StatusCode::CREATED, Json(AccountResponse::from(&account))))
}

/// Login form, OAuth2 password-grant field names.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    /// Account email.
    pub username: String,
    /// Plaintext password.
    pub password: String,
}

/// Token response.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Signed bearer token.
    pub access_token: String,
    /// Always `"bearer"`.
    pub token_type: String,
}

/// Exchange credentials for an access token.
///
/// Unknown emails and wrong passwords produce the same 401 so the
/// response does not reveal which accounts exist.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let account = state
        .store
        .find_account_by_email(form.username.trim())?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&form.password, &account.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    if !account.is_active {
        return Err(ApiError::Forbidden("Account inactive".into()));
    }

    let access_token = create_access_token(account.id, &state.config)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}
