//! Balance handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Account id.
    pub user_id: String,
    /// Current credit balance.
    pub balance: i64,
}

/// Get the authenticated user's balance.
pub async fn get_balance(auth: AuthUser) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        user_id: auth.user_id.to_string(),
        balance: auth.account.balance,
    })
}

/// Top-up request.
#[derive(Debug, Deserialize)]
pub struct TopupRequest {
    /// Credits to add, strictly positive.
    pub amount: i64,
    /// Optional note recorded on the transaction.
    pub comment: Option<String>,
}

/// Add credits to the authenticated user's balance.
///
/// Records a deposit transaction atomically with the balance change.
pub async fn topup(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<TopupRequest>,
) -> Result<(StatusCode, Json<BalanceResponse>), ApiError> {
    if body.amount <= 0 {
        return Err(ApiError::InvalidArgument(
            "amount must be positive".into(),
        ));
    }

    // The store reports the balance it committed, so the response cannot
    // observe a concurrent deposit's value instead of this one's.
    let (transaction, balance) = state
        .store
        .credit_and_record(&auth.user_id, body.amount, body.comment)?;

    tracing::info!(
        user_id = %auth.user_id,
        amount = body.amount,
        transaction_id = %transaction.id,
        balance,
        "balance topped up"
    );

    Ok((
        StatusCode::CREATED,
        Json(BalanceResponse {
            user_id: auth.user_id.to_string(),
            balance,
        }),
    ))
}
