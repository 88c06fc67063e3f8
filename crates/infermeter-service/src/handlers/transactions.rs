//! Transaction history handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use infermeter_core::Transaction;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Default page size for transaction listings.
const DEFAULT_LIMIT: usize = 100;

/// Maximum page size for transaction listings.
const MAX_LIMIT: usize = 1000;

/// Pagination parameters.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
    /// Number of rows to skip.
    pub offset: Option<usize>,
}

impl Pagination {
    fn clamp(&self) -> (usize, usize) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        (limit, self.offset.unwrap_or(0))
    }
}

/// Public view of a ledger transaction.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction id (ULID).
    pub id: String,
    /// Owning account id.
    pub user_id: String,
    /// Transaction category.
    pub kind: String,
    /// Signed amount: positive deposits, negative charges.
    pub amount: i64,
    /// Optional note.
    pub comment: Option<String>,
    /// Creation time, RFC 3339.
    pub timestamp: String,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            user_id: tx.user_id.to_string(),
            kind: tx.kind.to_string(),
            amount: tx.amount,
            comment: tx.comment.clone(),
            timestamp: tx.created_at.to_rfc3339(),
        }
    }
}

/// List the authenticated user's transactions, newest first.
///
/// The listing is always scoped to the token's identity; there is no way
/// to request another user's history here.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    let (limit, offset) = pagination.clamp();

    let transactions = state
        .store
        .list_transactions_by_user(&auth.user_id, limit, offset)?;

    Ok(Json(
        transactions.iter().map(TransactionResponse::from).collect(),
    ))
}

/// List all users' transactions, newest first. Admin only.
pub async fn list_all_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    if !auth.account.is_admin {
        return Err(ApiError::Forbidden("Admin privileges required".into()));
    }

    let (limit, offset) = pagination.clamp();

    let transactions = state.store.list_all_transactions(limit, offset)?;

    Ok(Json(
        transactions.iter().map(TransactionResponse::from).collect(),
    ))
}
