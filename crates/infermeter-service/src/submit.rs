//! Charged job submission.
//!
//! The single path through which every paid task enters the system: admit
//! against the balance, debit and record the charge, then publish. A failed
//! publish rolls the charge back so the ledger reads as if the request had
//! been rejected outright. A reply timeout does NOT roll back: the job was
//! published and may still run.

use std::sync::Arc;

use infermeter_core::{JobDescriptor, Reply, TaskRequest, TransactionId, UserId};

use crate::dispatch::{DispatchError, DispatchMode};
use crate::error::ApiError;
use crate::state::AppState;

/// Outcome of a successful submission.
#[derive(Debug)]
pub struct JobHandle {
    /// Correlation id of the dispatched job.
    pub task_id: infermeter_core::TaskId,

    /// Ledger entry for the charge.
    pub transaction_id: TransactionId,

    /// Credits debited for this job.
    pub credits_spent: i64,

    /// Worker reply, present only for wait-for-reply submissions.
    pub reply: Option<Reply>,
}

/// Debit the user for `request` and dispatch it to `queue`.
///
/// # Errors
///
/// `InsufficientBalance` when the account cannot afford the task's price,
/// `DispatchUnavailable` (after rolling the charge back) when the broker
/// rejects the publish, `Timeout` when a waited-for reply never arrives.
pub async fn submit(
    state: &Arc<AppState>,
    user_id: UserId,
    request: TaskRequest,
    queue: &str,
    mode: DispatchMode,
) -> Result<JobHandle, ApiError> {
    let task_type = request.task_type();
    let price = state.config.pricing.price(task_type);

    let (transaction, balance) = state
        .store
        .debit_and_record(&user_id, price, task_type.kind(), None)?;

    let descriptor = JobDescriptor::new(user_id, request);

    tracing::debug!(
        task_id = %descriptor.task_id,
        user_id = %user_id,
        task_type = %task_type,
        price,
        balance,
        "charge admitted, dispatching"
    );

    match state.dispatcher.dispatch(queue, &descriptor, mode).await {
        Ok(reply) => Ok(JobHandle {
            task_id: descriptor.task_id,
            transaction_id: transaction.id,
            credits_spent: price,
            reply,
        }),
        Err(DispatchError::Unavailable(reason)) => {
            // The job never reached the broker. Undo the charge so the
            // ledger shows no trace of the failed attempt.
            tracing::error!(
                task_id = %descriptor.task_id,
                reason,
                "dispatch failed, rolling back charge"
            );
            if let Err(e) = state.store.rollback_charge(&transaction) {
                // The user was charged for work that never ran. Surface
                // loudly for operator reconciliation.
                tracing::error!(
                    transaction_id = %transaction.id,
                    error = %e,
                    "charge rollback failed"
                );
            }
            Err(ApiError::DispatchUnavailable)
        }
        Err(DispatchError::Timeout) => {
            // Published but unanswered. The charge stands.
            tracing::warn!(
                task_id = %descriptor.task_id,
                "no worker reply within timeout"
            );
            Err(ApiError::Timeout)
        }
        Err(DispatchError::ReplyLost(reason)) => {
            // Published, but the reply channel died before an answer could
            // be observed. The job is in the queue, so the charge stands.
            tracing::warn!(
                task_id = %descriptor.task_id,
                reason,
                "reply channel failed after publish"
            );
            Err(ApiError::Timeout)
        }
        Err(DispatchError::Codec(reason)) => {
            tracing::error!(task_id = %descriptor.task_id, reason, "reply codec error");
            Err(ApiError::Internal(format!("undecodable worker reply: {reason}")))
        }
    }
}
