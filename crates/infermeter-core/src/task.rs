//! Job descriptor and reply types for the message queue.
//!
//! A `JobDescriptor` is the JSON payload describing one unit of
//! asynchronous work. It is never persisted; the ledger transaction created
//! at submission time is the durable record.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{TaskId, TransactionKind, UserId};

/// Kind of inference work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Image prediction.
    Prediction,

    /// 3D medical-scan analysis.
    Scan3d,
}

impl TaskType {
    /// The ledger category a charge for this task is recorded under.
    #[must_use]
    pub const fn kind(self) -> TransactionKind {
        match self {
            Self::Prediction => TransactionKind::Prediction,
            Self::Scan3d => TransactionKind::Scan3d,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prediction => f.write_str("prediction"),
            Self::Scan3d => f.write_str("scan3d"),
        }
    }
}

/// Task-specific payload, tagged with `task_type` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum TaskRequest {
    /// Image prediction on a base64-encoded image.
    Prediction {
        /// Base64-encoded image bytes.
        image: String,
    },

    /// 3D scan analysis of a previously stored upload.
    Scan3d {
        /// Stored scan filename.
        scan_file: String,
    },
}

impl TaskRequest {
    /// The task type of this request.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        match self {
            Self::Prediction { .. } => TaskType::Prediction,
            Self::Scan3d { .. } => TaskType::Scan3d,
        }
    }
}

/// The message payload describing one unit of asynchronous work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Correlation identifier, generated by the submitter.
    pub task_id: TaskId,

    /// The submitting user.
    pub user_id: UserId,

    /// Task type and task-specific fields, flattened into the message body.
    #[serde(flatten)]
    pub request: TaskRequest,
}

impl JobDescriptor {
    /// Build a descriptor with a freshly generated task id.
    #[must_use]
    pub fn new(user_id: UserId, request: TaskRequest) -> Self {
        Self {
            task_id: TaskId::generate(),
            user_id,
            request,
        }
    }
}

/// Outcome of a processed job, published on the reply queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    /// The task this reply answers.
    pub task_id: TaskId,

    /// Processing outcome.
    pub status: ReplyStatus,

    /// Reference to the produced output, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_reference: Option<String>,

    /// Short error description when `status` is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    /// The job was processed and produced a result.
    Ok,

    /// The job failed; the message was still acknowledged.
    Error,
}
