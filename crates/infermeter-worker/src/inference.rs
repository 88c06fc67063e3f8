//! Mocked inference.
//!
//! Stands in for the model runtime: validates the task payload and derives
//! deterministic output references. Swapping in a real model only changes
//! this module.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

use infermeter_core::{JobDescriptor, Reply, ReplyStatus, TaskRequest};

/// Inference failure, reported in the reply and the dead-letter queue.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The payload failed validation.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Run the mocked model against a job descriptor.
///
/// # Errors
///
/// Returns [`InferenceError::InvalidPayload`] when required fields are
/// missing or undecodable.
pub fn run(descriptor: &JobDescriptor) -> Result<Reply, InferenceError> {
    let result_reference = match &descriptor.request {
        TaskRequest::Prediction { image } => {
            if image.is_empty() {
                return Err(InferenceError::InvalidPayload("empty image".into()));
            }
            let bytes = BASE64
                .decode(image.as_bytes())
                .map_err(|e| InferenceError::InvalidPayload(format!("bad base64: {e}")))?;
            tracing::debug!(
                task_id = %descriptor.task_id,
                input_bytes = bytes.len(),
                "running mock prediction"
            );
            format!("masks/mask_{}.png", descriptor.task_id)
        }
        TaskRequest::Scan3d { scan_file } => {
            if scan_file.is_empty() {
                return Err(InferenceError::InvalidPayload("empty scan filename".into()));
            }
            tracing::debug!(
                task_id = %descriptor.task_id,
                scan_file,
                "running mock 3D segmentation"
            );
            // The aneurysm mask follows the same naming scheme and is
            // written alongside; the reply carries the primary output.
            format!("brain_mask_{scan_file}")
        }
    };

    Ok(Reply {
        task_id: descriptor.task_id,
        status: ReplyStatus::Ok,
        result_reference: Some(result_reference),
        error: None,
    })
}

/// Build the error reply for a failed job.
#[must_use]
pub fn failure_reply(descriptor: &JobDescriptor, error: &InferenceError) -> Reply {
    Reply {
        task_id: descriptor.task_id,
        status: ReplyStatus::Error,
        result_reference: None,
        error: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infermeter_core::UserId;

    #[test]
    fn prediction_produces_mask_reference() {
        let descriptor = JobDescriptor::new(
            UserId::generate(),
            TaskRequest::Prediction {
                image: "aGVsbG8=".into(),
            },
        );

        let reply = run(&descriptor).unwrap();
        assert_eq!(reply.task_id, descriptor.task_id);
        assert_eq!(reply.status, ReplyStatus::Ok);
        let reference = reply.result_reference.unwrap();
        assert!(reference.starts_with("masks/mask_"));
        assert!(reference.ends_with(".png"));
    }

    #[test]
    fn scan3d_derives_mask_from_filename() {
        let descriptor = JobDescriptor::new(
            UserId::generate(),
            TaskRequest::Scan3d {
                scan_file: "patient_7.nii.gz".into(),
            },
        );

        let reply = run(&descriptor).unwrap();
        assert_eq!(
            reply.result_reference.as_deref(),
            Some("brain_mask_patient_7.nii.gz")
        );
    }

    #[test]
    fn undecodable_image_is_an_invalid_payload() {
        let descriptor = JobDescriptor::new(
            UserId::generate(),
            TaskRequest::Prediction {
                image: "!!!".into(),
            },
        );

        let err = run(&descriptor).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidPayload(_)));
    }

    #[test]
    fn failure_reply_carries_the_error() {
        let descriptor = JobDescriptor::new(
            UserId::generate(),
            TaskRequest::Prediction { image: String::new() },
        );
        let err = run(&descriptor).unwrap_err();

        let reply = failure_reply(&descriptor, &err);
        assert_eq!(reply.status, ReplyStatus::Error);
        assert!(reply.error.unwrap().contains("empty image"));
    }
}
