//! Inference submission handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use infermeter_core::{ReplyStatus, TaskRequest};

use crate::auth::AuthUser;
use crate::dispatch::DispatchMode;
use crate::error::ApiError;
use crate::state::AppState;
use crate::submit::submit;

/// Prediction request.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// Base64-encoded image bytes.
    pub image: String,
    /// Block until the worker replies instead of returning once queued.
    #[serde(default)]
    pub wait_for_result: bool,
}

/// Prediction response.
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    /// Correlation id of the dispatched job.
    pub task_id: String,
    /// Credits debited for this job.
    pub credits_spent: i64,
    /// Worker's output reference, present when the reply was waited for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_reference: Option<String>,
}

/// Submit an image prediction job.
///
/// Charges the prediction price, then publishes to the image queue. With
/// `wait_for_result` the call blocks until the worker replies or the reply
/// window elapses (504, charge stands).
pub async fn predict(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    // Reject undecodable payloads before any charge is taken.
    if BASE64.decode(body.image.as_bytes()).is_err() {
        return Err(ApiError::BadRequest("image is not valid base64".into()));
    }

    let mode = if body.wait_for_result {
        DispatchMode::WaitForReply {
            timeout: Duration::from_secs(state.config.reply_timeout_seconds),
        }
    } else {
        DispatchMode::FireAndForget
    };

    let handle = submit(
        &state,
        auth.user_id,
        TaskRequest::Prediction { image: body.image },
        &state.config.image_queue,
        mode,
    )
    .await?;

    let result_reference = match handle.reply {
        Some(reply) => match reply.status {
            ReplyStatus::Ok => reply.result_reference,
            ReplyStatus::Error => {
                let detail = reply.error.unwrap_or_else(|| "unknown".into());
                return Err(ApiError::Internal(format!(
                    "worker reported failure: {detail}"
                )));
            }
        },
        None => None,
    };

    Ok(Json(PredictResponse {
        task_id: handle.task_id.to_string(),
        credits_spent: handle.credits_spent,
        result_reference,
    }))
}

/// 3D-scan response: where the outputs will appear once the worker is done.
#[derive(Debug, Serialize)]
pub struct Scan3dResponse {
    /// Correlation id of the dispatched job.
    pub task_id: String,
    /// Credits debited for this job.
    pub credits_spent: i64,
    /// Expected brain-mask output location.
    pub brain_mask_url: String,
    /// Expected aneurysm-mask output location.
    pub aneurysm_mask_url: String,
    /// Stored location of the uploaded scan.
    pub original_scan_url: String,
}

/// Submit a 3D medical-scan analysis job.
///
/// Accepts one multipart `file` field holding a NIfTI scan (`.nii` or
/// `.nii.gz`), stores it, charges the scan price, and publishes
/// fire-and-forget. Output URLs are derived from the stored filename.
pub async fn predict_3d_scan(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<Scan3dResponse>, ApiError> {
    let mut scan: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .map(sanitize_filename)
                .ok_or_else(|| ApiError::BadRequest("file field has no filename".into()))?;
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
            scan = Some((filename, data.to_vec()));
        }
    }

    let Some((filename, data)) = scan else {
        return Err(ApiError::BadRequest("missing file field".into()));
    };

    if !filename.ends_with(".nii") && !filename.ends_with(".nii.gz") {
        return Err(ApiError::BadRequest(
            "scan must be a .nii or .nii.gz file".into(),
        ));
    }

    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("upload dir unavailable: {e}")))?;
    let stored_path = Path::new(&state.config.upload_dir).join(&filename);
    tokio::fs::write(&stored_path, &data)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to store scan: {e}")))?;

    tracing::debug!(
        user_id = %auth.user_id,
        filename,
        bytes = data.len(),
        "scan stored"
    );

    let handle = submit(
        &state,
        auth.user_id,
        TaskRequest::Scan3d {
            scan_file: filename.clone(),
        },
        &state.config.scan3d_queue,
        DispatchMode::FireAndForget,
    )
    .await?;

    let download = &state.config.download_dir;
    Ok(Json(Scan3dResponse {
        task_id: handle.task_id.to_string(),
        credits_spent: handle.credits_spent,
        brain_mask_url: format!("{download}/brain_mask_{filename}"),
        aneurysm_mask_url: format!("{download}/aneurysm_mask_{filename}"),
        original_scan_url: format!("{download}/{filename}"),
    }))
}

/// Strip any path components from a client-supplied filename.
fn sanitize_filename(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .replace("..", "_")
}
