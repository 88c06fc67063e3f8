//! Inference submission integration tests.
//!
//! These exercise the charge/dispatch contract: exactly one debit per
//! accepted submission, no ledger trace for rejected ones, and a full
//! rollback when the broker is down.

mod common;

use common::TestHarness;
use infermeter_core::{Reply, ReplyStatus, TaskId};
use infermeter_store::Store;
use serde_json::json;

const B64_IMAGE: &str = "aW1hZ2UgYnl0ZXM=";

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn predict_charges_and_dispatches() {
    let harness = TestHarness::new();
    let (user_id, auth) = harness.register_and_login("alice@example.com").await;
    harness.topup(&auth, 100).await;

    let response = harness
        .server
        .post("/predict")
        .add_header("authorization", auth)
        .json(&json!({ "image": B64_IMAGE }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits_spent"], 50);
    assert!(body["task_id"].as_str().is_some());

    // Exactly one debit.
    let account = harness.store.get_account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 50);

    // Exactly one job published, to the image queue, for this user.
    let published = harness.dispatcher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, harness.config.image_queue);
    assert_eq!(published[0].1.user_id, user_id);
}

#[tokio::test]
async fn predict_wait_for_result_returns_reference() {
    let harness = TestHarness::new();
    let (_, auth) = harness.register_and_login("bob@example.com").await;
    harness.topup(&auth, 50).await;

    harness.dispatcher.set_reply(Reply {
        task_id: TaskId::generate(),
        status: ReplyStatus::Ok,
        result_reference: Some("masks/result_42.png".into()),
        error: None,
    });

    let response = harness
        .server
        .post("/predict")
        .add_header("authorization", auth)
        .json(&json!({ "image": B64_IMAGE, "wait_for_result": true }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["result_reference"], "masks/result_42.png");
    assert_eq!(body["credits_spent"], 50);
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn insufficient_balance_rejected_without_ledger_trace() {
    let harness = TestHarness::new();
    let (user_id, auth) = harness.register_and_login("carol@example.com").await;
    harness.topup(&auth, 49).await;

    let response = harness
        .server
        .post("/predict")
        .add_header("authorization", auth)
        .json(&json!({ "image": B64_IMAGE }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_balance");
    assert_eq!(body["error"]["details"]["balance"], 49);
    assert_eq!(body["error"]["details"]["required"], 50);

    // No charge, no transaction, nothing published.
    let account = harness.store.get_account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 49);
    let txs = harness
        .store
        .list_transactions_by_user(&user_id, 100, 0)
        .unwrap();
    assert_eq!(txs.len(), 1); // just the deposit
    assert!(harness.dispatcher.published().is_empty());
}

#[tokio::test]
async fn balance_covering_exactly_one_job_admits_exactly_one() {
    let harness = TestHarness::new();
    let (user_id, auth) = harness.register_and_login("dave@example.com").await;
    harness.topup(&auth, 50).await;

    harness
        .server
        .post("/predict")
        .add_header("authorization", auth.clone())
        .json(&json!({ "image": B64_IMAGE }))
        .await
        .assert_status_ok();

    // Balance is now 0; the second submission must be rejected.
    harness
        .server
        .post("/predict")
        .add_header("authorization", auth)
        .json(&json!({ "image": B64_IMAGE }))
        .await
        .assert_status_bad_request();

    let account = harness.store.get_account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 0);
    assert_eq!(harness.dispatcher.published().len(), 1);
}

#[tokio::test]
async fn undecodable_image_rejected_before_any_charge() {
    let harness = TestHarness::new();
    let (user_id, auth) = harness.register_and_login("eve@example.com").await;
    harness.topup(&auth, 100).await;

    let response = harness
        .server
        .post("/predict")
        .add_header("authorization", auth)
        .json(&json!({ "image": "!!! not base64 !!!" }))
        .await;

    response.assert_status_bad_request();

    let account = harness.store.get_account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 100);
    assert!(harness.dispatcher.published().is_empty());
}

// ============================================================================
// Dispatch failure and timeout
// ============================================================================

#[tokio::test]
async fn broker_outage_rolls_back_the_charge() {
    let harness = TestHarness::new();
    let (user_id, auth) = harness.register_and_login("frank@example.com").await;
    harness.topup(&auth, 100).await;

    harness.dispatcher.set_unavailable(true);

    let response = harness
        .server
        .post("/predict")
        .add_header("authorization", auth)
        .json(&json!({ "image": B64_IMAGE }))
        .await;

    response.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "dispatch_unavailable");

    // Charge rolled back: balance restored, no charge transaction remains.
    let account = harness.store.get_account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 100);
    let txs = harness
        .store
        .list_transactions_by_user(&user_id, 100, 0)
        .unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount, 100);
}

#[tokio::test]
async fn reply_timeout_keeps_the_charge() {
    let harness = TestHarness::new();
    let (user_id, auth) = harness.register_and_login("grace@example.com").await;
    harness.topup(&auth, 50).await;

    // No scripted reply: the waited-for dispatch times out.
    let response = harness
        .server
        .post("/predict")
        .add_header("authorization", auth)
        .json(&json!({ "image": B64_IMAGE, "wait_for_result": true }))
        .await;

    response.assert_status(axum::http::StatusCode::GATEWAY_TIMEOUT);

    // The job was published and may still run, so the charge stands.
    let account = harness.store.get_account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 0);
    assert_eq!(harness.dispatcher.published().len(), 1);
}

#[tokio::test]
async fn lost_reply_channel_keeps_the_charge() {
    let harness = TestHarness::new();
    let (user_id, auth) = harness.register_and_login("judy@example.com").await;
    harness.topup(&auth, 50).await;

    // The publish lands but the reply channel dies before an answer.
    harness.dispatcher.set_reply_lost(true);

    let response = harness
        .server
        .post("/predict")
        .add_header("authorization", auth)
        .json(&json!({ "image": B64_IMAGE, "wait_for_result": true }))
        .await;

    response.assert_status(axum::http::StatusCode::GATEWAY_TIMEOUT);

    // Unlike a broker outage, the job is in the queue: no rollback.
    let account = harness.store.get_account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 0);
    assert_eq!(harness.dispatcher.published().len(), 1);
}

// ============================================================================
// 3D scan
// ============================================================================

#[tokio::test]
async fn scan3d_upload_charges_and_returns_mask_urls() {
    let harness = TestHarness::new();
    let (user_id, auth) = harness.register_and_login("heidi@example.com").await;
    harness.topup(&auth, 100).await;

    let response = harness
        .server
        .post("/predict/3d-scan")
        .add_header("authorization", auth)
        .multipart(
            axum_test::multipart::MultipartForm::new().add_part(
                "file",
                axum_test::multipart::Part::bytes(b"fake nifti".to_vec())
                    .file_name("brain.nii.gz"),
            ),
        )
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits_spent"], 100);
    assert_eq!(body["brain_mask_url"], "downloads/brain_mask_brain.nii.gz");
    assert_eq!(
        body["aneurysm_mask_url"],
        "downloads/aneurysm_mask_brain.nii.gz"
    );
    assert_eq!(body["original_scan_url"], "downloads/brain.nii.gz");

    // Scan price is 100.
    let account = harness.store.get_account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 0);

    // Dispatched to the scan queue.
    let published = harness.dispatcher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, harness.config.scan3d_queue);
}

#[tokio::test]
async fn scan3d_wrong_extension_rejected_without_charge() {
    let harness = TestHarness::new();
    let (user_id, auth) = harness.register_and_login("ivan@example.com").await;
    harness.topup(&auth, 200).await;

    let response = harness
        .server
        .post("/predict/3d-scan")
        .add_header("authorization", auth)
        .multipart(
            axum_test::multipart::MultipartForm::new().add_part(
                "file",
                axum_test::multipart::Part::bytes(b"plain text".to_vec())
                    .file_name("notes.txt"),
            ),
        )
        .await;

    response.assert_status_bad_request();

    let account = harness.store.get_account(&user_id).unwrap().unwrap();
    assert_eq!(account.balance, 200);
    assert!(harness.dispatcher.published().is_empty());
}
