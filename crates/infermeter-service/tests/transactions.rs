//! Transaction history integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn transactions_listed_newest_first() {
    let harness = TestHarness::new();
    let (_, auth) = harness.register_and_login("alice@example.com").await;

    for amount in [10, 20, 30] {
        harness.topup(&auth, amount).await;
    }

    let response = harness
        .server
        .get("/transactions")
        .add_header("authorization", auth)
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let amounts: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|tx| tx["amount"].as_i64().unwrap())
        .collect();
    assert_eq!(amounts, vec![30, 20, 10]);
}

#[tokio::test]
async fn transactions_are_scoped_to_the_token() {
    let harness = TestHarness::new();
    let (_, alice) = harness.register_and_login("alice@example.com").await;
    let (_, bob) = harness.register_and_login("bob@example.com").await;

    harness.topup(&alice, 100).await;
    harness.topup(&bob, 7).await;

    let response = harness
        .server
        .get("/transactions")
        .add_header("authorization", bob)
        .await;
    let body: serde_json::Value = response.json();
    let txs = body.as_array().unwrap();

    // Bob only sees his own deposit, never Alice's.
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0]["amount"], 7);
}

#[tokio::test]
async fn pagination_limits_and_skips() {
    let harness = TestHarness::new();
    let (_, auth) = harness.register_and_login("carol@example.com").await;

    for amount in 1..=5 {
        harness.topup(&auth, amount).await;
    }

    let response = harness
        .server
        .get("/transactions")
        .add_query_param("limit", "2")
        .add_query_param("offset", "1")
        .add_header("authorization", auth)
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let amounts: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|tx| tx["amount"].as_i64().unwrap())
        .collect();
    // Newest first is 5,4,3,2,1; skip one, take two.
    assert_eq!(amounts, vec![4, 3]);
}

// ============================================================================
// Admin listing
// ============================================================================

#[tokio::test]
async fn admin_sees_all_users_transactions() {
    let harness = TestHarness::new();
    let (_, alice) = harness.register_and_login("alice@example.com").await;
    let (_, bob) = harness.register_and_login("bob@example.com").await;

    harness.topup(&alice, 11).await;
    harness.topup(&bob, 22).await;

    let (_, admin) = harness.admin_auth_header().await;

    let response = harness
        .server
        .get("/admin/transactions")
        .add_header("authorization", admin)
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let amounts: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|tx| tx["amount"].as_i64().unwrap())
        .collect();
    assert!(amounts.contains(&11));
    assert!(amounts.contains(&22));
}

#[tokio::test]
async fn non_admin_cannot_list_all_transactions() {
    let harness = TestHarness::new();
    let (_, auth) = harness.register_and_login("mallory@example.com").await;

    harness
        .server
        .get("/admin/transactions")
        .add_header("authorization", auth)
        .await
        .assert_status(axum::http::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn charges_appear_as_negative_amounts() {
    let harness = TestHarness::new();
    let (_, auth) = harness.register_and_login("dora@example.com").await;

    harness.topup(&auth, 100).await;

    harness
        .server
        .post("/predict")
        .add_header("authorization", auth.clone())
        .json(&json!({ "image": "aGVsbG8=" }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/transactions")
        .add_header("authorization", auth)
        .await;

    let body: serde_json::Value = response.json();
    let txs = body.as_array().unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0]["kind"], "prediction");
    assert_eq!(txs[0]["amount"], -50);
    assert_eq!(txs[1]["kind"], "deposit");
    assert_eq!(txs[1]["amount"], 100);
}
