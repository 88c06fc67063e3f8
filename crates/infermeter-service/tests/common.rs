//! Common test utilities for infermeter integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

use infermeter_core::{Account, UserId};
use infermeter_service::auth::create_access_token;
use infermeter_service::{create_router, AppState, MemoryDispatcher, ServiceConfig};
use infermeter_store::{RocksStore, Store};

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// Direct handle to the store for ledger assertions.
    pub store: Arc<RocksStore>,
    /// The in-memory dispatcher for inspecting published jobs.
    pub dispatcher: Arc<MemoryDispatcher>,
    /// The configuration the server runs with.
    pub config: ServiceConfig,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));
        let dispatcher = Arc::new(MemoryDispatcher::new());

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            jwt_secret: "test-secret".into(),
            upload_dir: temp_dir.path().join("uploads").to_string_lossy().to_string(),
            download_dir: "downloads".into(),
            reply_timeout_seconds: 1,
            ..ServiceConfig::default()
        };

        let state = AppState::new(store.clone(), dispatcher.clone(), config.clone());
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            _temp_dir: temp_dir,
            store,
            dispatcher,
            config,
        }
    }

    /// Register an account over HTTP, returning its id.
    pub async fn register(&self, email: &str, password: &str) -> UserId {
        let response = self
            .server
            .post("/auth/register")
            .json(&json!({ "email": email, "password": password }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        body["id"]
            .as_str()
            .expect("registration response missing id")
            .parse()
            .expect("registration returned malformed id")
    }

    /// Login over HTTP, returning the bearer token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .server
            .post("/auth/login")
            .form(&[("username", email), ("password", password)])
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["access_token"]
            .as_str()
            .expect("login response missing access_token")
            .to_string()
    }

    /// Register and login in one step, returning `(user_id, bearer header)`.
    pub async fn register_and_login(&self, email: &str) -> (UserId, String) {
        let user_id = self.register(email, "hunter2!").await;
        let token = self.login(email, "hunter2!").await;
        (user_id, format!("Bearer {token}"))
    }

    /// Top up a user's balance over HTTP.
    pub async fn topup(&self, auth_header: &str, amount: i64) {
        self.server
            .post("/balance/topup")
            .add_header("authorization", auth_header)
            .json(&json!({ "amount": amount }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
    }

    /// Create an admin account directly in the store and mint it a token.
    pub async fn admin_auth_header(&self) -> (UserId, String) {
        let user_id = UserId::generate();
        let mut account = Account::new(user_id, "admin@example.com", "not-a-real-hash");
        account.is_admin = true;
        self.store
            .create_account(&account)
            .expect("Failed to create admin account");

        let token = create_access_token(user_id, &self.config).expect("Failed to mint token");
        (user_id, format!("Bearer {token}"))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
