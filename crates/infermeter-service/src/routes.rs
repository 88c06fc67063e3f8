//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, balance, health, predict, transactions};
use crate::state::AppState;

/// Maximum concurrent inference submissions.
///
/// Submissions hold a broker channel (and possibly a reply wait) open, so
/// they are capped more tightly than ledger reads.
const PREDICT_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `POST /auth/register` - Register an account
/// - `POST /auth/login` - Exchange credentials for a bearer token
///
/// ## Authenticated
/// - `GET /balance` - Current balance
/// - `POST /balance/topup` - Add credits
/// - `GET /transactions` - Own transaction history
/// - `GET /admin/transactions` - All transactions (admin flag required)
/// - `POST /predict` - Submit an image prediction
/// - `POST /predict/3d-scan` - Submit a 3D scan analysis
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let predict_routes = Router::new()
        .route("/", post(predict::predict))
        .route("/3d-scan", post(predict::predict_3d_scan))
        .layer(ConcurrencyLimitLayer::new(PREDICT_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // Ledger
        .route("/balance", get(balance::get_balance))
        .route("/balance/topup", post(balance::topup))
        .route("/transactions", get(transactions::list_transactions))
        .route(
            "/admin/transactions",
            get(transactions::list_all_transactions),
        )
        // Inference submission (with its own concurrency limit)
        .nest("/predict", predict_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no limits)
        .route("/health", get(health::health))
        .merge(api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
