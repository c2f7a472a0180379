//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{cards, catalog, expenses, health};
use crate::state::AppState;

/// Maximum concurrent requests for expense ingestion.
///
/// Ingestion is the high-volume surface (one request per payment
/// notification) and each request may briefly spin on a lease.
const INGEST_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Catalog (API key auth)
/// - `POST /v1/catalog/cards` - Upsert a batch of sync feed records
/// - `GET /v1/catalog/cards` - List catalog cards
///
/// ## User cards (API key auth)
/// - `POST /v1/users/{user_id}/cards` - Register a card
/// - `DELETE /v1/users/{user_id}/cards/{card_id}` - Deactivate a card
/// - `GET /v1/users/{user_id}/cards/eligible` - Usable-right-now card set
/// - `GET /v1/stores/cards` - Per-store benefit listing
///
/// ## Expenses (API key auth, own concurrency limit)
/// - `POST /v1/users/{user_id}/expenses` - Ingest a payment notification
/// - `GET /v1/users/{user_id}/expenses` - Expense history, newest first
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let expense_routes = Router::new()
        .route("/users/:user_id/expenses", post(expenses::notify_expense))
        .route("/users/:user_id/expenses", get(expenses::list_expenses))
        .layer(ConcurrencyLimitLayer::new(INGEST_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Catalog sync
        .route("/catalog/cards", post(catalog::sync_catalog))
        .route("/catalog/cards", get(catalog::list_catalog))
        // User cards
        .route("/users/:user_id/cards", post(cards::register_card))
        .route(
            "/users/:user_id/cards/:card_id",
            delete(cards::deactivate_card),
        )
        .route("/users/:user_id/cards/eligible", get(cards::eligible_cards))
        .route("/stores/cards", get(cards::store_cards))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        // Expense routes carry their own concurrency limit
        .merge(expense_routes);

    Router::new()
        // Health (public, no limits)
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
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
