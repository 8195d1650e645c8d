//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Reference data
        .route("/categories", get(handlers::list_categories))
        .route("/departments", get(handlers::list_departments))
        // Items
        .route("/items", get(handlers::list_items).post(handlers::create_item))
        .route("/items/:id", get(handlers::get_item).delete(handlers::delete_item))
        .route("/items/:id/history", get(handlers::item_history))
        .route("/items/:id/status", post(handlers::advance_status))
        .route("/items/:id/pickup-requests", post(handlers::create_pickup_request))
        .route(
            "/items/:id/pickup-requests/reject-stale",
            post(handlers::reject_stale_requests),
        )
        // Pickup ledger
        .route("/pickup/board", get(handlers::vendor_board))
        .route("/pickup/requests", get(handlers::list_requests))
        .route("/pickup/:id/approve", post(handlers::approve_request))
        .route("/pickup/:id/reject", post(handlers::reject_request));

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}
