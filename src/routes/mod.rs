pub mod cache;
pub mod health;
pub mod metrics;
pub mod webhook;

use axum::routing::{any, get, post, put};
use axum::Router;

use crate::app_state::AppState;

/// Webhook, health and cache admin routes. `/metrics` is mounted separately
/// in `main` because it carries its own state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", any(webhook::webhook_handler))
        .route("/health", get(health::health_check))
        .route("/api/v1/cache", get(cache::list_entries))
        .route(
            "/api/v1/cache/{username}",
            put(cache::update_entry).delete(cache::delete_entry),
        )
        .route("/api/v1/cache/{username}/clear", post(cache::clear_entry))
        .with_state(state)
}
