//! Router configuration for the relay.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::middleware::create_cors_layer;
use super::ws::{chat_ws_handler, ChatWsState};

/// Create the main router: the chat WebSocket plus the health check.
pub fn create_router(ws_state: Arc<ChatWsState>, cors_origins: &[String]) -> Router {
    let ws_routes = Router::new()
        .route("/ws", get(chat_ws_handler))
        .with_state(ws_state);

    Router::new()
        .merge(ws_routes)
        .merge(create_health_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
