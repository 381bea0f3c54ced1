//! HTTP/WebSocket bridge exposing the research controller to browser UIs
//!
//! The controller's snapshots are pushed over `/ws/events`; REST routes read
//! the current snapshot and start new sessions.

mod events;
pub mod routes;
pub mod state;

pub use events::{spawn_snapshot_forwarder, EventBroadcaster, ServerEvent};
pub use state::ServerAppState;

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue,
    },
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ServerConfig;

/// Build the bridge router
pub fn build_router(state: ServerAppState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        // Permissive CORS: allow any origin (default for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([CONTENT_TYPE, ACCEPT])
    } else {
        let allowed_origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods(Any)
            .allow_headers([CONTENT_TYPE, ACCEPT])
    };

    Router::new()
        .route(
            "/api/research",
            get(routes::get_research).post(routes::start_research),
        )
        .route("/ws/events", get(events::ws_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP/WebSocket server until shutdown is requested
pub async fn run_server(config: &ServerConfig, state: ServerAppState) -> Result<(), String> {
    let forwarder = spawn_snapshot_forwarder(&state.controller, state.broadcaster.clone());
    let app = build_router(state.clone(), &config.cors_origins);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let cors_display = if config.cors_origins.is_empty() {
        "*".to_string()
    } else {
        config.cors_origins.join(", ")
    };
    log::info!("UI bridge listening on http://{} (CORS: {})", addr, cors_display);

    // Create shutdown signal that waits for the shutdown state flag
    let shutdown_state = state.shutdown_state.clone();
    let shutdown_signal = async move {
        loop {
            if shutdown_state.is_shutdown_requested() {
                log::info!("Shutdown signal received, stopping server...");
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    };

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| format!("Server error: {}", e));

    forwarder.abort();
    result
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}
