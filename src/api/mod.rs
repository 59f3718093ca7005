//! REST API over the grid store.
//!
//! Endpoints:
//! - `GET /api/health` — liveness probe
//! - `GET /api/dashboard/{city}` — tick-and-read dashboard payload
//! - `POST /api/outage/{city}/{transformer}` — trigger an artificial outage
//! - `DELETE /api/outage/{city}/{transformer}` — clear it
//! - `POST /api/disaster/{city}` — trigger a disaster scenario
//! - `DELETE /api/disaster/{city}` — clear disasters

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::grid::GridStore;

/// Application state shared across all request handlers.
///
/// The store carries its own interior locking, so handlers only need the
/// shared `Arc`.
pub struct AppState {
    /// Grid simulation store serving every city.
    pub store: GridStore,
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
///
/// # Returns
///
/// Configured `Router` ready to serve.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::get_health))
        .route("/api/dashboard/{city}", get(handlers::get_dashboard))
        .route(
            "/api/outage/{city}/{transformer}",
            post(handlers::post_outage),
        )
        .route(
            "/api/outage/{city}/{transformer}",
            delete(handlers::delete_outage),
        )
        .route("/api/disaster/{city}", post(handlers::post_disaster))
        .route("/api/disaster/{city}", delete(handlers::delete_disaster))
        .with_state(state)
}

/// Binds to the given address and serves the API.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `addr` - Socket address to bind to
///
/// # Panics
///
/// Panics if the TCP listener cannot bind to `addr`.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {addr}: {e}"));
    eprintln!("API server listening on http://{addr}");
    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("server error: {e}"));
}
