//! tablesync — HTTP and WebSocket surface.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full router.
pub fn app(state: AppState) -> Router {
    // TODO: Restrict CORS to the auth gateway's origin.
    Router::new()
        .merge(routes::health::router())
        .merge(routes::ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
