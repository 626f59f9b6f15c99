//! relay-server library: router and shared state.
//!
//! The binary in `main.rs` wires this up with configuration, logging and the
//! reaper; integration tests drive the router directly.

pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use relay_core::{ProtocolShape, SyncService};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;

/// Shared application state
pub struct AppState {
    pub service: SyncService,
}

impl AppState {
    pub fn new(service: SyncService) -> Self {
        Self { service }
    }
}

/// Build the HTTP router for the configured protocol shape.
pub fn router(state: Arc<AppState>) -> Router {
    let sync = match state.service.shape() {
        ProtocolShape::Combined => post(handlers::sync::post_handler),
        ProtocolShape::Split => {
            post(handlers::sync::post_handler).get(handlers::sync::get_handler)
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::status::health_handler))
        .route("/status", get(handlers::status::handler))
        .route("/sync/{participant_id}", sync)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
