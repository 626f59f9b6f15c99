//! Read-only introspection endpoints.

use std::sync::Arc;

use axum::{Json, extract::State};
use relay_core::StatusReport;
use serde::{Deserialize, Serialize};

use crate::AppState;

pub const RUNNING: &str = "Rig relay running";

/// Liveness probe body
#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub players: usize,
}

/// Handler for `GET /status`
pub async fn handler(State(state): State<Arc<AppState>>) -> Json<StatusReport> {
    Json(state.service.status())
}

/// Handler for `GET /`
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: RUNNING.to_string(),
        players: state.service.registry().count(),
    })
}
