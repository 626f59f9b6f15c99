//! `/sync/{participantId}`: publish the caller's rig, read everyone else's.
//!
//! The body is parsed as JSON regardless of `Content-Type`; game clients do not
//! always set it.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use relay_core::{Color, ParticipantRecord, ProtocolShape};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AppState;
use crate::error::ApiError;

/// Combined-shape response: every participant except the caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub players: HashMap<String, PeerRecord>,
}

/// One peer as seen by other participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    pub rig: Value,
    /// Unix time of the peer's last update, in seconds
    pub last_seen: f64,
}

impl From<ParticipantRecord> for PeerRecord {
    fn from(record: ParticipantRecord) -> Self {
        Self {
            name: record.name,
            color: record.color,
            rig: record.rig,
            last_seen: record.last_seen.timestamp_micros() as f64 / 1_000_000.0,
        }
    }
}

/// Split-shape acknowledgement for a write.
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncAck {
    pub status: String,
}

/// Handler for `POST /sync/{participantId}`
pub async fn post_handler(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: Value = serde_json::from_slice(&body)?;

    match state.service.shape() {
        ProtocolShape::Combined => {
            let others = state.service.sync(&participant_id, payload)?;
            let players = others
                .into_iter()
                .map(|(id, record)| (id, PeerRecord::from(record)))
                .collect();
            Ok(Json(SyncResponse { players }).into_response())
        }
        ProtocolShape::Split => {
            state.service.publish(&participant_id, payload)?;
            Ok(Json(SyncAck {
                status: "ok".to_string(),
            })
            .into_response())
        }
    }
}

/// Handler for `GET /sync/{participantId}` (split shape only)
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(participant_id): Path<String>,
) -> Json<HashMap<String, Value>> {
    Json(state.service.peers(&participant_id))
}
