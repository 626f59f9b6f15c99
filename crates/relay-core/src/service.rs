//! Request-level orchestration over the registry.
//!
//! Transport-agnostic: the server decodes HTTP and calls into these methods.
//! Payloads are validated before the registry is touched, so a malformed
//! update never changes state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::color::Color;
use crate::events::{EventBus, LifecycleEvent};
use crate::protocol::ProtocolShape;
use crate::registry::{ParticipantRecord, Registry};
use crate::update::{ParticipantUpdate, UpdateError};

/// Point-in-time view of everyone present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub player_count: usize,
    pub players: Vec<PlayerStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// Seconds since the last update, rounded to two decimals.
    pub seconds_ago: f64,
    pub rig: Value,
}

pub struct SyncService {
    registry: Arc<Registry>,
    events: Arc<EventBus>,
    shape: ProtocolShape,
}

impl SyncService {
    pub fn new(registry: Arc<Registry>, events: Arc<EventBus>, shape: ProtocolShape) -> Self {
        Self {
            registry,
            events,
            shape,
        }
    }

    pub fn shape(&self) -> ProtocolShape {
        self.shape
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Store the caller's update and return every other participant.
    pub fn sync(
        &self,
        id: &str,
        payload: Value,
    ) -> Result<HashMap<String, ParticipantRecord>, UpdateError> {
        self.publish(id, payload)?;
        Ok(self.registry.snapshot_excluding(id))
    }

    /// Store the caller's update without reading anything back.
    ///
    /// Returns whether this was the participant's first contact.
    pub fn publish(&self, id: &str, payload: Value) -> Result<bool, UpdateError> {
        let update = ParticipantUpdate::from_payload(payload, self.shape)?;
        let (record, is_new) = self.registry.upsert(id, update);

        if is_new {
            self.events.emit(LifecycleEvent::Join {
                id: record.id,
                name: record.name,
            });
        } else if self.shape.emits_updates() {
            self.events.emit(LifecycleEvent::Update {
                id: record.id,
                name: record.name,
            });
        }
        Ok(is_new)
    }

    /// Rigs of every participant other than `id`. Unknown ids see everyone.
    pub fn peers(&self, id: &str) -> HashMap<String, Value> {
        self.registry
            .snapshot_excluding(id)
            .into_iter()
            .map(|(peer, record)| (peer, record.rig))
            .collect()
    }

    /// Read-only report of the registry at the current time.
    pub fn status(&self) -> StatusReport {
        self.status_at(self.registry.now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> StatusReport {
        let players: Vec<PlayerStatus> = self
            .registry
            .snapshot_all()
            .into_iter()
            .map(|record| PlayerStatus {
                seconds_ago: round_secs(&record, now),
                color: if self.shape.tracks_color() { record.color } else { None },
                name: record.name,
                rig: record.rig,
            })
            .collect();

        StatusReport {
            player_count: players.len(),
            players,
        }
    }
}

fn round_secs(record: &ParticipantRecord, now: DateTime<Utc>) -> f64 {
    let secs = record.age(now).num_milliseconds() as f64 / 1000.0;
    (secs * 100.0).round() / 100.0
}
