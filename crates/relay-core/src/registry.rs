//! Participant registry: the in-memory map of everyone currently present.
//!
//! One mutex guards the whole map. Every operation takes it once, touches the
//! map, and releases it before returning; nothing awaits or does I/O while it
//! is held. Snapshots are owned copies and never alias the map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::color::Color;
use crate::update::ParticipantUpdate;

/// Current state of one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantRecord {
    pub id: String,
    pub name: String,
    pub color: Option<Color>,
    pub rig: Value,
    pub last_seen: DateTime<Utc>,
}

impl ParticipantRecord {
    /// Time elapsed since the last update, never negative.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_seen).max(Duration::zero())
    }
}

/// A participant removed by expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub id: String,
    pub name: String,
}

pub struct Registry {
    participants: Mutex<HashMap<String, ParticipantRecord>>,
    clock: Arc<dyn Clock>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            participants: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Current time according to the registry's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // Every mutation is a single insert or remove, so a poisoned map is intact.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ParticipantRecord>> {
        self.participants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or wholesale replace the record for `id`.
    ///
    /// Returns the stored record and whether `id` was previously absent.
    /// `last_seen` never moves backwards, even if the clock does.
    pub fn upsert(&self, id: &str, update: ParticipantUpdate) -> (ParticipantRecord, bool) {
        let mut participants = self.lock();
        let now = self.clock.now();

        let previous = participants.get(id).map(|p| p.last_seen);
        let last_seen = previous.map_or(now, |seen| seen.max(now));

        let record = ParticipantRecord {
            id: id.to_string(),
            name: update.name,
            color: update.color,
            rig: update.rig,
            last_seen,
        };
        participants.insert(id.to_string(), record.clone());

        (record, previous.is_none())
    }

    /// Copy of every record except `id`'s.
    pub fn snapshot_excluding(&self, id: &str) -> HashMap<String, ParticipantRecord> {
        self.lock()
            .iter()
            .filter(|(key, _)| key.as_str() != id)
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect()
    }

    /// Copy of every record, ordered by id.
    pub fn snapshot_all(&self) -> Vec<ParticipantRecord> {
        let mut records: Vec<_> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Remove every record whose age at `now` is strictly greater than `max_age`.
    ///
    /// Records stamped after `now` have a negative age and always survive, so
    /// an upsert that wins the lock ahead of a sweep is never discarded by it.
    pub fn expire_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> Vec<Departure> {
        let mut participants = self.lock();

        let stale: Vec<String> = participants
            .values()
            .filter(|p| now - p.last_seen > max_age)
            .map(|p| p.id.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|id| participants.remove(&id))
            .map(|p| Departure {
                id: p.id,
                name: p.name,
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }
}
