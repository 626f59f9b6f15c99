//! relay-core: In-memory presence registry for the rig relay.
//!
//! This crate provides:
//! - The participant registry (upsert, snapshots, TTL expiry)
//! - The background reaper that removes silent participants
//! - Sync/status orchestration for both protocol shapes
//! - Lifecycle events (join/update/leave) with an observer bus

pub mod clock;
pub mod color;
pub mod events;
pub mod protocol;
pub mod reaper;
pub mod registry;
pub mod service;
pub mod update;

pub use clock::{Clock, ManualClock, SystemClock};
pub use color::{Color, ColorError};
pub use events::{EventBus, LifecycleEvent, Subscription};
pub use protocol::ProtocolShape;
pub use reaper::{Reaper, ReaperConfig, ReaperConfigError};
pub use registry::{Departure, ParticipantRecord, Registry};
pub use service::{PlayerStatus, StatusReport, SyncService};
pub use update::{DEFAULT_NAME, ParticipantUpdate, UpdateError};
