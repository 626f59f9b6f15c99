//! HTTP endpoints
//!
//! - `POST /sync/{participantId}`: publish (and, in the combined shape, read peers)
//! - `GET /sync/{participantId}`: read peer rigs (split shape)
//! - `GET /status`: registry contents for debugging
//! - `GET /`: liveness probe

pub mod status;
pub mod sync;
