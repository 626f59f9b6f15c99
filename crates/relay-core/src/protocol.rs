//! Protocol shapes the relay can speak.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown protocol shape {0:?}: expected \"combined\" or \"split\"")]
pub struct UnknownShape(String);

/// How updates and peer reads are exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolShape {
    /// One call publishes the caller's state and returns every other participant.
    ///
    /// The whole update payload is the rig and colour is tracked.
    #[default]
    Combined,
    /// Publishing and reading are separate calls.
    ///
    /// The rig is the payload's `rig` field, reads return rigs only, and colour
    /// is not tracked.
    Split,
}

impl ProtocolShape {
    pub fn tracks_color(self) -> bool {
        matches!(self, ProtocolShape::Combined)
    }

    /// Whether repeat updates from a known participant emit UPDATE events.
    pub fn emits_updates(self) -> bool {
        matches!(self, ProtocolShape::Combined)
    }
}

impl Display for ProtocolShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolShape::Combined => f.write_str("combined"),
            ProtocolShape::Split => f.write_str("split"),
        }
    }
}

impl FromStr for ProtocolShape {
    type Err = UnknownShape;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combined" => Ok(ProtocolShape::Combined),
            "split" => Ok(ProtocolShape::Split),
            _ => Err(UnknownShape(s.to_string())),
        }
    }
}
