//! Decoding of inbound update payloads.
//!
//! The payload is arbitrary JSON owned by the client. Only `name`, `color` and
//! the `r`/`g`/`b` channels are read; everything else travels inside the rig
//! untouched. Null fields count as absent.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::color::{Color, ColorError};
use crate::protocol::ProtocolShape;

/// Name given to participants that do not send one.
pub const DEFAULT_NAME: &str = "Player";

/// Channel intensity assumed when a channel is missing.
const DEFAULT_CHANNEL: f64 = 1.0;

#[derive(Debug, Error, PartialEq)]
pub enum UpdateError {
    #[error("Update payload must be a JSON object")]
    NotAnObject,
    #[error("Field `name` must be a string")]
    InvalidName,
    #[error("Field `color` must be a string")]
    InvalidColorType,
    #[error(transparent)]
    InvalidColor(#[from] ColorError),
    #[error("Channel `{0}` must be a number")]
    InvalidChannel(&'static str),
}

/// A decoded update, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantUpdate {
    pub name: String,
    pub color: Option<Color>,
    pub rig: Value,
}

impl ParticipantUpdate {
    pub fn new(name: impl Into<String>, color: Option<Color>, rig: Value) -> Self {
        Self {
            name: name.into(),
            color,
            rig,
        }
    }

    /// Decode a raw payload according to the protocol shape.
    ///
    /// Missing fields take their defaults. Nothing is merged with any
    /// previous state of the participant.
    pub fn from_payload(payload: Value, shape: ProtocolShape) -> Result<Self, UpdateError> {
        let Value::Object(mut fields) = payload else {
            return Err(UpdateError::NotAnObject);
        };

        let name = match present(&fields, "name") {
            None => DEFAULT_NAME.to_string(),
            Some(Value::String(name)) => name.clone(),
            Some(_) => return Err(UpdateError::InvalidName),
        };

        let color = if shape.tracks_color() {
            Some(decode_color(&fields)?)
        } else {
            None
        };

        let rig = match shape {
            ProtocolShape::Combined => Value::Object(fields),
            ProtocolShape::Split => fields.remove("rig").unwrap_or(Value::Null),
        };

        Ok(Self { name, color, rig })
    }
}

fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

fn decode_color(fields: &Map<String, Value>) -> Result<Color, UpdateError> {
    match present(fields, "color") {
        Some(Value::String(hex)) => return Ok(hex.parse()?),
        Some(_) => return Err(UpdateError::InvalidColorType),
        None => {}
    }

    let channel = |key: &'static str| match present(fields, key) {
        None => Ok(DEFAULT_CHANNEL),
        Some(v) => v.as_f64().ok_or(UpdateError::InvalidChannel(key)),
    };
    Ok(Color::from_channels(channel("r")?, channel("g")?, channel("b")?))
}
