//! Participant colour: a 24-bit RGB value rendered as `#rrggbb`.
//!
//! Clients either send a precomputed hex string or three float channels in
//! `[0, 1]`. Channels are converted by truncation (`floor(c * 255)`), not
//! rounding, so 0.5 becomes `7f`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("Invalid colour {0:?}: expected #rrggbb")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a colour from float channel intensities.
    ///
    /// Values outside `[0, 1]` are clamped and NaN maps to zero.
    pub fn from_channels(r: f64, g: f64, b: f64) -> Self {
        Self::new(channel_to_byte(r), channel_to_byte(g), channel_to_byte(b))
    }
}

fn channel_to_byte(channel: f64) -> u8 {
    if channel.is_nan() {
        return 0;
    }
    (channel.clamp(0.0, 1.0) * 255.0).floor() as u8
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ColorError;

    /// Accepts `#rrggbb` or `rrggbb`, in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidFormat(s.to_string()));
        }

        let byte = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ColorError::InvalidFormat(s.to_string()))
        };
        Ok(Self::new(byte(0..2)?, byte(2..4)?, byte(4..6)?))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_truncate() {
        // 0.5 * 255 = 127.5, truncated to 0x7f
        let color = Color::from_channels(1.0, 0.0, 0.5);
        assert_eq!(color.to_string(), "#ff007f");
    }

    #[test]
    fn test_channels_clamped() {
        let color = Color::from_channels(2.0, -1.0, f64::NAN);
        assert_eq!(color, Color::new(0xff, 0x00, 0x00));
    }

    #[test]
    fn test_default_is_white() {
        assert_eq!(Color::default().to_string(), "#ffffff");
        assert_eq!(Color::from_channels(1.0, 1.0, 1.0), Color::WHITE);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!("#FF0080".parse::<Color>().unwrap(), Color::new(0xff, 0x00, 0x80));
        assert_eq!("1a2b3c".parse::<Color>().unwrap(), Color::new(0x1a, 0x2b, 0x3c));
    }

    #[test]
    fn test_parse_normalizes_to_lowercase() {
        let color: Color = "#ABCDEF".parse().unwrap();
        assert_eq!(color.to_string(), "#abcdef");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for bad in ["", "#fff", "#gggggg", "#12345678", "red"] {
            assert!(bad.parse::<Color>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Color::new(0x12, 0x34, 0x56)).unwrap();
        assert_eq!(json, "\"#123456\"");

        let parsed: Color = serde_json::from_str("\"#123456\"").unwrap();
        assert_eq!(parsed, Color::new(0x12, 0x34, 0x56));
    }
}
