//! Stroke colours, carried on the wire as hex strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hex colour that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hex colour: {0:?}")]
pub struct ColorParseError(pub String);

/// RGBA8 stroke colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StrokeColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl StrokeColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the `#` is optional).
    pub fn from_hex(input: &str) -> Result<Self, ColorParseError> {
        let err = || ColorParseError(input.to_string());
        let hex = input.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return Err(err());
        }
        let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| err());

        match hex.len() {
            3 => {
                // #rgb -> #rrggbb
                let r = byte(&hex[0..1])? * 17;
                let g = byte(&hex[1..2])? * 17;
                let b = byte(&hex[2..3])? * 17;
                Ok(Self::new(r, g, b, 255))
            }
            6 => Ok(Self::new(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
                255,
            )),
            8 => Ok(Self::new(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
                byte(&hex[6..8])?,
            )),
            _ => Err(err()),
        }
    }

    /// Lowercase hex; the alpha pair is only written when not opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for StrokeColor {
    fn default() -> Self {
        Self::black()
    }
}

impl fmt::Display for StrokeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for StrokeColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for StrokeColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<StrokeColor> for String {
    fn from(color: StrokeColor) -> Self {
        color.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(StrokeColor::from_hex("#f00").unwrap(), StrokeColor::new(255, 0, 0, 255));
        assert_eq!(
            StrokeColor::from_hex("#12ab9C").unwrap(),
            StrokeColor::new(0x12, 0xab, 0x9c, 255)
        );
        assert_eq!(
            StrokeColor::from_hex("00ff0080").unwrap(),
            StrokeColor::new(0, 255, 0, 128)
        );
    }

    #[test]
    fn test_reject_garbage() {
        assert!(StrokeColor::from_hex("").is_err());
        assert!(StrokeColor::from_hex("#12345").is_err());
        assert!(StrokeColor::from_hex("#zzzzzz").is_err());
        assert!(StrokeColor::from_hex("#ééé").is_err());
    }

    #[test]
    fn test_hex_output() {
        assert_eq!(StrokeColor::new(255, 0, 16, 255).to_hex(), "#ff0010");
        assert_eq!(StrokeColor::new(1, 2, 3, 4).to_hex(), "#01020304");
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&StrokeColor::new(255, 255, 0, 255)).unwrap();
        assert_eq!(json, "\"#ffff00\"");
        let back: StrokeColor = serde_json::from_str("\"#ff0\"").unwrap();
        assert_eq!(back, StrokeColor::new(255, 255, 0, 255));
        assert!(serde_json::from_str::<StrokeColor>("\"nope\"").is_err());
    }
}
