//! Lamp control: color/brightness types, the [`LampDriver`] trait and the
//! Govee drivers behind it.

pub mod cloud;
mod error;
pub mod fallback;
pub mod lan;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod protocol;

pub use cloud::GoveeCloud;
pub use error::{LampError, LampResult};
pub use fallback::FallbackLamp;
pub use lan::GoveeLan;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 24-bit color.
///
/// Deserializes from `{"r":..,"g":..,"b":..}`, `"#rrggbb"` or `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RgbRepr")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packed `0xRRGGBB`, as some Govee responses report it.
    pub fn from_packed(value: u32) -> Self {
        Self::new(
            ((value >> 16) & 0xFF) as u8,
            ((value >> 8) & 0xFF) as u8,
            (value & 0xFF) as u8,
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RgbRepr {
    Object { r: u8, g: u8, b: u8 },
    Array([u8; 3]),
    Hex(String),
}

impl TryFrom<RgbRepr> for Rgb {
    type Error = String;

    fn try_from(repr: RgbRepr) -> Result<Self, Self::Error> {
        match repr {
            RgbRepr::Object { r, g, b } => Ok(Rgb::new(r, g, b)),
            RgbRepr::Array([r, g, b]) => Ok(Rgb::new(r, g, b)),
            RgbRepr::Hex(s) => s.parse(),
        }
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("invalid color '{}': expected #rrggbb", s));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| format!("invalid color '{}': bad hex digits", s))
        };
        Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Color plus brightness (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LampState {
    pub color: Rgb,
    pub brightness: u8,
}

impl LampState {
    pub fn new(color: Rgb, brightness: u8) -> Self {
        Self {
            color,
            brightness: brightness.min(100),
        }
    }
}

impl fmt::Display for LampState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}%", self.color, self.brightness)
    }
}

/// What a device reports about itself: its light plus whether it is switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub state: LampState,
    pub on: bool,
}

impl DeviceStatus {
    pub fn lit(state: LampState) -> Self {
        Self { state, on: true }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.on {
            write!(f, "{}", self.state)
        } else {
            write!(f, "{} (off)", self.state)
        }
    }
}

/// Lowest brightness sent to a device; 0 is left to the power switch.
pub const MIN_BRIGHTNESS: u8 = 1;

/// Clamp to what Govee devices accept for `brightness`.
pub fn device_brightness(brightness: u8) -> u8 {
    brightness.clamp(MIN_BRIGHTNESS, 100)
}

/// One thing to tell the lamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LampCommand {
    SetColor(Rgb),
    SetBrightness(u8),
    SetPower(bool),
    /// Brightness first, then color.
    Apply(LampState),
}

#[async_trait]
pub trait LampDriver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn set_color(&self, color: Rgb) -> LampResult<()>;

    async fn set_brightness(&self, brightness: u8) -> LampResult<()>;

    async fn set_power(&self, on: bool) -> LampResult<()>;

    /// Current color, brightness and power, or `None` if the device cannot say.
    async fn query_state(&self) -> LampResult<Option<DeviceStatus>>;

    async fn apply(&self, command: LampCommand) -> LampResult<()> {
        match command {
            LampCommand::SetColor(color) => self.set_color(color).await,
            LampCommand::SetBrightness(brightness) => self.set_brightness(brightness).await,
            LampCommand::SetPower(on) => self.set_power(on).await,
            LampCommand::Apply(state) => {
                self.set_brightness(state.brightness).await?;
                self.set_color(state.color).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_accepts_all_shapes() {
        let a: Rgb = serde_json::from_str(r#"{"r":255,"g":0,"b":128}"#).unwrap();
        let b: Rgb = serde_json::from_str(r##""#ff0080""##).unwrap();
        let c: Rgb = serde_json::from_str("[255, 0, 128]").unwrap();
        assert_eq!(a, Rgb::new(255, 0, 128));
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_rgb_rejects_bad_hex() {
        assert!("#ff00".parse::<Rgb>().is_err());
        assert!("zz0000".parse::<Rgb>().is_err());
        assert!(serde_json::from_str::<Rgb>("[300, 0, 0]").is_err());
    }

    #[test]
    fn test_rgb_display_and_packed() {
        assert_eq!(Rgb::new(255, 200, 100).to_string(), "#ffc864");
        assert_eq!(Rgb::from_packed(0xFFC864), Rgb::new(255, 200, 100));
    }

    #[test]
    fn test_lamp_state_clamps_brightness() {
        assert_eq!(LampState::new(Rgb::WHITE, 250).brightness, 100);
    }

    #[test]
    fn test_device_brightness_never_zero() {
        assert_eq!(device_brightness(0), 1);
        assert_eq!(device_brightness(55), 55);
        assert_eq!(device_brightness(200), 100);
    }

    #[test]
    fn test_device_status_display_marks_off() {
        let state = LampState::new(Rgb::new(255, 200, 100), 60);
        assert_eq!(DeviceStatus::lit(state).to_string(), "#ffc864 @ 60%");
        let off = DeviceStatus { state, on: false };
        assert_eq!(off.to_string(), "#ffc864 @ 60% (off)");
    }
}
