/* LED controller: identity, on/off state, static color, mode, and
 * brightness for a single hardware LED. All state is stored hardware-side;
 * reads always round-trip through the device via the caller-supplied
 * getter/setter closures wired up by `Device`. */

use crate::color::Rgb;
use crate::descriptor::LedKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedMode {
    Static,
    Blink,
    Pulse,
    Spectrum,
}

impl LedMode {
    /// The wire encoding skips 0x03: STATIC=0x00, BLINK=0x01, PULSE=0x02,
    /// SPECTRUM=0x04.
    pub fn to_byte(self) -> u8 {
        match self {
            LedMode::Static => 0x00,
            LedMode::Blink => 0x01,
            LedMode::Pulse => 0x02,
            LedMode::Spectrum => 0x04,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(LedMode::Static),
            0x01 => Some(LedMode::Blink),
            0x02 => Some(LedMode::Pulse),
            0x04 => Some(LedMode::Spectrum),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedState {
    pub kind: LedKind,
    pub on: bool,
    pub color: Rgb,
    pub mode: LedMode,
    /// Percentage, 0..100.
    pub brightness: u8,
}

impl LedState {
    pub fn new(kind: LedKind) -> Self {
        Self {
            kind,
            on: false,
            color: Rgb::BLACK,
            mode: LedMode::Static,
            brightness: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_byte_round_trip_skips_0x03() {
        for mode in [LedMode::Static, LedMode::Blink, LedMode::Pulse, LedMode::Spectrum] {
            assert_eq!(LedMode::from_byte(mode.to_byte()), Some(mode));
        }
        assert_eq!(LedMode::from_byte(0x03), None);
    }

    #[test]
    fn new_state_defaults_to_off_static_black() {
        let state = LedState::new(LedKind::Backlight);
        assert!(!state.on);
        assert_eq!(state.color, Rgb::BLACK);
        assert_eq!(state.mode, LedMode::Static);
        assert_eq!(state.brightness, 0);
    }
}
