/* Static per-product description of a device: everything the command layer
 * needs to know about a peripheral that isn't learned at runtime. The
 * catalog that produces these records is an external collaborator (see
 * the crate's top-level docs); this module only defines the record shape. */

use std::collections::HashMap;

use crate::quirk::Quirks;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Keyboard,
    Laptop,
    Mouse,
    Mousepad,
    Headset,
}

impl DeviceType {
    /// The HID interface number this device family is bound to.
    pub fn interface_number(self) -> u8 {
        match self {
            DeviceType::Headset => 3,
            DeviceType::Keyboard | DeviceType::Laptop => 2,
            DeviceType::Mousepad => 1,
            DeviceType::Mouse => 0,
        }
    }

    /// The `(varstore, transaction_id)` pair a custom-frame activation
    /// command must use for this device family: mice use varstore 0 and a
    /// fixed transaction id of 0x80, everything else uses varstore 1 and
    /// the quirk-derived default transaction id.
    pub fn custom_frame_activation(self) -> (u8, Option<u8>) {
        match self {
            DeviceType::Mouse => (0, Some(0x80)),
            _ => (1, None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixDimensions {
    pub rows: usize,
    pub cols: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedKind {
    Backlight,
    Logo,
    ScrollWheel,
    Battery,
    Macro,
    Game,
    ProfileRed,
    ProfileGreen,
    ProfileBlue,
}

pub const RAZER_VENDOR_ID: u16 = 0x1532;

/// A single matrix coordinate, `(row, col)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub row: usize,
    pub col: usize,
}

/// A named lighting region spanning a rectangular sub-area of the matrix
/// (e.g. a mousepad's individually addressable edge segments).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub origin: Point,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub manufacturer: String,
    pub device_type: DeviceType,
    pub vendor_id: u16,
    pub product_id: u16,
    pub revision: u32,
    pub matrix: Option<MatrixDimensions>,
    pub supported_fx: Vec<crate::fx::Fx>,
    #[serde(default)]
    pub quirks: Quirks,
    pub supported_leds: Vec<LedKind>,
    pub is_wireless: bool,
    /// Named lighting regions within the matrix (keyboards with addressable
    /// zones beyond the raw row/col grid, mousepads' edge segments, etc).
    #[serde(default)]
    pub zones: Vec<Zone>,
    /// Logical key name to matrix coordinate(s); a key can light more than
    /// one matrix cell (e.g. a spacebar spanning several columns).
    #[serde(default)]
    pub key_mapping: HashMap<String, Vec<Point>>,
}

impl DeviceDescriptor {
    pub fn has_matrix(&self) -> bool {
        self.matrix.is_some()
    }

    pub fn has_quirk(&self, quirk: Quirks) -> bool {
        self.quirks.contains(quirk)
    }
}

impl LedKind {
    /// The wire byte identifying this LED to the `(0x03, ...)` LED command
    /// family.
    pub const fn opcode(self) -> u8 {
        match self {
            LedKind::ScrollWheel => 0x01,
            LedKind::Battery => 0x03,
            LedKind::Logo => 0x04,
            LedKind::Backlight => 0x05,
            LedKind::Macro => 0x07,
            LedKind::Game => 0x08,
            LedKind::ProfileGreen => 0x0C,
            LedKind::ProfileBlue => 0x0D,
            LedKind::ProfileRed => 0x0E,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_numbers_match_protocol_table() {
        assert_eq!(DeviceType::Headset.interface_number(), 3);
        assert_eq!(DeviceType::Keyboard.interface_number(), 2);
        assert_eq!(DeviceType::Laptop.interface_number(), 2);
        assert_eq!(DeviceType::Mousepad.interface_number(), 1);
        assert_eq!(DeviceType::Mouse.interface_number(), 0);
    }
}
