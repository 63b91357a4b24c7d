//! Control library for Razer Chroma USB HID lighting peripherals: wire
//! protocol codec, transport, per-device command surface, and a layered
//! animation pipeline. See `SPEC_FULL.md` for the protocol reference.

pub mod animation;
pub mod blend;
pub mod color;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod frame;
pub mod fx;
pub mod headset;
pub mod input;
pub mod layer;
pub mod led;
pub mod quirk;
pub mod report;
pub mod runner;
pub mod transport;
pub mod util;

pub use descriptor::{DeviceDescriptor, DeviceType};
pub use device::Device;
pub use error::{Result, UchromaError};
pub use headset::Headset;
