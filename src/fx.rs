/* Lighting effect opcodes and their argument-building rules.
 *
 * Every opcode the firmware protocol understands is enumerated in `Fx`
 * (see SPEC_FULL.md §3a); only the subset with a documented argument shape
 * gets a dedicated typed builder below (`EffectArgs`). Anything else goes
 * through `set_effect_raw` on the device object with caller-supplied bytes. */

use crate::color::Rgb;
use crate::error::{Result, UchromaError};
use crate::report::{ArgBuilder, Command};
use serde::{Deserialize, Serialize};

/// The "set effect (basic)" command class/id, used by every effect builder
/// in this module including custom-frame activation.
pub const SET_EFFECT: Command = Command::variable(0x03, 0x0A);

/// The "set effect (extended)" command class/id, used iff the device has
/// the `EXTENDED_FX_CMDS` quirk.
pub const SET_EFFECT_EXTENDED: Command = Command::variable(0x0F, 0x02);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fx {
    Disable,
    Wave,
    Reactive,
    Breathe,
    Spectrum,
    CustomFrame,
    Static,
    Gradient,
    Sweep,
    Circle,
    Highlight,
    Morph,
    Fire,
    RippleSolid,
    Ripple,
    Starlight,
    SpectrumBlade,
    Alignment,
    Rainbow,
}

impl Fx {
    pub const fn opcode(self) -> u8 {
        match self {
            Fx::Disable => 0x00,
            Fx::Wave => 0x01,
            Fx::Reactive => 0x02,
            Fx::Breathe => 0x03,
            Fx::Spectrum => 0x04,
            Fx::CustomFrame => 0x05,
            Fx::Static => 0x06,
            Fx::Gradient => 0x0A,
            Fx::Sweep => 0x0C,
            Fx::Circle => 0x0D,
            Fx::Highlight => 0x10,
            Fx::Morph => 0x11,
            Fx::Fire => 0x12,
            Fx::RippleSolid => 0x13,
            Fx::Ripple => 0x14,
            Fx::Starlight => 0x19,
            Fx::SpectrumBlade => 0x1C,
            Fx::Alignment => 0xFE,
            Fx::Rainbow => 0xFF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Right = 1,
    Left = 2,
    LeftChase = 3,
    RightChase = 4,
}

/// The computed mode byte for multi-color effects (breathe, starlight).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiMode {
    Random = 0,
    Single = 1,
    Dual = 2,
}

impl MultiMode {
    pub fn from_colors(c1: Option<Rgb>, c2: Option<Rgb>) -> Self {
        match (c1, c2) {
            (Some(_), Some(_)) => MultiMode::Dual,
            (Some(_), None) => MultiMode::Single,
            (None, _) => MultiMode::Random,
        }
    }
}

/// Validate an effect speed, used by reactive/sweep/morph/fire/ripple.
pub fn validate_speed(speed: u8) -> Result<u8> {
    if (1..=4).contains(&speed) {
        Ok(speed)
    } else {
        Err(UchromaError::BadArgument(format!(
            "speed {speed} out of range 1..4"
        )))
    }
}

/// Builds the payload for `static(rgb)`.
pub fn static_color(rgb: Rgb) -> Result<Vec<u8>> {
    let mut args = ArgBuilder::new(Some(4));
    args.u8(Fx::Static.opcode())?.rgb(rgb)?;
    Ok(args.into_bytes())
}

/// Builds the payload for `wave(direction)`.
pub fn wave(direction: Direction) -> Result<Vec<u8>> {
    let mut args = ArgBuilder::new(None);
    args.u8(Fx::Wave.opcode())?.u8(direction as u8)?;
    Ok(args.into_bytes())
}

/// Builds the payload for `spectrum()`.
pub fn spectrum() -> Vec<u8> {
    vec![Fx::Spectrum.opcode()]
}

/// Builds the payload for `disable()`.
pub fn disable() -> Vec<u8> {
    vec![Fx::Disable.opcode()]
}

/// Builds the payload for `reactive(speed, rgb)`, rejecting out-of-range speed.
pub fn reactive(speed: u8, rgb: Rgb) -> Result<Vec<u8>> {
    let speed = validate_speed(speed)?;
    let mut args = ArgBuilder::new(None);
    args.u8(Fx::Reactive.opcode())?.u8(speed)?.rgb(rgb)?;
    Ok(args.into_bytes())
}

/// Builds the payload for a multi-mode effect (breathe/starlight):
/// `{effect, mode, [speed]?, [rgb1]?, [rgb2]?}`.
pub fn multi_mode(effect: Fx, speed: Option<u8>, c1: Option<Rgb>, c2: Option<Rgb>) -> Result<Vec<u8>> {
    let mode = MultiMode::from_colors(c1, c2);
    let mut args = ArgBuilder::new(None);
    args.u8(effect.opcode())?.u8(mode as u8)?;
    if let Some(speed) = speed {
        args.u8(validate_speed(speed)?)?;
    }
    if let Some(c1) = c1 {
        args.rgb(c1)?;
    }
    if let Some(c2) = c2 {
        args.rgb(c2)?;
    }
    Ok(args.into_bytes())
}

/// Builds the payload for `sweep(direction, speed, base_rgb, rgb)`.
pub fn sweep(direction: Direction, speed: u8, base_rgb: Rgb, rgb: Rgb) -> Result<Vec<u8>> {
    let speed = validate_speed(speed)?;
    let mut args = ArgBuilder::new(None);
    args.u8(Fx::Sweep.opcode())?
        .u8(direction as u8)?
        .u8(speed)?
        .rgb(base_rgb)?
        .rgb(rgb)?;
    Ok(args.into_bytes())
}

/// Builds the payload for `morph(speed, base_rgb, rgb)`.
pub fn morph(speed: u8, base_rgb: Rgb, rgb: Rgb) -> Result<Vec<u8>> {
    let speed = validate_speed(speed)?;
    let mut args = ArgBuilder::new(None);
    args.u8(Fx::Morph.opcode())?
        .u8(0x04)?
        .u8(speed)?
        .rgb(base_rgb)?
        .rgb(rgb)?;
    Ok(args.into_bytes())
}

/// Builds the payload for `fire(speed, rgb)`.
pub fn fire(speed: u8, rgb: Rgb) -> Result<Vec<u8>> {
    let speed = validate_speed(speed)?;
    let mut args = ArgBuilder::new(None);
    args.u8(Fx::Fire.opcode())?.u8(0x01)?.u8(speed)?.rgb(rgb)?;
    Ok(args.into_bytes())
}

/// Builds the payload for `ripple(solid, speed, rgb)`. `speed` is the raw
/// 1..4 speed value; the wire payload carries `speed * 10`.
pub fn ripple(solid: bool, speed: u8, rgb: Rgb) -> Result<Vec<u8>> {
    let speed = validate_speed(speed)?;
    let effect = if solid { Fx::RippleSolid } else { Fx::Ripple };
    let mut args = ArgBuilder::new(None);
    args.u8(effect.opcode())?.u8(0x01)?.u8(speed * 10)?.rgb(rgb)?;
    Ok(args.into_bytes())
}

/// Builds the payload for `custom_frame_activate(varstore)`.
pub fn custom_frame_activate(varstore: u8) -> Vec<u8> {
    vec![Fx::CustomFrame.opcode(), varstore]
}

/// Opcode an effect takes on `SET_EFFECT_EXTENDED`, which numbers a handful
/// of effects differently from the basic `SET_EFFECT` table. Effects with no
/// extended counterpart return `None`; devices with `EXTENDED_FX_CMDS` don't
/// support them.
pub const fn extended_opcode(fx: Fx) -> Option<u8> {
    match fx {
        Fx::Disable => Some(0x00),
        Fx::Static => Some(0x01),
        Fx::Breathe => Some(0x02),
        Fx::Spectrum => Some(0x03),
        Fx::Wave => Some(0x04),
        Fx::Reactive => Some(0x05),
        Fx::Starlight => Some(0x07),
        Fx::CustomFrame => Some(0x08),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_red_matches_scenario() {
        let payload = static_color(Rgb::new(0xFF, 0, 0)).unwrap();
        assert_eq!(payload, vec![0x06, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn breathe_dual_matches_scenario() {
        let payload = multi_mode(
            Fx::Breathe,
            None,
            Some(Rgb::new(10, 20, 30)),
            Some(Rgb::new(40, 50, 60)),
        )
        .unwrap();
        assert_eq!(payload, vec![0x03, 0x02, 10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn multi_mode_byte_by_color_combination() {
        assert_eq!(MultiMode::from_colors(None, None), MultiMode::Random);
        assert_eq!(
            MultiMode::from_colors(Some(Rgb::BLACK), None),
            MultiMode::Single
        );
        assert_eq!(
            MultiMode::from_colors(Some(Rgb::BLACK), Some(Rgb::BLACK)),
            MultiMode::Dual
        );
    }

    #[test]
    fn reactive_rejects_out_of_range_speed() {
        assert!(reactive(0, Rgb::BLACK).is_err());
        assert!(reactive(5, Rgb::BLACK).is_err());
        for speed in 1..=4 {
            assert!(reactive(speed, Rgb::BLACK).is_ok());
        }
    }

    #[test]
    fn ripple_speed_is_multiplied_by_ten() {
        let payload = ripple(false, 2, Rgb::new(1, 2, 3)).unwrap();
        assert_eq!(payload, vec![0x14, 0x01, 20, 1, 2, 3]);
    }

    #[test]
    fn custom_frame_activation_payload() {
        assert_eq!(custom_frame_activate(1), vec![0x05, 0x01]);
    }
}
