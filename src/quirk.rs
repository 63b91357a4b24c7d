/* Device-specific protocol deviations. A device's `Quirks` set is consulted
 * by the command layer to adjust transaction codes, command classes, and
 * brightness surrogates without special-casing individual models. */

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Quirks: u16 {
        /// Always use transaction code 0x3F.
        const TRANSACTION_CODE_3F     = 1 << 0;
        /// Use the "extended" effect command class (0x0F, 0x02).
        const EXTENDED_FX_CMDS        = 1 << 1;
        /// Control device brightness through the scroll wheel LED.
        const SCROLL_WHEEL_BRIGHTNESS = 1 << 2;
        /// Device has charge and dock controls.
        const WIRELESS                = 1 << 3;
        /// Needs transaction code 0x80 for custom frame data.
        const CUSTOM_FRAME_80         = 1 << 4;
        /// Control device brightness through the logo LED.
        const LOGO_LED_BRIGHTNESS     = 1 << 5;
        /// Device has individual "profile" LEDs.
        const PROFILE_LEDS            = 1 << 6;
        /// Device only supports the spectrum effect on the backlight LED.
        const BACKLIGHT_LED_FX_ONLY   = 1 << 7;
    }
}

impl Quirks {
    /// Resolve the transaction id to use for a standard command, honoring
    /// `TRANSACTION_CODE_3F`.
    pub fn default_transaction_id(self) -> u8 {
        if self.contains(Quirks::TRANSACTION_CODE_3F) {
            0x3F
        } else {
            0xFF
        }
    }

    /// Resolve the transaction id for a custom-frame row upload, honoring
    /// `CUSTOM_FRAME_80`.
    pub fn frame_transaction_id(self) -> u8 {
        if self.contains(Quirks::CUSTOM_FRAME_80) {
            0x80
        } else {
            self.default_transaction_id()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_code_quirk_overrides_default() {
        assert_eq!(Quirks::empty().default_transaction_id(), 0xFF);
        assert_eq!(
            Quirks::TRANSACTION_CODE_3F.default_transaction_id(),
            0x3F
        );
    }

    #[test]
    fn custom_frame_80_quirk_overrides_frame_transaction() {
        assert_eq!(Quirks::empty().frame_transaction_id(), 0xFF);
        assert_eq!(Quirks::CUSTOM_FRAME_80.frame_transaction_id(), 0x80);
        assert_eq!(
            (Quirks::CUSTOM_FRAME_80 | Quirks::TRANSACTION_CODE_3F).frame_transaction_id(),
            0x80
        );
    }
}
