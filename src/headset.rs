/* Headset variant: a different wire framing entirely from the standard
 * 90-byte protocol. Out-report 4 / in-report 5, 37-byte outbound frames, no
 * checksum, and address-based reads/writes into fixed RAM/EEPROM locations
 * rather than the class/id command table. Grounded on the original
 * source's `headset.py`. */

use std::sync::Arc;
use std::time::Duration;

use crate::color::Rgb;
use crate::error::{Result, UchromaError};
use crate::transport::{HidTransport, Session, HEADSET_INTER_COMMAND_DELAY};
use crate::util::{self, set_bit, test_bit};

pub const REPORT_ID_OUT: u8 = 4;
pub const REPORT_ID_IN: u8 = 5;
pub const REPORT_LENGTH_OUT: usize = 37;
pub const REPORT_LENGTH_IN: usize = 33;

const READ_RAM: u8 = 0x00;
const READ_EEPROM: u8 = 0x20;
const WRITE_RAM: u8 = 0x40;

const ADDR_FIRMWARE_VERSION: u16 = 0x0030;
const ADDR_SERIAL_NUMBER: u16 = 0x7f00;

const ADDR_KYLIE_LED_MODE: u16 = 0x172D;
const ADDR_KYLIE_BREATHING1_START: u16 = 0x1741;
const ADDR_KYLIE_BREATHING2_START: u16 = 0x1745;
const ADDR_KYLIE_BREATHING3_START: u16 = 0x174D;

const ADDR_RAINIE_LED_MODE: u16 = 0x1008;
const ADDR_RAINIE_BREATHING1_START: u16 = 0x15DE;

/// `(destination, length, address)`: where a headset command reads from or
/// writes to, and how many bytes are involved.
#[derive(Debug, Clone, Copy)]
struct HeadsetCommand {
    destination: u8,
    length: u8,
    address: u16,
}

const GET_SERIAL: HeadsetCommand = HeadsetCommand { destination: READ_EEPROM, length: 0x16, address: ADDR_SERIAL_NUMBER };
const GET_FIRMWARE_VERSION: HeadsetCommand = HeadsetCommand { destination: READ_EEPROM, length: 0x02, address: ADDR_FIRMWARE_VERSION };

const KYLIE_GET_LED_MODE: HeadsetCommand = HeadsetCommand { destination: READ_RAM, length: 0x01, address: ADDR_KYLIE_LED_MODE };
const KYLIE_SET_LED_MODE: HeadsetCommand = HeadsetCommand { destination: WRITE_RAM, length: 0x01, address: ADDR_KYLIE_LED_MODE };
const KYLIE_GET_RGB: [HeadsetCommand; 3] = [
    HeadsetCommand { destination: READ_RAM, length: 0x04, address: ADDR_KYLIE_BREATHING1_START },
    HeadsetCommand { destination: READ_RAM, length: 0x08, address: ADDR_KYLIE_BREATHING2_START },
    HeadsetCommand { destination: READ_RAM, length: 0x0C, address: ADDR_KYLIE_BREATHING3_START },
];
const KYLIE_SET_RGB: [HeadsetCommand; 3] = [
    HeadsetCommand { destination: WRITE_RAM, length: 0x04, address: ADDR_KYLIE_BREATHING1_START },
    HeadsetCommand { destination: WRITE_RAM, length: 0x08, address: ADDR_KYLIE_BREATHING2_START },
    HeadsetCommand { destination: WRITE_RAM, length: 0x0C, address: ADDR_KYLIE_BREATHING3_START },
];

const RAINIE_GET_LED_MODE: HeadsetCommand = HeadsetCommand { destination: READ_RAM, length: 0x01, address: ADDR_RAINIE_LED_MODE };
const RAINIE_SET_LED_MODE: HeadsetCommand = HeadsetCommand { destination: WRITE_RAM, length: 0x01, address: ADDR_RAINIE_LED_MODE };
/* The original source uses WRITE_RAM for both the get and set RGB
 * commands on v1 hardware; kept as-is since it's the address actually
 * polled by real devices. */
const RAINIE_RGB: HeadsetCommand = HeadsetCommand { destination: WRITE_RAM, length: 0x04, address: ADDR_RAINIE_BREATHING1_START };

/// The headset's lighting-mode byte, bit for bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectBits {
    pub on: bool,
    pub breathe_single: bool,
    pub spectrum: bool,
    pub sync: bool,
    pub breathe_double: bool,
    pub breathe_triple: bool,
}

impl EffectBits {
    pub fn from_byte(value: u8) -> Self {
        Self {
            on: test_bit(value, 0),
            breathe_single: test_bit(value, 1),
            spectrum: test_bit(value, 2),
            sync: test_bit(value, 3),
            breathe_double: test_bit(value, 4),
            breathe_triple: test_bit(value, 5),
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = 0u8;
        byte = set_bit(byte, 0, self.on);
        byte = set_bit(byte, 1, self.breathe_single);
        byte = set_bit(byte, 2, self.spectrum);
        byte = set_bit(byte, 3, self.sync);
        byte = set_bit(byte, 4, self.breathe_double);
        byte = set_bit(byte, 5, self.breathe_triple);
        byte
    }

    /// How many color-table entries are active under the current mode.
    pub fn color_count(self) -> usize {
        if self.breathe_triple {
            3
        } else if self.breathe_double {
            2
        } else if self.breathe_single || self.on {
            1
        } else {
            0
        }
    }
}

/// Pack `{destination, length, address(be), ...args}` into a fixed
/// 37-byte outbound frame, zero-padded. No checksum.
fn pack_request(command: HeadsetCommand, args: &[u8]) -> [u8; REPORT_LENGTH_OUT] {
    let mut buf = [0u8; REPORT_LENGTH_OUT];
    buf[0] = command.destination;
    buf[1] = command.length;
    buf[2..4].copy_from_slice(&command.address.to_be_bytes());
    let n = args.len().min(REPORT_LENGTH_OUT - 4);
    buf[4..4 + n].copy_from_slice(&args[..n]);
    buf
}

/// A Chroma headset: v1 ("Rainie") or v2 ("Kylie") hardware, distinguished
/// by the descriptor's revision number and addressing a different RAM
/// table accordingly.
pub struct Headset {
    session: Arc<Session>,
    get_led: HeadsetCommand,
    set_led: HeadsetCommand,
    get_rgb: Vec<HeadsetCommand>,
    set_rgb: Vec<HeadsetCommand>,
}

impl Headset {
    pub fn new(revision: u32, transport: Box<dyn HidTransport>) -> Result<Self> {
        let (get_led, set_led, get_rgb, set_rgb) = match revision {
            1 => (RAINIE_GET_LED_MODE, RAINIE_SET_LED_MODE, vec![RAINIE_RGB], vec![RAINIE_RGB]),
            2 => (
                KYLIE_GET_LED_MODE,
                KYLIE_SET_LED_MODE,
                KYLIE_GET_RGB.to_vec(),
                KYLIE_SET_RGB.to_vec(),
            ),
            other => {
                return Err(UchromaError::BadArgument(format!(
                    "unsupported headset hardware revision {other}"
                )))
            }
        };

        Ok(Self {
            session: Arc::new(Session::new(transport, HEADSET_INTER_COMMAND_DELAY)),
            get_led,
            set_led,
            get_rgb,
            set_rgb,
        })
    }

    async fn run_with_result(&self, command: HeadsetCommand, args: &[u8]) -> Result<Vec<u8>> {
        let packed = pack_request(command, args);
        /* No separate post-write settle sleep for headsets beyond the
         * mandatory 25 ms inter-command spacing `Session` already enforces
         * before the write. */
        let response = self
            .session
            .exchange(
                REPORT_ID_OUT,
                &packed,
                REPORT_ID_IN,
                REPORT_LENGTH_IN,
                Duration::ZERO,
            )
            .await?;
        let len = command.length as usize;
        if response.len() < 1 + len {
            return Err(UchromaError::BadLength {
                expected: 1 + len,
                actual: response.len(),
            });
        }
        /* Byte 0 of the useful in-frame payload is a report-id echo;
         * the command's actual result starts at offset 1. */
        Ok(response[1..1 + len].to_vec())
    }

    async fn run_command(&self, command: HeadsetCommand, args: &[u8]) -> Result<()> {
        self.run_with_result(command, args).await.map(|_| ())
    }

    pub async fn firmware_version(&self) -> Result<Vec<u8>> {
        self.run_with_result(GET_FIRMWARE_VERSION, &[]).await
    }

    pub async fn serial_number(&self) -> Result<String> {
        let raw = self.run_with_result(GET_SERIAL, &[]).await?;
        Ok(String::from_utf8_lossy(&raw)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect())
    }

    pub async fn current_effect(&self) -> Result<EffectBits> {
        let value = self.run_with_result(self.get_led, &[]).await?;
        Ok(EffectBits::from_byte(value.first().copied().unwrap_or(0)))
    }

    async fn set_led_mode(&self, bits: EffectBits) -> Result<()> {
        self.run_command(self.set_led, &[bits.to_byte()]).await
    }

    /// The colors currently active in the breathing color table, one per
    /// active slot (1-3 depending on mode).
    pub async fn current_colors(&self) -> Result<Vec<Rgb>> {
        let bits = self.current_effect().await?;
        let count = bits.color_count();
        if count == 0 {
            return Ok(vec![]);
        }
        let value = self.run_with_result(self.get_rgb[count - 1], &[]).await?;
        Ok(value.chunks_exact(4).map(|c| Rgb::new(c[0], c[1], c[2])).collect())
    }

    pub async fn brightness(&self) -> Result<u8> {
        let bits = self.current_effect().await?;
        let count = bits.color_count();
        if count == 0 {
            return Ok(if bits.on { 100 } else { 0 });
        }
        let value = self.run_with_result(self.get_rgb[count - 1], &[]).await?;
        Ok(util::unscale_brightness(value.get(3).copied().unwrap_or(0)))
    }

    /// Rewrites only the brightness byte of each active color-table entry.
    pub async fn set_brightness(&self, pct: u8) -> Result<()> {
        let bits = self.current_effect().await?;
        let count = bits.color_count();
        if count == 0 {
            return Err(UchromaError::Unsupported);
        }
        let mut value = self.run_with_result(self.get_rgb[count - 1], &[]).await?;
        let level = util::scale_brightness(pct);
        for n in 0..count {
            if let Some(byte) = value.get_mut(n * 4 + 3) {
                *byte = level;
            }
        }
        self.run_command(self.set_rgb[count - 1], &value).await
    }

    /// Writes only the color table matching `colors.len()`, each entry
    /// `(r, g, b, brightness)`. Falls back to the current brightness (or
    /// 80% if currently off) when `brightness` is `None`.
    async fn write_colors(&self, colors: &[Rgb], brightness: Option<u8>) -> Result<()> {
        if colors.is_empty() || colors.len() > self.set_rgb.len() {
            return Err(UchromaError::BadArgument(format!(
                "headset supports 1..{} colors, got {}",
                self.set_rgb.len(),
                colors.len()
            )));
        }

        let pct = match brightness {
            Some(pct) => pct,
            None => match self.brightness().await {
                Ok(0) => 80,
                Ok(pct) => pct,
                Err(_) => 80,
            },
        };
        let level = util::scale_brightness(pct);

        let mut args = Vec::with_capacity(colors.len() * 4);
        for color in colors {
            args.extend_from_slice(&color.to_bytes());
            args.push(level);
        }

        self.run_command(self.set_rgb[colors.len() - 1], &args).await
    }

    pub async fn disable(&self) -> Result<()> {
        self.set_led_mode(EffectBits {
            spectrum: true,
            ..Default::default()
        })
        .await
    }

    pub async fn spectrum(&self) -> Result<()> {
        self.set_led_mode(EffectBits {
            on: true,
            spectrum: true,
            ..Default::default()
        })
        .await
    }

    pub async fn set_static(&self, color: Rgb) -> Result<()> {
        self.write_colors(&[color], None).await?;
        self.set_led_mode(EffectBits {
            on: true,
            ..Default::default()
        })
        .await
    }

    /// Breathing effect across 1-3 colors (3 requires v2/"Kylie" hardware).
    pub async fn breathe(&self, colors: &[Rgb]) -> Result<()> {
        if colors.is_empty() || colors.len() > 3 {
            return Err(UchromaError::BadArgument(
                "breathe accepts between 1 and 3 colors".into(),
            ));
        }
        self.write_colors(colors, None).await?;

        let mut bits = EffectBits {
            on: true,
            sync: true,
            ..Default::default()
        };
        match colors.len() {
            3 => bits.breathe_triple = true,
            2 => bits.breathe_double = true,
            1 => bits.breathe_single = true,
            _ => unreachable!(),
        }
        self.set_led_mode(bits).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockExchange, MockTransport};

    /// Build a scripted in-frame: byte 0 is the report-id echo (arbitrary
    /// here), followed by `payload`, padded to the full in-frame length.
    fn response_for(payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![REPORT_ID_IN];
        buf.extend_from_slice(payload);
        buf.resize(REPORT_LENGTH_IN, 0);
        buf
    }

    #[tokio::test]
    fn effect_bits_triple_breathe_byte_matches_scenario() {
        let bits = EffectBits {
            on: true,
            sync: true,
            breathe_triple: true,
            ..Default::default()
        };
        assert_eq!(bits.to_byte(), 0x29);
    }

    #[tokio::test]
    async fn current_effect_decodes_led_mode_byte() {
        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: REPORT_ID_OUT,
            response_report_id: REPORT_ID_IN,
            response: response_for(&[0x29]),
        });
        let headset = Headset::new(2, Box::new(mock)).unwrap();
        let bits = headset.current_effect().await.unwrap();
        assert!(bits.on);
        assert!(bits.sync);
        assert!(bits.breathe_triple);
        assert_eq!(bits.color_count(), 3);
    }

    #[tokio::test]
    async fn current_colors_groups_into_rgb_brightness_quads() {
        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: REPORT_ID_OUT,
            response_report_id: REPORT_ID_IN,
            response: response_for(&[0x01]), // on, color_count=1
        });
        mock.expect(MockExchange {
            expect_report_id: REPORT_ID_OUT,
            response_report_id: REPORT_ID_IN,
            response: response_for(&[10, 20, 30, 0xFF]),
        });
        let headset = Headset::new(2, Box::new(mock)).unwrap();
        let colors = headset.current_colors().await.unwrap();
        assert_eq!(colors, vec![Rgb::new(10, 20, 30)]);
    }

    #[tokio::test]
    async fn rejects_unsupported_hardware_revision() {
        let mock = MockTransport::new();
        assert!(Headset::new(3, Box::new(mock)).is_err());
    }

    #[tokio::test]
    async fn breathe_rejects_more_than_three_colors() {
        let mock = MockTransport::new();
        let headset = Headset::new(2, Box::new(mock)).unwrap();
        let colors = vec![Rgb::BLACK; 4];
        assert!(headset.breathe(&colors).await.is_err());
    }
}
