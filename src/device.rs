/* The device object: wraps a `Session` + `Quirks` pair with every command
 * the standard (non-headset) wire protocol understands -- identity,
 * per-LED state, device-wide brightness, lighting effects, and the
 * wireless-mouse command family. Callers get a cheap handle and every
 * command serializes through the owned session. */

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::animation::AnimationManager;
use crate::color::Rgb;
use crate::descriptor::{DeviceDescriptor, DeviceType, LedKind};
use crate::error::{Result, UchromaError};
use crate::fx::{self, Direction, Fx};
use crate::frame::FrameBuffer;
use crate::input::InputTap;
use crate::led::{LedMode, LedState};
use crate::report::{ArgBuilder, Command};
use crate::runner::ReportRunner;
use crate::transport::{HidTransport, Session, DEFAULT_INTER_COMMAND_DELAY};
use crate::util;

const GET_FIRMWARE_VERSION: Command = Command::new(0x00, 0x81, 2);
const GET_SERIAL: Command = Command::new(0x00, 0x82, 22);
const GET_DEVICE_MODE: Command = Command::new(0x00, 0x84, 2);
const SET_DEVICE_MODE: Command = Command::new(0x00, 0x04, 2);

const SET_LED_STATE: Command = Command::new(0x03, 0x00, 3);
const SET_LED_COLOR: Command = Command::new(0x03, 0x01, 5);
const SET_LED_MODE: Command = Command::new(0x03, 0x02, 3);
const SET_LED_BRIGHTNESS: Command = Command::new(0x03, 0x03, 3);
const GET_LED_STATE: Command = Command::new(0x03, 0x80, 3);
const GET_LED_COLOR: Command = Command::new(0x03, 0x81, 5);
const GET_LED_MODE: Command = Command::new(0x03, 0x82, 3);
const GET_LED_BRIGHTNESS: Command = Command::new(0x03, 0x83, 3);

const SET_BLADE_BRIGHTNESS: Command = Command::new(0x0E, 0x04, 2);
const GET_BLADE_BRIGHTNESS: Command = Command::new(0x0E, 0x84, 2);

const SET_POLLING_RATE: Command = Command::new(0x00, 0x05, 1);
const GET_POLLING_RATE: Command = Command::new(0x00, 0x85, 1);
const SET_DPI_XY: Command = Command::variable(0x04, 0x05);
const GET_DPI_XY: Command = Command::variable(0x04, 0x85);
const SET_IDLE_TIME: Command = Command::new(0x07, 0x03, 2);
const SET_DOCK_CHARGE_EFFECT: Command = Command::new(0x03, 0x10, 1);
const SET_DOCK_BRIGHTNESS: Command = Command::new(0x07, 0x02, 1);
const GET_DOCK_BRIGHTNESS: Command = Command::new(0x07, 0x82, 1);
const SET_LOW_BATTERY_THRESHOLD: Command = Command::new(0x07, 0x01, 1);
const GET_BATTERY_LEVEL: Command = Command::new(0x07, 0x80, 2);
const GET_CHARGING_STATUS: Command = Command::new(0x07, 0x84, 2);

const DEFAULT_FPS: u32 = 15;

/// The three polling rates a wired or wireless mouse can be set to. Named
/// by the rate itself rather than the byte value (the original source
/// calls 125 Hz "MHZ_128", which is simply wrong).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingRate {
    Hz1000 = 0x01,
    Hz500 = 0x02,
    Hz125 = 0x08,
}

impl PollingRate {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(PollingRate::Hz1000),
            0x02 => Some(PollingRate::Hz500),
            0x08 => Some(PollingRate::Hz125),
            _ => None,
        }
    }
}

/// A standard-protocol Razer Chroma device: identity, LEDs, effects,
/// optional frame buffer + animation pipeline, and (for mice) polling
/// rate / DPI / wireless battery controls.
pub struct Device {
    pub descriptor: DeviceDescriptor,
    session: Arc<Session>,
    leds: Mutex<HashMap<LedKind, LedState>>,
    offline: AtomicBool,
    frame: Option<Arc<Mutex<FrameBuffer>>>,
    animation: Option<Arc<AnimationManager>>,
    input: Arc<InputTap>,
}

impl Device {
    pub fn new(descriptor: DeviceDescriptor, transport: Box<dyn HidTransport>) -> Self {
        let session = Arc::new(Session::new(transport, DEFAULT_INTER_COMMAND_DELAY));
        let input = Arc::new(InputTap::new());

        let (frame, animation) = match descriptor.matrix {
            Some(dims) => (
                Some(Arc::new(Mutex::new(FrameBuffer::new(dims.rows, dims.cols)))),
                Some(Arc::new(AnimationManager::new(
                    dims.cols,
                    dims.rows,
                    DEFAULT_FPS,
                    Arc::clone(&input),
                ))),
            ),
            None => (None, None),
        };

        let leds = descriptor
            .supported_leds
            .iter()
            .map(|&kind| (kind, LedState::new(kind)))
            .collect();

        Self {
            descriptor,
            session,
            leds: Mutex::new(leds),
            offline: AtomicBool::new(false),
            frame,
            animation,
            input,
        }
    }

    fn runner(&self) -> ReportRunner<'_> {
        ReportRunner::new(&self.session, self.descriptor.quirks)
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    pub fn has_matrix(&self) -> bool {
        self.frame.is_some()
    }

    pub fn frame(&self) -> Option<Arc<Mutex<FrameBuffer>>> {
        self.frame.clone()
    }

    pub fn animation(&self) -> Option<Arc<AnimationManager>> {
        self.animation.clone()
    }

    /// A handle renderers can subscribe to for key events from this
    /// device's input node(s).
    pub fn input_tap(&self) -> Arc<InputTap> {
        Arc::clone(&self.input)
    }

    /// Start the animation loop. Requires `self` to be held as an `Arc`
    /// since the spawned loop task outlives this call.
    pub async fn start_animation(self: &Arc<Self>) -> Result<()> {
        let (frame, animation) = match (&self.frame, &self.animation) {
            (Some(f), Some(a)) => (f.clone(), a.clone()),
            _ => return Err(UchromaError::Unsupported),
        };
        animation
            .start(
                Arc::clone(&self.session),
                self.descriptor.quirks,
                self.descriptor.device_type,
                frame,
            )
            .await
    }

    pub async fn stop_animation(&self) {
        if let Some(animation) = &self.animation {
            animation.stop().await;
        }
    }

    /// Run a command, routing timeouts through the wireless offline
    /// tracker for wireless devices: the first successful exchange after an
    /// observed timeout forces the handle closed so the next command
    /// reopens it cleanly rather than reusing a handle the device may have
    /// reset behind our back.
    async fn run_tracked(
        &self,
        command: Command,
        args: Vec<u8>,
        transaction_id: Option<u8>,
    ) -> Result<Vec<u8>> {
        if !self.descriptor.is_wireless {
            return self.runner().run(command, args, transaction_id, None, None).await;
        }

        let was_offline = self.is_offline();
        let mut mark_offline = || self.offline.store(true, Ordering::SeqCst);
        let result = self
            .runner()
            .run(command, args, transaction_id, None, Some(&mut mark_offline))
            .await;

        if result.is_ok() && was_offline {
            self.offline.store(false, Ordering::SeqCst);
            self.session.force_close().await?;
        }

        result
    }

    // -- identity ---------------------------------------------------------

    pub async fn firmware_version(&self) -> Result<(u8, u8)> {
        let payload = self.run_tracked(GET_FIRMWARE_VERSION, vec![], None).await?;
        if payload.len() < 2 {
            return Err(UchromaError::BadLength {
                expected: 2,
                actual: payload.len(),
            });
        }
        Ok((payload[0], payload[1]))
    }

    pub async fn firmware_version_string(&self) -> Result<String> {
        let (major, minor) = self.firmware_version().await?;
        Ok(format!("v{major}.{minor}"))
    }

    /// Razer serials are ASCII, trimmed of everything but word characters.
    /// Laptops report their catalog name instead of round-tripping to
    /// hardware (there's no serial command for that family).
    pub async fn serial_number(&self) -> Result<String> {
        if self.descriptor.device_type == DeviceType::Laptop {
            return Ok(self.descriptor.name.clone());
        }
        let payload = self.run_tracked(GET_SERIAL, vec![], None).await?;
        let raw = String::from_utf8_lossy(&payload);
        Ok(raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect())
    }

    pub async fn device_mode(&self) -> Result<(u8, u8)> {
        let payload = self.run_tracked(GET_DEVICE_MODE, vec![], None).await?;
        if payload.len() < 2 {
            return Err(UchromaError::BadLength {
                expected: 2,
                actual: payload.len(),
            });
        }
        Ok((payload[0], payload[1]))
    }

    pub async fn set_device_mode(&self, mode: u8, param: u8) -> Result<()> {
        let mut args = ArgBuilder::new(Some(2));
        args.u8(mode)?.u8(param)?;
        self.run_tracked(SET_DEVICE_MODE, args.into_bytes(), None).await?;
        Ok(())
    }

    // -- LEDs ---------------------------------------------------------------

    async fn led_command(&self, kind: LedKind, command: Command, extra: &[u8]) -> Result<Vec<u8>> {
        let mut args = ArgBuilder::new(None);
        args.u8(0x01)?.u8(kind.opcode())?.raw(extra)?;
        self.run_tracked(command, args.into_bytes(), None).await
    }

    pub async fn led_state(&self, kind: LedKind) -> Result<bool> {
        let payload = self.led_command(kind, GET_LED_STATE, &[]).await?;
        Ok(payload.get(2).copied().unwrap_or(0) != 0)
    }

    pub async fn set_led_state(&self, kind: LedKind, on: bool) -> Result<()> {
        self.led_command(kind, SET_LED_STATE, &[on as u8]).await?;
        let mut leds = self.leds.lock().await;
        leds.entry(kind).or_insert_with(|| LedState::new(kind)).on = on;
        Ok(())
    }

    pub async fn led_color(&self, kind: LedKind) -> Result<Rgb> {
        let payload = self.led_command(kind, GET_LED_COLOR, &[]).await?;
        if payload.len() < 5 {
            return Err(UchromaError::BadLength {
                expected: 5,
                actual: payload.len(),
            });
        }
        Ok(Rgb::new(payload[2], payload[3], payload[4]))
    }

    pub async fn set_led_color(&self, kind: LedKind, color: Rgb) -> Result<()> {
        self.led_command(kind, SET_LED_COLOR, &color.to_bytes()).await?;
        let mut leds = self.leds.lock().await;
        leds.entry(kind).or_insert_with(|| LedState::new(kind)).color = color;
        Ok(())
    }

    pub async fn led_mode(&self, kind: LedKind) -> Result<LedMode> {
        let payload = self.led_command(kind, GET_LED_MODE, &[]).await?;
        let byte = payload.get(2).copied().unwrap_or(0);
        LedMode::from_byte(byte).ok_or_else(|| UchromaError::BadArgument(format!("unknown LED mode byte {byte:#04x}")))
    }

    pub async fn set_led_mode(&self, kind: LedKind, mode: LedMode) -> Result<()> {
        self.led_command(kind, SET_LED_MODE, &[mode.to_byte()]).await?;
        let mut leds = self.leds.lock().await;
        leds.entry(kind).or_insert_with(|| LedState::new(kind)).mode = mode;
        Ok(())
    }

    pub async fn led_brightness(&self, kind: LedKind) -> Result<u8> {
        let payload = self.led_command(kind, GET_LED_BRIGHTNESS, &[]).await?;
        Ok(util::unscale_brightness(payload.get(2).copied().unwrap_or(0)))
    }

    pub async fn set_led_brightness(&self, kind: LedKind, pct: u8) -> Result<()> {
        if pct > 100 {
            return Err(UchromaError::BadArgument(format!("brightness {pct} out of range 0..100")));
        }
        self.led_command(kind, SET_LED_BRIGHTNESS, &[util::scale_brightness(pct)])
            .await?;
        let mut leds = self.leds.lock().await;
        leds.entry(kind).or_insert_with(|| LedState::new(kind)).brightness = pct;
        Ok(())
    }

    // -- device-wide brightness ----------------------------------------------

    fn brightness_led(&self) -> LedKind {
        if self.descriptor.quirks.contains(crate::quirk::Quirks::SCROLL_WHEEL_BRIGHTNESS) {
            LedKind::ScrollWheel
        } else if self.descriptor.quirks.contains(crate::quirk::Quirks::LOGO_LED_BRIGHTNESS) {
            LedKind::Logo
        } else {
            LedKind::Backlight
        }
    }

    /// Device-wide brightness. Laptops drive a dedicated blade-brightness
    /// command; everything else proxies through whichever LED the quirks
    /// say represents overall brightness.
    pub async fn brightness(&self) -> Result<u8> {
        if self.descriptor.device_type == DeviceType::Laptop {
            let payload = self.run_tracked(GET_BLADE_BRIGHTNESS, vec![], None).await?;
            return Ok(util::unscale_brightness(payload.get(1).copied().unwrap_or(0)));
        }
        self.led_brightness(self.brightness_led()).await
    }

    pub async fn set_brightness(&self, pct: u8) -> Result<()> {
        if pct > 100 {
            return Err(UchromaError::BadArgument(format!("brightness {pct} out of range 0..100")));
        }
        if self.descriptor.device_type == DeviceType::Laptop {
            let mut args = ArgBuilder::new(Some(2));
            args.u8(0x01)?.u8(util::scale_brightness(pct))?;
            self.run_tracked(SET_BLADE_BRIGHTNESS, args.into_bytes(), None).await?;
            return Ok(());
        }
        self.set_led_brightness(self.brightness_led(), pct).await
    }

    // -- effects --------------------------------------------------------------

    /// Send a basic-table effect payload, rerouting through
    /// `SET_EFFECT_EXTENDED` when the device has the `EXTENDED_FX_CMDS`
    /// quirk. `basic_payload` is `{opcode, ...args}` as built by `crate::fx`;
    /// the extended frame keeps the same args but swaps in the extended
    /// opcode and is always sent at transaction id `0x3F`.
    async fn dispatch_effect(&self, fx: Fx, basic_payload: Vec<u8>) -> Result<()> {
        if self.descriptor.quirks.contains(crate::quirk::Quirks::EXTENDED_FX_CMDS) {
            let ext_opcode = fx::extended_opcode(fx).ok_or(UchromaError::Unsupported)?;
            let mut args = ArgBuilder::new(None);
            args.u8(0x01)?.u8(LedKind::Backlight.opcode())?.u8(ext_opcode)?;
            if basic_payload.len() > 1 {
                args.raw(&basic_payload[1..])?;
            }
            self.run_tracked(fx::SET_EFFECT_EXTENDED, args.into_bytes(), Some(0x3F))
                .await?;
        } else {
            self.run_tracked(fx::SET_EFFECT, basic_payload, None).await?;
        }
        Ok(())
    }

    pub async fn disable_effects(&self) -> Result<()> {
        self.dispatch_effect(Fx::Disable, fx::disable()).await
    }

    pub async fn set_static(&self, color: Rgb) -> Result<()> {
        self.dispatch_effect(Fx::Static, fx::static_color(color)?).await
    }

    pub async fn wave(&self, direction: Direction) -> Result<()> {
        self.dispatch_effect(Fx::Wave, fx::wave(direction)?).await
    }

    pub async fn spectrum(&self) -> Result<()> {
        self.dispatch_effect(Fx::Spectrum, fx::spectrum()).await
    }

    pub async fn reactive(&self, speed: u8, color: Rgb) -> Result<()> {
        self.dispatch_effect(Fx::Reactive, fx::reactive(speed, color)?).await
    }

    pub async fn breathe(&self, speed: Option<u8>, c1: Option<Rgb>, c2: Option<Rgb>) -> Result<()> {
        self.dispatch_effect(Fx::Breathe, fx::multi_mode(Fx::Breathe, speed, c1, c2)?)
            .await
    }

    pub async fn starlight(&self, speed: Option<u8>, c1: Option<Rgb>, c2: Option<Rgb>) -> Result<()> {
        self.dispatch_effect(Fx::Starlight, fx::multi_mode(Fx::Starlight, speed, c1, c2)?)
            .await
    }

    pub async fn sweep(&self, direction: Direction, speed: u8, base: Rgb, color: Rgb) -> Result<()> {
        self.dispatch_effect(Fx::Sweep, fx::sweep(direction, speed, base, color)?)
            .await
    }

    pub async fn morph(&self, speed: u8, base: Rgb, color: Rgb) -> Result<()> {
        self.dispatch_effect(Fx::Morph, fx::morph(speed, base, color)?).await
    }

    pub async fn fire(&self, speed: u8, color: Rgb) -> Result<()> {
        self.dispatch_effect(Fx::Fire, fx::fire(speed, color)?).await
    }

    pub async fn ripple(&self, solid: bool, speed: u8, color: Rgb) -> Result<()> {
        let fx = if solid { Fx::RippleSolid } else { Fx::Ripple };
        self.dispatch_effect(fx, fx::ripple(solid, speed, color)?).await
    }

    /// Escape hatch for effects with no dedicated builder: `opcode` and
    /// `args` are sent verbatim through whichever effect command class the
    /// device's quirks select.
    pub async fn set_effect_raw(&self, fx: Fx, args: Vec<u8>) -> Result<()> {
        let mut payload = ArgBuilder::new(None);
        payload.u8(fx.opcode())?.raw(&args)?;
        self.dispatch_effect(fx, payload.into_bytes()).await
    }

    /// Activate whatever is currently uploaded to the frame buffer as a
    /// custom-frame effect. Mice use varstore 0 and a fixed transaction id
    /// of 0x80; every other device family uses varstore 1 and the quirk's
    /// default transaction id.
    pub async fn show_custom_frame(&self) -> Result<()> {
        let (varstore, transaction_id) = self.descriptor.device_type.custom_frame_activation();
        self.run_tracked(fx::SET_EFFECT, fx::custom_frame_activate(varstore), transaction_id)
            .await?;
        Ok(())
    }

    // -- mouse: polling rate, DPI, idle time ---------------------------------

    fn require_mouse(&self) -> Result<()> {
        if self.descriptor.device_type == DeviceType::Mouse {
            Ok(())
        } else {
            Err(UchromaError::Unsupported)
        }
    }

    pub async fn polling_rate(&self) -> Result<Option<PollingRate>> {
        self.require_mouse()?;
        let payload = self.run_tracked(GET_POLLING_RATE, vec![], None).await?;
        Ok(PollingRate::from_byte(payload.first().copied().unwrap_or(0)))
    }

    pub async fn set_polling_rate(&self, rate: PollingRate) -> Result<()> {
        self.require_mouse()?;
        self.run_tracked(SET_POLLING_RATE, vec![rate as u8], None).await?;
        Ok(())
    }

    pub async fn dpi(&self) -> Result<(u16, u16)> {
        self.require_mouse()?;
        let payload = self.run_tracked(GET_DPI_XY, vec![], None).await?;
        if payload.len() < 5 {
            return Err(UchromaError::BadLength {
                expected: 5,
                actual: payload.len(),
            });
        }
        let x = u16::from_be_bytes([payload[1], payload[2]]);
        let y = u16::from_be_bytes([payload[3], payload[4]]);
        Ok((x, y))
    }

    pub async fn set_dpi(&self, x: u16, y: u16) -> Result<()> {
        self.require_mouse()?;
        let mut args = ArgBuilder::new(None);
        args.u8(0x01)?.u16_be(x)?.u16_be(y)?;
        self.run_tracked(SET_DPI_XY, args.into_bytes(), None).await?;
        Ok(())
    }

    pub async fn set_idle_time(&self, seconds: u32) -> Result<()> {
        self.require_mouse()?;
        let clamped = util::clamp(seconds as i64, 60, 900) as u16;
        let mut args = ArgBuilder::new(Some(2));
        args.u16_be(clamped)?;
        self.run_tracked(SET_IDLE_TIME, args.into_bytes(), None).await?;
        Ok(())
    }

    // -- wireless: battery, dock ---------------------------------------------

    fn require_wireless(&self) -> Result<()> {
        if self.descriptor.is_wireless {
            Ok(())
        } else {
            Err(UchromaError::Unsupported)
        }
    }

    pub async fn battery_level(&self) -> Result<f32> {
        self.require_wireless()?;
        let payload = self.run_tracked(GET_BATTERY_LEVEL, vec![], None).await?;
        if payload.len() < 2 {
            return Err(UchromaError::BadLength {
                expected: 2,
                actual: payload.len(),
            });
        }
        Ok(payload[1] as f32 / 255.0 * 100.0)
    }

    pub async fn is_charging(&self) -> Result<bool> {
        self.require_wireless()?;
        let payload = self.run_tracked(GET_CHARGING_STATUS, vec![], None).await?;
        Ok(payload.get(1).copied().unwrap_or(0) == 1)
    }

    pub async fn set_low_battery_threshold(&self, pct: u8) -> Result<()> {
        self.require_wireless()?;
        if !(5..=25).contains(&pct) {
            return Err(UchromaError::BadArgument(format!(
                "low battery threshold {pct} out of range 5..25"
            )));
        }
        let scaled = util::scale(pct as i64, (5, 25), (0x0C, 0x3F)) as u8;
        self.run_tracked(SET_LOW_BATTERY_THRESHOLD, vec![scaled], None).await?;
        Ok(())
    }

    pub async fn dock_brightness(&self) -> Result<u8> {
        self.require_wireless()?;
        let payload = self.run_tracked(GET_DOCK_BRIGHTNESS, vec![], None).await?;
        Ok(util::unscale_brightness(payload.first().copied().unwrap_or(0)))
    }

    pub async fn set_dock_brightness(&self, pct: u8) -> Result<()> {
        self.require_wireless()?;
        self.run_tracked(SET_DOCK_BRIGHTNESS, vec![util::scale_brightness(pct)], None)
            .await?;
        Ok(())
    }

    async fn enable_dock_charge_effect(&self, enable: bool) -> Result<()> {
        self.run_tracked(SET_DOCK_CHARGE_EFFECT, vec![enable as u8], None).await?;
        Ok(())
    }

    pub async fn dock_charge_color(&self) -> Result<Rgb> {
        self.require_wireless()?;
        self.led_color(LedKind::Battery).await
    }

    /// Setting `None` disables the dock charge effect; setting a color
    /// enables it and drives the battery LED.
    pub async fn set_dock_charge_color(&self, color: Option<Rgb>) -> Result<()> {
        self.require_wireless()?;
        match color {
            None => self.enable_dock_charge_effect(false).await,
            Some(rgb) => {
                self.enable_dock_charge_effect(true).await?;
                self.set_led_color(LedKind::Battery, rgb).await
            }
        }
    }

    // -- power lifecycle ------------------------------------------------------

    /// Disable effects and release the transport handle. Intended for the
    /// IPC layer's suspend hook (e.g. on system sleep).
    pub async fn suspend(&self) -> Result<()> {
        let _ = self.disable_effects().await;
        self.session.force_close().await
    }

    /// No hardware action is needed: the handle reopens lazily on the next
    /// command.
    pub async fn resume(&self) -> Result<()> {
        Ok(())
    }

    /// Stop any running animation, disable effects, and force the handle
    /// closed.
    pub async fn reset(&self) -> Result<()> {
        self.stop_animation().await;
        let _ = self.disable_effects().await;
        self.session.force_close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DeviceDescriptor, DeviceType, MatrixDimensions, RAZER_VENDOR_ID};
    use crate::quirk::Quirks;
    use crate::report::{Request, REPORT_LEN};
    use crate::transport::{MockExchange, MockTransport};

    fn ok_response(command: Command, transaction_id: u8, payload: &[u8]) -> Vec<u8> {
        let req = Request::new(transaction_id, command, payload.to_vec());
        let mut buf = req.pack();
        buf[0] = 0x02;
        let checksum = buf[2..88].iter().fold(0u8, |acc, b| acc ^ b);
        buf[88] = checksum;
        buf.to_vec()
    }

    fn keyboard_descriptor() -> DeviceDescriptor {
        DeviceDescriptor {
            name: "Test Keyboard".into(),
            manufacturer: "Razer".into(),
            device_type: DeviceType::Keyboard,
            vendor_id: RAZER_VENDOR_ID,
            product_id: 0x0000,
            revision: 1,
            matrix: Some(MatrixDimensions { rows: 1, cols: 2 }),
            supported_fx: vec![Fx::Static],
            quirks: Quirks::TRANSACTION_CODE_3F,
            supported_leds: vec![LedKind::Backlight],
            is_wireless: false,
            zones: vec![],
            key_mapping: Default::default(),
        }
    }

    fn mouse_descriptor(wireless: bool) -> DeviceDescriptor {
        DeviceDescriptor {
            name: "Test Mouse".into(),
            manufacturer: "Razer".into(),
            device_type: DeviceType::Mouse,
            vendor_id: RAZER_VENDOR_ID,
            product_id: 0x0001,
            revision: 1,
            matrix: None,
            supported_fx: vec![],
            quirks: Quirks::TRANSACTION_CODE_3F,
            supported_leds: vec![LedKind::ScrollWheel, LedKind::Battery],
            is_wireless: wireless,
            zones: vec![],
            key_mapping: Default::default(),
        }
    }

    #[tokio::test]
    async fn firmware_version_reads_two_bytes() {
        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: ok_response(GET_FIRMWARE_VERSION, 0x3F, &[1, 5]),
        });
        let device = Device::new(keyboard_descriptor(), Box::new(mock));
        assert_eq!(device.firmware_version().await.unwrap(), (1, 5));
    }

    #[tokio::test]
    async fn serial_number_trims_non_word_bytes() {
        let mut mock = MockTransport::new();
        let mut raw = b"AB-12\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0".to_vec();
        raw.truncate(22);
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: ok_response(GET_SERIAL, 0x3F, &raw),
        });
        let device = Device::new(keyboard_descriptor(), Box::new(mock));
        let serial = device.serial_number().await.unwrap();
        assert!(!serial.contains('-'));
        assert!(serial.starts_with("AB12"));
    }

    #[tokio::test]
    async fn set_static_sends_basic_effect_payload() {
        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: ok_response(fx::SET_EFFECT, 0x3F, &[]),
        });
        let device = Device::new(keyboard_descriptor(), Box::new(mock));
        device.set_static(Rgb::new(0xFF, 0, 0)).await.unwrap();
    }

    #[tokio::test]
    async fn extended_quirk_reroutes_through_extended_command() {
        let mut descriptor = keyboard_descriptor();
        descriptor.quirks |= Quirks::EXTENDED_FX_CMDS;
        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: ok_response(fx::SET_EFFECT_EXTENDED, 0x3F, &[]),
        });
        let device = Device::new(descriptor, Box::new(mock));
        device.set_static(Rgb::new(0, 0xFF, 0)).await.unwrap();
    }

    #[tokio::test]
    async fn led_brightness_round_trips_through_scale() {
        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: ok_response(SET_LED_BRIGHTNESS, 0x3F, &[]),
        });
        let device = Device::new(keyboard_descriptor(), Box::new(mock));
        device.set_led_brightness(LedKind::Backlight, 50).await.unwrap();
        let leds = device.leds.lock().await;
        assert_eq!(leds.get(&LedKind::Backlight).unwrap().brightness, 50);
    }

    #[tokio::test]
    async fn mouse_only_commands_reject_on_non_mouse() {
        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: vec![0u8; REPORT_LEN],
        });
        let device = Device::new(keyboard_descriptor(), Box::new(mock));
        assert!(matches!(device.polling_rate().await, Err(UchromaError::Unsupported)));
    }

    #[tokio::test]
    async fn wireless_only_commands_reject_on_wired_mouse() {
        let mock = MockTransport::new();
        let device = Device::new(mouse_descriptor(false), Box::new(mock));
        assert!(matches!(device.battery_level().await, Err(UchromaError::Unsupported)));
    }

    #[tokio::test]
    async fn battery_level_scales_to_percent() {
        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: ok_response(GET_BATTERY_LEVEL, 0x3F, &[0, 255]),
        });
        let device = Device::new(mouse_descriptor(true), Box::new(mock));
        let level = device.battery_level().await.unwrap();
        assert!((level - 100.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn low_battery_threshold_rejects_out_of_range() {
        let mock = MockTransport::new();
        let device = Device::new(mouse_descriptor(true), Box::new(mock));
        assert!(device.set_low_battery_threshold(4).await.is_err());
        assert!(device.set_low_battery_threshold(26).await.is_err());
    }
}
