/* uchromad: opens a single HID device node, wires it to a device descriptor,
 * and demonstrates the command surface (firmware identity, a static-color
 * effect) before exiting. Device discovery/hotplug and the IPC surface that
 * would keep a daemon resident are external collaborators, not this binary's
 * job -- see SPEC_FULL.md §1. */

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use uchroma::color::Rgb;
use uchroma::descriptor::{DeviceDescriptor, DeviceType, MatrixDimensions, RAZER_VENDOR_ID};
use uchroma::device::Device;
use uchroma::fx::Fx;
use uchroma::quirk::Quirks;
use uchroma::transport::HidRawTransport;

struct Args {
    devnode: PathBuf,
    descriptor_path: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut devnode = None;
    let mut descriptor_path = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--device" => {
                devnode = Some(PathBuf::from(args.next().context("--device needs a path")?));
            }
            "--descriptor" => {
                descriptor_path = Some(PathBuf::from(
                    args.next().context("--descriptor needs a path")?,
                ));
            }
            other => anyhow::bail!("unrecognized argument: {other}"),
        }
    }

    Ok(Args {
        devnode: devnode.context("missing required --device <hidraw path>")?,
        descriptor_path,
    })
}

/// A single-LED keyboard with no addressable matrix, used when the caller
/// doesn't hand us a real catalog entry via `--descriptor`. Just enough to
/// exercise identity and effect commands against real hardware.
fn demo_descriptor() -> DeviceDescriptor {
    DeviceDescriptor {
        name: "Unknown Razer Device".into(),
        manufacturer: "Razer".into(),
        device_type: DeviceType::Keyboard,
        vendor_id: RAZER_VENDOR_ID,
        product_id: 0x0000,
        revision: 1,
        matrix: Some(MatrixDimensions { rows: 6, cols: 22 }),
        supported_fx: vec![Fx::Static, Fx::Spectrum, Fx::Wave, Fx::Breathe],
        quirks: Quirks::empty(),
        supported_leds: vec![uchroma::descriptor::LedKind::Backlight],
        is_wireless: false,
        zones: vec![],
        key_mapping: Default::default(),
    }
}

fn load_descriptor(path: &std::path::Path) -> Result<DeviceDescriptor> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading descriptor {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing descriptor {}", path.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;

    let descriptor = match &args.descriptor_path {
        Some(path) => load_descriptor(path)?,
        None => demo_descriptor(),
    };

    info!(device = %descriptor.name, path = %args.devnode.display(), "attaching device");

    let transport = HidRawTransport::new(&args.devnode);
    let device = Device::new(descriptor, Box::new(transport));

    let firmware = device
        .firmware_version_string()
        .await
        .context("reading firmware version")?;
    let serial = device.serial_number().await.context("reading serial number")?;
    info!(firmware, serial, "device identified");

    device
        .set_static(Rgb::new(0x00, 0xFF, 0x00))
        .await
        .context("setting static effect")?;
    info!("static effect applied, exiting");

    Ok(())
}
