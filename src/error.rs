/* Core error taxonomy for transport, protocol, and device-level failures.
 *
 * Using explicit variants instead of opaque strings allows callers to take
 * structured recovery actions (e.g. retrying on `DeviceBusy` vs. surfacing
 * `ProtocolError` straight to the IPC layer). */

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UchromaError {
    #[error("transport I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport not open")]
    NotOpen,

    #[error("checksum mismatch: computed {computed:#04x}, received {received:#04x}")]
    ChecksumMismatch { computed: u8, received: u8 },

    #[error("response did not echo the request (field: {field})")]
    EchoMismatch { field: &'static str },

    #[error("bad frame length: expected {expected}, got {actual}")]
    BadLength { expected: usize, actual: usize },

    #[error("device busy, retries exhausted")]
    DeviceBusy,

    #[error("device reported failure status")]
    DeviceFailed,

    #[error("device does not support this command")]
    Unsupported,

    #[error("device is offline")]
    DeviceOffline,

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("renderer initialization failed")]
    RendererInitFailed,

    #[error("argument stream overflowed bounded data size (max {max}, got {actual})")]
    ArgOverflow { max: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, UchromaError>;
