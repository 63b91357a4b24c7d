/* Transport session: owns the open/close lifecycle of an HID handle,
 * serializes feature-report write+read pairs, and enforces the minimum
 * inter-command delay and deferred-close idle timer documented in
 * SPEC_FULL.md §4.2.
 *
 * `HidTransport` is the seam between the session and the actual I/O: the
 * real implementation (`HidRawTransport`) goes through `HIDIOCGFEATURE`/
 * `HIDIOCSFEATURE` ioctls on a `/dev/hidraw*` node, and `MockTransport` is
 * a scripted in-memory responder used by every test in this crate. */

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use nix::libc;
use std::os::unix::io::AsRawFd;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{Result, UchromaError};

pub const DEFAULT_INTER_COMMAND_DELAY: Duration = Duration::from_millis(20);
pub const HEADSET_INTER_COMMAND_DELAY: Duration = Duration::from_millis(25);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw HID feature-report I/O. Implementors perform no framing or
/// checksum logic; they only move bytes through the report-id addressed
/// feature-report interface.
#[async_trait]
pub trait HidTransport: Send {
    async fn open(&mut self) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
    fn is_open(&self) -> bool;
    async fn write_feature(&mut self, report_id: u8, data: &[u8]) -> Result<()>;
    async fn read_feature(&mut self, report_id: u8, size: usize) -> Result<Vec<u8>>;
}

/* Compute the `HIDIOCGFEATURE(len)` ioctl request number. */
fn hid_get_feature_req(len: usize) -> libc::c_ulong {
    let ioc_readwrite: libc::c_ulong = 3;
    let ioc_type: libc::c_ulong = b'H' as libc::c_ulong;
    let ioc_nr: libc::c_ulong = 0x07;
    (ioc_readwrite << 30) | (ioc_type << 8) | ioc_nr | ((len as libc::c_ulong) << 16)
}

/* Compute the `HIDIOCSFEATURE(len)` ioctl request number. */
fn hid_set_feature_req(len: usize) -> libc::c_ulong {
    let ioc_readwrite: libc::c_ulong = 3;
    let ioc_type: libc::c_ulong = b'H' as libc::c_ulong;
    let ioc_nr: libc::c_ulong = 0x06;
    (ioc_readwrite << 30) | (ioc_type << 8) | ioc_nr | ((len as libc::c_ulong) << 16)
}

/// Real transport backed by a `/dev/hidraw*` device node.
pub struct HidRawTransport {
    path: PathBuf,
    file: Option<tokio::fs::File>,
}

impl HidRawTransport {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }
}

#[async_trait]
impl HidTransport for HidRawTransport {
    async fn open(&mut self) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .await?;
        debug!("opened {}", self.path.display());
        self.file = Some(file);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    async fn write_feature(&mut self, report_id: u8, data: &[u8]) -> Result<()> {
        let file = self.file.as_ref().ok_or(UchromaError::NotOpen)?;
        let mut buf = Vec::with_capacity(data.len() + 1);
        buf.push(report_id);
        buf.extend_from_slice(data);

        let fd = file.as_raw_fd();
        let req = hid_set_feature_req(buf.len());
        /* SAFETY: `fd` is a valid open file descriptor for the lifetime of
         * this call; `buf`'s length is encoded into `req`. The kernel reads
         * exactly `buf.len()` bytes from this pointer. */
        let res = unsafe { libc::ioctl(fd, req, buf.as_ptr()) };
        if res < 0 {
            return Err(UchromaError::Io(std::io::Error::last_os_error()));
        }
        debug!("SET_FEATURE {} bytes: {:02x?}", buf.len(), buf);
        Ok(())
    }

    async fn read_feature(&mut self, report_id: u8, size: usize) -> Result<Vec<u8>> {
        let file = self.file.as_ref().ok_or(UchromaError::NotOpen)?;
        let mut buf = vec![0u8; size + 1];
        buf[0] = report_id;

        let fd = file.as_raw_fd();
        let req = hid_get_feature_req(buf.len());
        /* SAFETY: `fd` is a valid open file descriptor for the lifetime of
         * this call; `buf` is a live mutable slice whose length is encoded
         * into `req`. The kernel writes at most `buf.len()` bytes into it. */
        let res = unsafe { libc::ioctl(fd, req, buf.as_mut_ptr()) };
        if res < 0 {
            return Err(UchromaError::Io(std::io::Error::last_os_error()));
        }
        let n = (res as usize).min(buf.len());
        buf.truncate(n);
        debug!("GET_FEATURE {} bytes: {:02x?}", n, buf);
        /* Drop the echoed report id byte the kernel prepends. */
        Ok(buf.into_iter().skip(1).collect())
    }
}

/// A single scripted exchange for [`MockTransport`]: the outbound bytes the
/// test expects (minus report id), and the inbound bytes to hand back.
#[cfg(any(test, feature = "dev-hooks"))]
pub struct MockExchange {
    pub expect_report_id: u8,
    pub response_report_id: u8,
    pub response: Vec<u8>,
}

/// Synthetic in-memory transport driving every test in this crate: a
/// scripted, struct-driven stand-in for a real hardware device. Only
/// reachable outside `#[cfg(test)]` when `dev-hooks` is enabled; never
/// built into a release.
#[cfg(any(test, feature = "dev-hooks"))]
#[derive(Default)]
pub struct MockTransport {
    open: bool,
    queue: std::collections::VecDeque<MockExchange>,
    pub received: Vec<(u8, Vec<u8>)>,
}

#[cfg(any(test, feature = "dev-hooks"))]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(&mut self, exchange: MockExchange) -> &mut Self {
        self.queue.push_back(exchange);
        self
    }
}

#[cfg(any(test, feature = "dev-hooks"))]
#[async_trait]
impl HidTransport for MockTransport {
    async fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn write_feature(&mut self, report_id: u8, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(UchromaError::NotOpen);
        }
        if let Some(exchange) = self.queue.front() {
            if exchange.expect_report_id != report_id {
                return Err(UchromaError::BadArgument(format!(
                    "mock transport: expected write report id {:#04x}, got {:#04x}",
                    exchange.expect_report_id, report_id
                )));
            }
        }
        self.received.push((report_id, data.to_vec()));
        Ok(())
    }

    async fn read_feature(&mut self, report_id: u8, _size: usize) -> Result<Vec<u8>> {
        if !self.open {
            return Err(UchromaError::NotOpen);
        }
        let exchange = self
            .queue
            .pop_front()
            .ok_or_else(|| UchromaError::BadArgument("no scripted response queued".into()))?;
        if exchange.response_report_id != report_id {
            return Err(UchromaError::BadArgument(format!(
                "mock transport: expected read report id {:#04x}, got {:#04x}",
                exchange.response_report_id, report_id
            )));
        }
        Ok(exchange.response)
    }
}

/// Owns the transport's open/close lifecycle, the at-most-one-in-flight
/// serialization, the inter-command delay, and the defer-close idle timer.
pub struct Session {
    transport: Mutex<Box<dyn HidTransport>>,
    inter_command_delay: Duration,
    idle_timeout: Duration,
    defer_close: std::sync::atomic::AtomicBool,
    last_use: Mutex<Option<Instant>>,
}

impl Session {
    pub fn new(transport: Box<dyn HidTransport>, inter_command_delay: Duration) -> Self {
        Self {
            transport: Mutex::new(transport),
            inter_command_delay,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            defer_close: std::sync::atomic::AtomicBool::new(false),
            last_use: Mutex::new(None),
        }
    }

    pub fn set_defer_close(&self, defer: bool) {
        self.defer_close
            .store(defer, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn defer_close(&self) -> bool {
        self.defer_close.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Enforce the minimum inter-command delay since the previous
    /// exchange's read completed, write `out` on `out_report_id`, sleep
    /// `wait` (the report runner's post-write settle time, distinct from
    /// the inter-command spacing), then read `in_size` bytes back on
    /// `in_report_id`. Closes the handle afterward unless `defer_close`
    /// is set.
    pub async fn exchange(
        &self,
        out_report_id: u8,
        out: &[u8],
        in_report_id: u8,
        in_size: usize,
        wait: Duration,
    ) -> Result<Vec<u8>> {
        let mut transport = self.transport.lock().await;
        if !transport.is_open() {
            transport.open().await?;
        }

        let since_last = self.last_use.lock().await.map(|t| t.elapsed());
        if let Some(elapsed) = since_last {
            if elapsed < self.inter_command_delay {
                tokio::time::sleep(self.inter_command_delay - elapsed).await;
            }
        }

        transport.write_feature(out_report_id, out).await?;
        tokio::time::sleep(wait).await;
        let response = transport.read_feature(in_report_id, in_size).await?;

        *self.last_use.lock().await = Some(Instant::now());

        if !self.defer_close() {
            transport.close().await?;
        }

        Ok(response)
    }

    /// Close the handle if `defer_close` is set and the idle timer has
    /// expired since the last exchange. Intended to be polled by a
    /// low-frequency background tick; not invoked by the hot path.
    pub async fn close_if_idle(&self) -> Result<()> {
        if !self.defer_close() {
            return Ok(());
        }
        let last_use = *self.last_use.lock().await;
        if let Some(last_use) = last_use {
            if last_use.elapsed() >= self.idle_timeout {
                self.transport.lock().await.close().await?;
            }
        }
        Ok(())
    }

    pub async fn force_close(&self) -> Result<()> {
        self.transport.lock().await.close().await
    }

    pub async fn is_open(&self) -> bool {
        self.transport.lock().await.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exchange_closes_handle_without_defer_close() {
        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: vec![1, 2, 3],
        });
        let session = Session::new(Box::new(mock), Duration::from_millis(1));

        let resp = session
            .exchange(0x02, &[0xAA], 0x00, 3, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(resp, vec![1, 2, 3]);
        assert!(!session.is_open().await);
    }

    #[tokio::test]
    async fn defer_close_keeps_handle_open() {
        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: vec![1],
        });
        let session = Session::new(Box::new(mock), Duration::from_millis(1));
        session.set_defer_close(true);

        session
            .exchange(0x02, &[0], 0x00, 1, Duration::from_millis(1))
            .await
            .unwrap();
        assert!(session.is_open().await);

        session.force_close().await.unwrap();
        assert!(!session.is_open().await);
    }
}
