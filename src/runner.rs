/* Report runner: builds a typed report from a Command + arguments,
 * invokes the transport session, validates the response, and retries on
 * a busy device per SPEC_FULL.md §4.3. */

use std::time::Duration;

use tracing::{debug, error};

use crate::error::{Result, UchromaError};
use crate::quirk::Quirks;
use crate::report::{self, Command, Request, Status, OUT_REPORT_ID, IN_REPORT_ID, REPORT_LEN};
use crate::transport::Session;

const MAX_BUSY_RETRIES: u8 = 3;
const BUSY_RETRY_DELAY: Duration = Duration::from_millis(20);
pub const STANDARD_COMMAND_WAIT: Duration = Duration::from_millis(200);

/// Invoked when a request times out (status `0x04`); used to track
/// wireless device offline state.
pub type TimeoutCallback<'a> = dyn FnMut() + Send + 'a;

pub struct ReportRunner<'a> {
    pub session: &'a Session,
    pub quirks: Quirks,
}

impl<'a> ReportRunner<'a> {
    pub fn new(session: &'a Session, quirks: Quirks) -> Self {
        Self { session, quirks }
    }

    /// Run a single command, returning the response payload on success.
    pub async fn run(
        &self,
        command: Command,
        args: Vec<u8>,
        transaction_id: Option<u8>,
        wait: Option<Duration>,
        mut timeout_cb: Option<&mut TimeoutCallback<'_>>,
    ) -> Result<Vec<u8>> {
        let transaction_id = transaction_id.unwrap_or_else(|| self.quirks.default_transaction_id());
        let request = Request::new(transaction_id, command, args);
        let packed = request.pack();

        let wait = wait.unwrap_or(STANDARD_COMMAND_WAIT);

        for attempt in 0..=MAX_BUSY_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(BUSY_RETRY_DELAY).await;
            }

            let response_bytes = self
                .send_and_wait(&packed, wait)
                .await?;

            let response = report::unpack(&response_bytes, &request)?;

            match response.status {
                Status::Ok => return Ok(response.payload),
                Status::Busy if attempt < MAX_BUSY_RETRIES => {
                    debug!("device busy, retrying (attempt {attempt})");
                    continue;
                }
                Status::Busy => return Err(UchromaError::DeviceBusy),
                Status::Timeout => {
                    if let Some(cb) = timeout_cb.as_deref_mut() {
                        cb();
                    }
                    return Err(UchromaError::DeviceOffline);
                }
                Status::Failed => {
                    error!("device reported failure for command {:?}", command);
                    return Err(UchromaError::DeviceFailed);
                }
                Status::Unsupported => return Err(UchromaError::Unsupported),
                Status::Unknown(byte) => {
                    error!("unknown status byte {byte:#04x}");
                    return Err(UchromaError::DeviceFailed);
                }
            }
        }

        unreachable!("retry loop always returns")
    }

    async fn send_and_wait(&self, packed: &[u8; REPORT_LEN], wait: Duration) -> Result<Vec<u8>> {
        self.session
            .exchange(OUT_REPORT_ID, packed, IN_REPORT_ID, REPORT_LEN, wait)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Command;
    use crate::transport::{MockExchange, MockTransport, Session};

    fn firmware_response(major: u8, minor: u8) -> Vec<u8> {
        let req = Request::new(0xFF, Command::new(0x00, 0x81, 2), vec![]);
        let mut buf = req.pack();
        buf[0] = 0x02;
        buf[8] = major;
        buf[9] = minor;
        let checksum = buf[2..88].iter().fold(0u8, |acc, b| acc ^ b);
        buf[88] = checksum;
        buf.to_vec()
    }

    #[tokio::test]
    async fn get_firmware_version_success() {
        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: firmware_response(1, 5),
        });
        let session = Session::new(Box::new(mock), Duration::from_millis(1));
        let runner = ReportRunner::new(&session, Quirks::empty());

        let payload = runner
            .run(Command::new(0x00, 0x81, 2), vec![], Some(0xFF), None, None)
            .await
            .unwrap();
        assert_eq!(payload, vec![1, 5]);
    }

    #[tokio::test]
    async fn busy_status_retries_then_succeeds() {
        let mut mock = MockTransport::new();
        for _ in 0..2 {
            let mut buf = Request::new(0xFF, Command::new(0x00, 0x81, 2), vec![]).pack();
            buf[0] = 0x01; // busy
            let checksum = buf[2..88].iter().fold(0u8, |acc, b| acc ^ b);
            buf[88] = checksum;
            mock.expect(MockExchange {
                expect_report_id: 0x02,
                response_report_id: 0x00,
                response: buf.to_vec(),
            });
        }
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: firmware_response(2, 0),
        });
        let session = Session::new(Box::new(mock), Duration::from_millis(1));
        let runner = ReportRunner::new(&session, Quirks::empty());

        let payload = runner
            .run(Command::new(0x00, 0x81, 2), vec![], Some(0xFF), None, None)
            .await
            .unwrap();
        assert_eq!(payload, vec![2, 0]);
    }

    #[tokio::test]
    async fn timeout_invokes_callback_and_marks_offline() {
        let mut mock = MockTransport::new();
        let mut buf = Request::new(0xFF, Command::new(0x00, 0x81, 2), vec![]).pack();
        buf[0] = 0x04; // timeout
        let checksum = buf[2..88].iter().fold(0u8, |acc, b| acc ^ b);
        buf[88] = checksum;
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: buf.to_vec(),
        });
        let session = Session::new(Box::new(mock), Duration::from_millis(1));
        let runner = ReportRunner::new(&session, Quirks::empty());

        let mut called = false;
        let result = runner
            .run(
                Command::new(0x00, 0x81, 2),
                vec![],
                Some(0xFF),
                None,
                Some(&mut || called = true),
            )
            .await;
        assert!(matches!(result, Err(UchromaError::DeviceOffline)));
        assert!(called);
    }
}
