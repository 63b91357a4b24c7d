/* Frame buffer: a fixed-dimension 2-D RGB pixel array with a synchronous,
 * atomic-from-the-caller's-perspective upload path (`flip`). One report per
 * row, then a single "activate custom frame" report. */

use crate::color::Rgb;
use crate::descriptor::DeviceType;
use crate::error::Result;
use crate::quirk::Quirks;
use crate::report::{ArgBuilder, Command};
use crate::runner::ReportRunner;

pub const SET_FRAME_DATA: Command = Command::variable(0x03, 0x0B);

#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    base_color: Rgb,
    matrix: Vec<Vec<Rgb>>,
}

impl FrameBuffer {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            width,
            height,
            base_color: Rgb::BLACK,
            matrix: vec![vec![Rgb::BLACK; width]; height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set_base_color(&mut self, rgb: Rgb) {
        self.base_color = rgb;
    }

    pub fn base_color(&self) -> Rgb {
        self.base_color
    }

    pub fn clear(&mut self) {
        for row in &mut self.matrix {
            row.fill(self.base_color);
        }
    }

    pub fn put(&mut self, row: usize, col: usize, rgb: Rgb) {
        if row < self.height && col < self.width {
            self.matrix[row][col] = rgb;
        }
    }

    pub fn put_all(&mut self, rows: &[Vec<Rgb>]) {
        for (r, row) in rows.iter().enumerate().take(self.height) {
            for (c, px) in row.iter().enumerate().take(self.width) {
                self.matrix[r][c] = *px;
            }
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Rgb {
        self.matrix[row][col]
    }

    pub fn matrix(&self) -> &[Vec<Rgb>] {
        &self.matrix
    }

    fn row_bytes(&self, row: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.width * 3);
        for px in &self.matrix[row] {
            bytes.extend_from_slice(&px.to_bytes());
        }
        bytes
    }

    /// Upload every row, then send the custom-frame activation command.
    /// Must run under `Session::set_defer_close(true)`. Clears the buffer
    /// to `base_color` afterward when `clear` is true.
    pub async fn flip(
        &mut self,
        runner: &ReportRunner<'_>,
        quirks: Quirks,
        device_type: DeviceType,
        clear: bool,
        frame_id: u8,
    ) -> Result<()> {
        for row in 0..self.height {
            let mut args = ArgBuilder::new(None);
            args.u8(frame_id)?
                .u8(row as u8)?
                .u8(0)?
                .u8(self.width as u8)?
                .raw(&self.row_bytes(row))?;

            runner
                .run(
                    SET_FRAME_DATA,
                    args.into_bytes(),
                    Some(quirks.frame_transaction_id()),
                    None,
                    None,
                )
                .await?;
        }

        let (varstore, transaction_id) = device_type.custom_frame_activation();
        runner
            .run(
                crate::fx::SET_EFFECT,
                crate::fx::custom_frame_activate(varstore),
                transaction_id,
                None,
                None,
            )
            .await?;

        if clear {
            self.clear();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockExchange, MockTransport, Session};
    use std::time::Duration;

    fn ok_response(command: Command, transaction_id: u8) -> Vec<u8> {
        let req = crate::report::Request::new(transaction_id, command, vec![]);
        let mut buf = req.pack();
        buf[0] = 0x02;
        let checksum = buf[2..88].iter().fold(0u8, |acc, b| acc ^ b);
        buf[88] = checksum;
        buf.to_vec()
    }

    #[tokio::test]
    async fn flip_uploads_each_row_then_activates_and_clears() {
        let mut frame = FrameBuffer::new(2, 3);
        frame.put(0, 0, Rgb::new(1, 2, 3));
        frame.set_base_color(Rgb::new(9, 9, 9));

        let mut mock = MockTransport::new();
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: ok_response(SET_FRAME_DATA, 0xFF),
        });
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: ok_response(SET_FRAME_DATA, 0xFF),
        });
        mock.expect(MockExchange {
            expect_report_id: 0x02,
            response_report_id: 0x00,
            response: ok_response(crate::fx::SET_EFFECT, 0xFF),
        });

        let session = Session::new(Box::new(mock), Duration::from_millis(1));
        let runner = ReportRunner::new(&session, Quirks::empty());

        frame
            .flip(&runner, Quirks::empty(), DeviceType::Keyboard, true, 0xFF)
            .await
            .unwrap();

        assert_eq!(frame.get(0, 0), Rgb::new(9, 9, 9));
        assert_eq!(frame.get(1, 2), Rgb::new(9, 9, 9));
    }

    #[test]
    fn clear_without_flip_leaves_matrix_unchanged() {
        let mut frame = FrameBuffer::new(1, 1);
        frame.put(0, 0, Rgb::new(5, 5, 5));
        assert_eq!(frame.get(0, 0), Rgb::new(5, 5, 5));
    }
}
