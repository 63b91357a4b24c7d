/* Byte-frame codec: packs and parses the fixed 90-byte feature report that
 * carries every standard (non-headset) command class/id pair. */
/*  */
/* Layout (all fields at fixed offsets):                            */
/*   0      status                                                  */
/*   1      transaction id                                          */
/*   2..3   remaining packets (big-endian)                          */
/*   4      protocol type                                           */
/*   5      data size                                                */
/*   6      command class                                           */
/*   7      command id                                               */
/*   8..87  payload (80 bytes)                                       */
/*   88     checksum: XOR of bytes 2..87 inclusive                   */
/*   89     reserved (0)                                             */

use crate::error::{Result, UchromaError};

pub const REPORT_LEN: usize = 90;
pub const PAYLOAD_OFFSET: usize = 8;
pub const PAYLOAD_LEN: usize = 80;
pub const OUT_REPORT_ID: u8 = 0x02;
pub const IN_REPORT_ID: u8 = 0x00;

/// Status byte values on the inbound report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Busy,
    Ok,
    Failed,
    Timeout,
    Unsupported,
    Unknown(u8),
}

impl From<u8> for Status {
    fn from(byte: u8) -> Self {
        match byte {
            0x01 => Status::Busy,
            0x02 => Status::Ok,
            0x03 => Status::Failed,
            0x04 => Status::Timeout,
            0x05 => Status::Unsupported,
            other => Status::Unknown(other),
        }
    }
}

/// A `(class, id, data_size)` triple identifying a device operation.
/// `data_size` is `None` for variable-length commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub class: u8,
    pub id: u8,
    pub data_size: Option<u8>,
}

impl Command {
    pub const fn new(class: u8, id: u8, data_size: u8) -> Self {
        Self {
            class,
            id,
            data_size: Some(data_size),
        }
    }

    pub const fn variable(class: u8, id: u8) -> Self {
        Self {
            class,
            id,
            data_size: None,
        }
    }
}

/// Appends little-endian integers, RGB triples, and raw bytes into a
/// payload stream, refusing writes that would overflow a bounded
/// `data_size`.
#[derive(Debug, Default)]
pub struct ArgBuilder {
    bytes: Vec<u8>,
    max: Option<usize>,
}

impl ArgBuilder {
    pub fn new(max: Option<u8>) -> Self {
        Self {
            bytes: Vec::new(),
            max: max.map(|m| m as usize),
        }
    }

    fn check(&self, additional: usize) -> Result<()> {
        if let Some(max) = self.max {
            let actual = self.bytes.len() + additional;
            if actual > max {
                return Err(UchromaError::ArgOverflow { max, actual });
            }
        }
        Ok(())
    }

    pub fn u8(&mut self, v: u8) -> Result<&mut Self> {
        self.check(1)?;
        self.bytes.push(v);
        Ok(self)
    }

    pub fn u16_le(&mut self, v: u16) -> Result<&mut Self> {
        self.check(2)?;
        self.bytes.extend_from_slice(&v.to_le_bytes());
        Ok(self)
    }

    pub fn u16_be(&mut self, v: u16) -> Result<&mut Self> {
        self.check(2)?;
        self.bytes.extend_from_slice(&v.to_be_bytes());
        Ok(self)
    }

    pub fn u32_le(&mut self, v: u32) -> Result<&mut Self> {
        self.check(4)?;
        self.bytes.extend_from_slice(&v.to_le_bytes());
        Ok(self)
    }

    pub fn rgb(&mut self, rgb: crate::color::Rgb) -> Result<&mut Self> {
        self.check(3)?;
        self.bytes.extend_from_slice(&rgb.to_bytes());
        Ok(self)
    }

    pub fn raw(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.check(bytes.len())?;
        self.bytes.extend_from_slice(bytes);
        Ok(self)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// An outbound request built against a [`Command`], ready to pack.
#[derive(Debug, Clone)]
pub struct Request {
    pub transaction_id: u8,
    pub protocol_type: u8,
    pub command: Command,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn new(transaction_id: u8, command: Command, payload: Vec<u8>) -> Self {
        Self {
            transaction_id,
            protocol_type: 0,
            command,
            payload,
        }
    }

    /// Pack into the canonical 90-byte outbound frame (`status = 0`,
    /// `remaining_packets = 0`).
    pub fn pack(&self) -> [u8; REPORT_LEN] {
        let mut buf = [0u8; REPORT_LEN];
        buf[0] = 0;
        buf[1] = self.transaction_id;
        buf[2..4].copy_from_slice(&0u16.to_be_bytes());
        buf[4] = self.protocol_type;
        buf[5] = self.payload.len() as u8;
        buf[6] = self.command.class;
        buf[7] = self.command.id;

        let n = self.payload.len().min(PAYLOAD_LEN);
        buf[PAYLOAD_OFFSET..PAYLOAD_OFFSET + n].copy_from_slice(&self.payload[..n]);

        buf[88] = xor_checksum(&buf);
        buf[89] = 0;
        buf
    }
}

/// A decoded inbound response, verified against the originating [`Request`].
#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub payload: Vec<u8>,
}

/// XOR of bytes `[2..88)` (86 bytes), matching the documented checksum span.
fn xor_checksum(buf: &[u8; REPORT_LEN]) -> u8 {
    buf[2..88].iter().fold(0u8, |acc, b| acc ^ b)
}

/// Parse and validate a raw 90-byte inbound frame against the request that
/// produced it.
pub fn unpack(buf: &[u8], request: &Request) -> Result<Response> {
    if buf.len() != REPORT_LEN {
        return Err(UchromaError::BadLength {
            expected: REPORT_LEN,
            actual: buf.len(),
        });
    }

    let mut fixed = [0u8; REPORT_LEN];
    fixed.copy_from_slice(buf);

    let computed = xor_checksum(&fixed);
    let received = fixed[88];
    if computed != received {
        return Err(UchromaError::ChecksumMismatch { computed, received });
    }

    if fixed[1] != request.transaction_id {
        return Err(UchromaError::EchoMismatch {
            field: "transaction_id",
        });
    }
    if fixed[4] != request.protocol_type {
        return Err(UchromaError::EchoMismatch {
            field: "protocol_type",
        });
    }
    if fixed[6] != request.command.class {
        return Err(UchromaError::EchoMismatch { field: "class" });
    }
    if fixed[7] != request.command.id {
        return Err(UchromaError::EchoMismatch { field: "id" });
    }

    let status = Status::from(fixed[0]);
    let data_size = fixed[5] as usize;
    let end = (PAYLOAD_OFFSET + data_size).min(REPORT_LEN - 2);
    let payload = fixed[PAYLOAD_OFFSET..end].to_vec();

    Ok(Response { status, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    /* Scenario 1 from the testable-properties worked example: GET_FIRMWARE_VERSION. */
    #[test]
    fn get_firmware_version_wire_bytes() {
        let req = Request::new(0xFF, Command::new(0x00, 0x81, 2), vec![]);
        let packed = req.pack();

        assert_eq!(packed.len(), REPORT_LEN);
        assert_eq!(&packed[0..8], &[0x00, 0xFF, 0x00, 0x00, 0x00, 0x02, 0x00, 0x81]);
        assert_eq!(packed[88], 0x83);
        assert_eq!(packed[89], 0);
        assert!(packed[PAYLOAD_OFFSET..88].iter().all(|&b| b == 0));
    }

    #[test]
    fn static_red_effect_payload_offset() {
        let mut args = ArgBuilder::new(Some(4));
        args.u8(0x06).unwrap().rgb(Rgb::new(0xFF, 0, 0)).unwrap();
        let req = Request::new(0x3F, Command::new(0x03, 0x0A, 4), args.into_bytes());
        let packed = req.pack();
        assert_eq!(&packed[8..12], &[0x06, 0xFF, 0x00, 0x00]);
        assert_eq!(packed[6], 0x03);
        assert_eq!(packed[7], 0x0A);
        assert_eq!(packed[5], 4);
    }

    #[test]
    fn breathe_dual_payload() {
        let mut args = ArgBuilder::new(None);
        args.u8(0x03)
            .unwrap()
            .u8(0x02)
            .unwrap()
            .rgb(Rgb::new(10, 20, 30))
            .unwrap()
            .rgb(Rgb::new(40, 50, 60))
            .unwrap();
        let bytes = args.into_bytes();
        assert_eq!(bytes, vec![0x03, 0x02, 10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn round_trip_valid_response() {
        let req = Request::new(0x3F, Command::new(0x00, 0x81, 2), vec![]);
        let packed = req.pack();

        let mut response = packed;
        response[0] = 0x02; // status OK
        response[PAYLOAD_OFFSET] = 1;
        response[PAYLOAD_OFFSET + 1] = 5;
        response[88] = xor_checksum(&response);

        let decoded = unpack(&response, &req).unwrap();
        assert_eq!(decoded.status, Status::Ok);
        assert_eq!(decoded.payload, vec![1, 5]);
    }

    #[test]
    fn checksum_mismatch_is_rejected() {
        let req = Request::new(0x3F, Command::new(0x00, 0x81, 2), vec![]);
        let mut response = req.pack();
        response[0] = 0x02;
        response[88] ^= 0xFF;
        assert!(matches!(
            unpack(&response, &req),
            Err(UchromaError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn echo_mismatch_is_rejected() {
        let req = Request::new(0x3F, Command::new(0x00, 0x81, 2), vec![]);
        let mut response = req.pack();
        response[0] = 0x02;
        response[7] = 0x99;
        response[88] = xor_checksum(&{
            let mut f = [0u8; REPORT_LEN];
            f.copy_from_slice(&response);
            f
        });
        assert!(matches!(
            unpack(&response, &req),
            Err(UchromaError::EchoMismatch { field: "id" })
        ));
    }

    #[test]
    fn arg_builder_refuses_overflow() {
        let mut args = ArgBuilder::new(Some(2));
        args.u8(1).unwrap();
        assert!(args.u16_le(0xFFFF).is_err());
    }
}
