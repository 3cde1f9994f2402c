// Radtel programming protocol
// Memory is transferred in 1 KiB pages; every frame ends with an additive
// checksum over the preceding bytes.

use super::protocol::{sum8, ChecksumPolicy, ProtocolError, Result, WireProtocol};
use crate::bitwise::{read_u16_be, write_u16_be};

pub const PAGE_SIZE: usize = 1024;

const COMMAND: u8 = 0x34;
const COMMAND_LEN: usize = 5;
const READ: u8 = b'R';
const READ_LEN: usize = 4;
const WRITE_MASK: u8 = 0xf0;
const WRITE: u8 = 0x90;
const WRITE_LEN: usize = PAGE_SIZE + 4;
const ACK: u8 = 0x06;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadtelCommand {
    EnterProgrammingMode,
    LeaveProgrammingMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadtelRequest {
    Command(RadtelCommand),
    Read { page: u16 },
    Write { segment: u8, page: u16, payload: Vec<u8> },
}

impl RadtelRequest {
    /// Flat memory address of a page request.
    /// Reads always address segment 0.
    pub fn address(&self) -> Option<u32> {
        match self {
            RadtelRequest::Command(_) => None,
            RadtelRequest::Read { page } => Some(page_address(0, *page)),
            RadtelRequest::Write { segment, page, .. } => Some(page_address(*segment, *page)),
        }
    }
}

/// The segment selects a 16 MiB bank, the page a 1 KiB block within it
pub fn page_address(segment: u8, page: u16) -> u32 {
    ((segment as u32) << 24) + ((page as u32) << 10)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadtelResponse {
    Ack,
    Read { page: u16, payload: Vec<u8> },
}

/// Codec for the Radtel wire format
#[derive(Debug, Clone)]
pub struct RadtelProtocol {
    checksum: ChecksumPolicy,
}

impl Default for RadtelProtocol {
    fn default() -> Self {
        Self {
            checksum: ChecksumPolicy::Reject,
        }
    }
}

impl RadtelProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.checksum = policy;
        self
    }

    /// Verify the checksum of the `len` byte frame at the front of the buffer.
    /// A rejected frame is removed from the buffer.
    fn check_frame(&self, buffer: &mut Vec<u8>, len: usize) -> Result<()> {
        let computed = sum8(&buffer[..len - 1]);
        let received = buffer[len - 1];
        if let Err(err) = self.checksum.check(received, computed) {
            buffer.drain(..len);
            return Err(err);
        }
        Ok(())
    }
}

impl WireProtocol for RadtelProtocol {
    type Request = RadtelRequest;
    type Response = RadtelResponse;

    fn decode(&self, buffer: &mut Vec<u8>) -> Result<Option<RadtelRequest>> {
        let Some(&prefix) = buffer.first() else {
            return Ok(None);
        };

        if prefix == COMMAND {
            if buffer.len() < COMMAND_LEN {
                return Ok(None);
            }
            self.check_frame(buffer, COMMAND_LEN)?;
            let command = match (buffer[2], buffer[3]) {
                (0x05, 0x10) => Some(RadtelCommand::EnterProgrammingMode),
                (0x05, 0xee) => Some(RadtelCommand::LeaveProgrammingMode),
                _ => None,
            };
            if let Some(command) = command {
                buffer.drain(..COMMAND_LEN);
                return Ok(Some(RadtelRequest::Command(command)));
            }
        } else if prefix == READ {
            if buffer.len() < READ_LEN {
                return Ok(None);
            }
            self.check_frame(buffer, READ_LEN)?;
            let page = read_u16_be(&buffer[1..3])?;
            buffer.drain(..READ_LEN);
            return Ok(Some(RadtelRequest::Read { page }));
        } else if prefix & WRITE_MASK == WRITE {
            if buffer.len() < WRITE_LEN {
                return Ok(None);
            }
            self.check_frame(buffer, WRITE_LEN)?;
            let segment = prefix & 0x0f;
            let page = read_u16_be(&buffer[1..3])?;
            let payload = buffer[3..3 + PAGE_SIZE].to_vec();
            buffer.drain(..WRITE_LEN);
            return Ok(Some(RadtelRequest::Write {
                segment,
                page,
                payload,
            }));
        }

        tracing::error!("Unexpected request: {:02x?}", buffer);
        buffer.clear();
        Err(ProtocolError::UnexpectedRequest(prefix))
    }

    fn encode(&self, response: &RadtelResponse, out: &mut Vec<u8>) {
        match response {
            RadtelResponse::Ack => out.push(ACK),
            RadtelResponse::Read { page, payload } => {
                let start = out.len();
                out.push(READ);
                out.extend_from_slice(&write_u16_be(*page));
                let len = payload.len().min(PAGE_SIZE);
                out.extend_from_slice(&payload[..len]);
                out.resize(start + 3 + PAGE_SIZE, 0x00);
                let crc = sum8(&out[start..]);
                out.push(crc);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_crc(mut frame: Vec<u8>) -> Vec<u8> {
        frame.push(sum8(&frame));
        frame
    }

    #[test]
    fn test_commands() {
        let protocol = RadtelProtocol::new();
        let mut buffer = with_crc(vec![0x34, 0x52, 0x05, 0x10]);
        buffer.extend(with_crc(vec![0x34, 0x52, 0x05, 0xee]));

        assert_eq!(
            protocol.decode(&mut buffer).unwrap(),
            Some(RadtelRequest::Command(RadtelCommand::EnterProgrammingMode))
        );
        assert_eq!(
            protocol.decode(&mut buffer).unwrap(),
            Some(RadtelRequest::Command(RadtelCommand::LeaveProgrammingMode))
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_unknown_command_clears_buffer() {
        let protocol = RadtelProtocol::new();
        let mut buffer = with_crc(vec![0x34, 0x52, 0x01, 0x02]);
        assert_eq!(
            protocol.decode(&mut buffer),
            Err(ProtocolError::UnexpectedRequest(0x34))
        );
        assert!(buffer.is_empty());

        let mut buffer = vec![0x11, 0x22];
        assert!(protocol.decode(&mut buffer).is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_read_request() {
        let protocol = RadtelProtocol::new();
        let frame = with_crc(vec![b'R', 0x00, 0x21]);
        let mut buffer = frame[..3].to_vec();
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
        assert_eq!(buffer.len(), 3);

        let mut buffer = frame;
        let request = protocol.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(request, RadtelRequest::Read { page: 0x21 });
        assert_eq!(request.address(), Some(0x21 * 1024));
    }

    #[test]
    fn test_write_request() {
        let protocol = RadtelProtocol::new();
        let mut frame = vec![0x92, 0x00, 0x03];
        frame.extend((0..PAGE_SIZE).map(|i| i as u8));
        let frame = with_crc(frame);
        assert_eq!(frame.len(), WRITE_LEN);

        let mut buffer = frame[..WRITE_LEN - 1].to_vec();
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);

        let mut buffer = frame;
        let request = protocol.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(request.address(), Some(0x0200_0c00));
        match request {
            RadtelRequest::Write {
                segment,
                page,
                payload,
            } => {
                assert_eq!(segment, 2);
                assert_eq!(page, 3);
                assert_eq!(payload.len(), PAGE_SIZE);
                assert_eq!(payload[5], 5);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_bad_checksum() {
        let mut frame = with_crc(vec![b'R', 0x00, 0x01]);
        frame[3] ^= 0x01;

        let mut buffer = frame.clone();
        buffer.extend(with_crc(vec![b'R', 0x00, 0x02]));
        let protocol = RadtelProtocol::new();
        assert!(matches!(
            protocol.decode(&mut buffer),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
        assert_eq!(
            protocol.decode(&mut buffer).unwrap(),
            Some(RadtelRequest::Read { page: 2 })
        );

        let lenient = RadtelProtocol::new().with_checksum_policy(ChecksumPolicy::WarnOnly);
        let mut buffer = frame;
        assert_eq!(
            lenient.decode(&mut buffer).unwrap(),
            Some(RadtelRequest::Read { page: 1 })
        );
    }

    #[test]
    fn test_encode() {
        let protocol = RadtelProtocol::new();
        let mut out = Vec::new();
        protocol.encode(&RadtelResponse::Ack, &mut out);
        assert_eq!(out, [ACK]);

        out.clear();
        protocol.encode(
            &RadtelResponse::Read {
                page: 0x0102,
                payload: vec![0x10, 0x20],
            },
            &mut out,
        );
        assert_eq!(out.len(), PAGE_SIZE + 4);
        assert_eq!(&out[..5], &[b'R', 0x01, 0x02, 0x10, 0x20]);
        assert!(out[5..PAGE_SIZE + 3].iter().all(|b| *b == 0));
        assert_eq!(out[PAGE_SIZE + 3], sum8(&[b'R', 0x01, 0x02, 0x10, 0x20]));
    }
}
