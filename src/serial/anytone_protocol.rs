// AnyTone programming protocol
// ASCII commands PROGRAM / END, a device info query and address based
// block reads and writes with an additive checksum.

use super::protocol::{sum8, ChecksumPolicy, Result, WireProtocol};
use crate::bitwise::{read_u32_be, write_u32_be};

const PROGRAM: &[u8] = b"PROGRAM";
const END: &[u8] = b"END";
const DEVICE_INFO: u8 = 0x02;
const DEVICE_INFO_LEN: usize = 7;
const ACK: u8 = 0x06;

/// Width of the model and revision fields of the device info response
pub const INFO_FIELD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnytoneRequest {
    Program,
    End,
    DeviceInfo,
    Read { address: u32, length: u8 },
    Write { address: u32, payload: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnytoneResponse {
    Program,
    DeviceInfo { model: Vec<u8>, revision: Vec<u8> },
    Read { address: u32, payload: Vec<u8> },
    Write,
}

/// Codec for the AnyTone wire format
#[derive(Debug, Clone, Default)]
pub struct AnytoneProtocol {
    checksum: ChecksumPolicy,
}

impl AnytoneProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.checksum = policy;
        self
    }
}

fn fixed_field(out: &mut Vec<u8>, value: &[u8]) {
    let len = value.len().min(INFO_FIELD_LEN);
    out.extend_from_slice(&value[..len]);
    out.resize(out.len() + INFO_FIELD_LEN - len, 0);
}

impl WireProtocol for AnytoneProtocol {
    type Request = AnytoneRequest;
    type Response = AnytoneResponse;

    fn decode(&self, buffer: &mut Vec<u8>) -> Result<Option<AnytoneRequest>> {
        if buffer.starts_with(PROGRAM) {
            buffer.drain(..PROGRAM.len());
            return Ok(Some(AnytoneRequest::Program));
        }
        if buffer.starts_with(END) {
            buffer.drain(..END.len());
            return Ok(Some(AnytoneRequest::End));
        }

        match buffer.first() {
            Some(&DEVICE_INFO) if buffer.len() >= DEVICE_INFO_LEN => {
                buffer.drain(..DEVICE_INFO_LEN);
                Ok(Some(AnytoneRequest::DeviceInfo))
            }
            Some(b'R') if buffer.len() >= 6 => {
                let address = read_u32_be(&buffer[1..5])?;
                let length = buffer[5];
                buffer.drain(..6);
                Ok(Some(AnytoneRequest::Read { address, length }))
            }
            Some(b'W') if buffer.len() >= 8 => {
                let address = read_u32_be(&buffer[1..5])?;
                let length = buffer[5] as usize;
                if buffer.len() < length + 8 {
                    return Ok(None);
                }
                let payload = buffer[6..6 + length].to_vec();
                let received = buffer[6 + length];
                let computed = sum8(&buffer[1..6 + length]);
                buffer.drain(..8 + length);
                self.checksum.check(received, computed)?;
                Ok(Some(AnytoneRequest::Write { address, payload }))
            }
            // Incomplete frame or unknown prefix; wait for more data
            _ => Ok(None),
        }
    }

    fn encode(&self, response: &AnytoneResponse, out: &mut Vec<u8>) {
        match response {
            AnytoneResponse::Program => out.extend_from_slice(b"QX\x06"),
            AnytoneResponse::DeviceInfo { model, revision } => {
                out.extend_from_slice(b"ID");
                fixed_field(out, model);
                out.push(0x00);
                fixed_field(out, revision);
                out.push(ACK);
            }
            AnytoneResponse::Read { address, payload } => {
                let start = out.len();
                out.push(b'W');
                out.extend_from_slice(&write_u32_be(*address));
                out.push(payload.len() as u8);
                out.extend_from_slice(payload);
                let crc = sum8(&out[start + 1..]);
                out.push(crc);
                out.push(ACK);
            }
            AnytoneResponse::Write => out.push(ACK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::protocol::ProtocolError;

    fn write_frame(address: u32, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![b'W'];
        frame.extend_from_slice(&address.to_be_bytes());
        frame.push(payload.len() as u8);
        frame.extend_from_slice(payload);
        frame.push(sum8(&frame[1..]));
        frame.push(ACK);
        frame
    }

    #[test]
    fn test_decode_commands() {
        let protocol = AnytoneProtocol::new();
        let mut buffer = b"PROGRAM\x02\x00\x00\x00\x00\x00\x00END".to_vec();
        assert_eq!(protocol.decode(&mut buffer).unwrap(), Some(AnytoneRequest::Program));
        assert_eq!(protocol.decode(&mut buffer).unwrap(), Some(AnytoneRequest::DeviceInfo));
        assert_eq!(protocol.decode(&mut buffer).unwrap(), Some(AnytoneRequest::End));
        assert!(buffer.is_empty());
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_partial_command_waits() {
        let protocol = AnytoneProtocol::new();
        let mut buffer = b"PROG".to_vec();
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
        assert_eq!(buffer, b"PROG");
        buffer.extend_from_slice(b"RAM");
        assert_eq!(protocol.decode(&mut buffer).unwrap(), Some(AnytoneRequest::Program));
    }

    #[test]
    fn test_split_device_info_waits() {
        let protocol = AnytoneProtocol::new();
        let mut buffer = vec![0x02, 0x00, 0x00];
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
        assert_eq!(buffer.len(), 3);
        buffer.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, b'E']);
        assert_eq!(protocol.decode(&mut buffer).unwrap(), Some(AnytoneRequest::DeviceInfo));
        assert_eq!(buffer, b"E");
    }

    #[test]
    fn test_decode_read() {
        let protocol = AnytoneProtocol::new();
        let mut buffer = vec![b'R', 0x00, 0x02, 0xfa, 0x00];
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
        buffer.push(0x10);
        assert_eq!(
            protocol.decode(&mut buffer).unwrap(),
            Some(AnytoneRequest::Read {
                address: 0x0002_fa00,
                length: 0x10
            })
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_incomplete_write_is_not_consumed() {
        let protocol = AnytoneProtocol::new();
        let frame = write_frame(0x0080_0000, &[1, 2, 3, 4]);
        for len in 0..frame.len() - 1 {
            let mut buffer = frame[..len].to_vec();
            assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
            assert_eq!(buffer.len(), len);
        }

        let mut buffer = frame.clone();
        assert_eq!(
            protocol.decode(&mut buffer).unwrap(),
            Some(AnytoneRequest::Write {
                address: 0x0080_0000,
                payload: vec![1, 2, 3, 4]
            })
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_checksum_mismatch_is_permissive() {
        let mut frame = write_frame(0x100, &[0xaa; 16]);
        frame[22] ^= 0xff;

        let mut buffer = frame.clone();
        let request = AnytoneProtocol::new().decode(&mut buffer).unwrap();
        assert!(matches!(request, Some(AnytoneRequest::Write { .. })));

        let strict = AnytoneProtocol::new().with_checksum_policy(ChecksumPolicy::Reject);
        let mut buffer = frame;
        let result = strict.decode(&mut buffer);
        assert!(matches!(result, Err(ProtocolError::ChecksumMismatch { .. })));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_unknown_prefix_yields_nothing() {
        let protocol = AnytoneProtocol::new();
        let mut buffer = vec![0x55, 0x66];
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_encode_responses() {
        let protocol = AnytoneProtocol::new();
        let mut out = Vec::new();
        protocol.encode(&AnytoneResponse::Program, &mut out);
        assert_eq!(out, b"QX\x06");

        out.clear();
        protocol.encode(
            &AnytoneResponse::DeviceInfo {
                model: b"D878UV2".to_vec(),
                revision: b"V100".to_vec(),
            },
            &mut out,
        );
        assert_eq!(out, b"IDD878UV\x00V100\x00\x00\x06");

        out.clear();
        protocol.encode(&AnytoneResponse::Write, &mut out);
        assert_eq!(out, [ACK]);

        out.clear();
        protocol.encode(
            &AnytoneResponse::Read {
                address: 0x0100_0000,
                payload: vec![1, 2],
            },
            &mut out,
        );
        assert_eq!(out, [b'W', 0x01, 0x00, 0x00, 0x00, 0x02, 0x01, 0x02, 0x06, ACK]);
    }
}
