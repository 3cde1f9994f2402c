// Radtel device emulation

use super::session::DeviceSession;
use super::traits::{Device, DeviceMemory, DeviceResult, RequestHandler};
use crate::formats::ModelDefinition;
use crate::serial::radtel_protocol::PAGE_SIZE;
use crate::serial::{RadtelCommand, RadtelProtocol, RadtelRequest, RadtelResponse};

/// Answers Radtel page requests. Every request is acknowledged, failed
/// reads included.
pub struct RadtelDevice {
    memory: DeviceMemory,
}

impl RadtelDevice {
    pub fn new(memory: DeviceMemory) -> Self {
        Self { memory }
    }
}

impl RequestHandler for RadtelDevice {
    type Protocol = RadtelProtocol;

    fn handle(&mut self, request: RadtelRequest) -> Option<RadtelResponse> {
        let address = request.address();
        match request {
            RadtelRequest::Command(RadtelCommand::EnterProgrammingMode) => {
                self.memory.start_program();
            }
            RadtelRequest::Command(RadtelCommand::LeaveProgrammingMode) => {
                self.memory.end_program();
            }
            RadtelRequest::Read { page } => {
                let address = address.unwrap_or_default();
                tracing::debug!("Read {}b from {:x}h.", PAGE_SIZE, address);
                if let Ok(payload) = self.memory.read(address, PAGE_SIZE) {
                    return Some(RadtelResponse::Read { page, payload });
                }
            }
            RadtelRequest::Write { payload, .. } => {
                let address = address.unwrap_or_default();
                tracing::debug!("Write {}b to {:x}h.", payload.len(), address);
                // Failures are logged by the collector and acknowledged anyway
                let _ = self.memory.write(address, &payload);
            }
        }
        Some(RadtelResponse::Ack)
    }

    fn memory(&self) -> &DeviceMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut DeviceMemory {
        &mut self.memory
    }
}

fn create(
    definition: &ModelDefinition,
    _firmware: Option<&str>,
    memory: DeviceMemory,
) -> DeviceResult<Box<dyn Device>> {
    let mut protocol = RadtelProtocol::new();
    if let Some(policy) = definition.checksum {
        protocol = protocol.with_checksum_policy(policy);
    }
    Ok(Box::new(DeviceSession::new(
        "radtel",
        protocol,
        RadtelDevice::new(memory),
    )))
}

crate::register_device_class!("radtel", "Radtel RT-4D and compatible radios", create);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memmap::ModelRom;
    use crate::serial::sum8;

    fn with_crc(mut frame: Vec<u8>) -> Vec<u8> {
        frame.push(sum8(&frame));
        frame
    }

    fn session() -> DeviceSession<RadtelDevice> {
        let mut rom = ModelRom::new();
        rom.write(0x0400, &[0x5a; PAGE_SIZE]);
        DeviceSession::new(
            "radtel",
            RadtelProtocol::new(),
            RadtelDevice::new(DeviceMemory::new(rom)),
        )
    }

    fn take_output(device: &mut impl Device) -> Vec<u8> {
        let output = device.pending_output().to_vec();
        device.on_bytes_written(output.len());
        output
    }

    #[test]
    fn test_read_pages() {
        let mut device = session();
        device.on_bytes_available(&with_crc(vec![b'R', 0x00, 0x01]));
        let output = take_output(&mut device);
        assert_eq!(output.len(), PAGE_SIZE + 4);
        assert_eq!(&output[..4], &[b'R', 0x00, 0x01, 0x5a]);

        // Unmapped pages are acknowledged only
        device.on_bytes_available(&with_crc(vec![b'R', 0x00, 0x07]));
        assert_eq!(take_output(&mut device), [0x06]);
    }

    #[test]
    fn test_program_session() {
        let mut device = session();
        device.on_bytes_available(&with_crc(vec![0x34, 0x52, 0x05, 0x10]));
        assert_eq!(take_output(&mut device), [0x06]);

        let mut frame = vec![0x91, 0x00, 0x02];
        frame.extend_from_slice(&[0x11; PAGE_SIZE]);
        let frame = with_crc(frame);
        device.on_bytes_available(&frame[..600]);
        assert!(device.pending_output().is_empty());
        device.on_bytes_available(&frame[600..]);
        assert_eq!(take_output(&mut device), [0x06]);

        device.on_bytes_available(&with_crc(vec![0x34, 0x52, 0x05, 0xee]));
        assert_eq!(take_output(&mut device), [0x06]);

        let image = device.collector().last().unwrap();
        assert_eq!(image.rom.read(0x0100_0800, PAGE_SIZE).unwrap(), &[0x11; PAGE_SIZE]);
    }

    #[test]
    fn test_corrupt_frame_is_dropped() {
        let mut device = session();
        let mut frame = with_crc(vec![0x34, 0x52, 0x05, 0x10]);
        frame[4] ^= 0xff;
        frame.extend(with_crc(vec![b'R', 0x00, 0x01]));
        device.on_bytes_available(&frame);

        let output = take_output(&mut device);
        assert_eq!(output[0], b'R');
        assert_eq!(device.collector().count(), 0);
    }

    #[test]
    fn test_write_outside_session_is_acknowledged() {
        let mut device = session();
        let mut frame = vec![0x90, 0x00, 0x00];
        frame.extend_from_slice(&[0; PAGE_SIZE]);
        device.on_bytes_available(&with_crc(frame));
        assert_eq!(take_output(&mut device), [0x06]);
        assert_eq!(device.collector().count(), 0);
    }
}
