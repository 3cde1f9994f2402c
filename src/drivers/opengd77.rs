// OpenGD77 device emulation
// EEPROM content lives at address 0, flash at FLASH_BASE and the firmware
// info block at FIRMWARE_INFO_ADDRESS of the device ROM.

use super::session::DeviceSession;
use super::traits::{Device, DeviceMemory, DeviceResult, RequestHandler};
use crate::formats::ModelDefinition;
use crate::serial::{
    OpenGd77Command, OpenGd77Protocol, OpenGd77Request, OpenGd77Response, ReadSection,
    WriteSection,
};

pub const FLASH_BASE: u32 = 0x0100_0000;
pub const FIRMWARE_INFO_ADDRESS: u32 = 0x0200_0000;
pub const FIRMWARE_INFO_LEN: usize = 46;

pub struct OpenGd77Device {
    memory: DeviceMemory,
    /// Flash sector selected for buffered writes
    sector: Option<u32>,
    programming: bool,
}

impl OpenGd77Device {
    pub fn new(memory: DeviceMemory) -> Self {
        Self {
            memory,
            sector: None,
            programming: false,
        }
    }

    pub fn sector(&self) -> Option<u32> {
        self.sector
    }

    fn command(&mut self, command: OpenGd77Command) -> OpenGd77Response {
        match command {
            OpenGd77Command::ShowCpsScreen => {
                tracing::debug!("Show CPS screen.");
                self.memory.start_program();
                self.programming = true;
            }
            OpenGd77Command::Control(option) if option.ends_session() => {
                tracing::debug!("Control {:?}, leave programming.", option);
                if self.programming {
                    self.memory.end_program();
                    self.programming = false;
                }
            }
            OpenGd77Command::Display { text, .. } => {
                tracing::debug!("Display '{}'.", String::from_utf8_lossy(&text));
            }
            _ => {}
        }
        OpenGd77Response::Command { success: true }
    }

    fn read(&self, section: ReadSection, address: u32, length: u16) -> OpenGd77Response {
        let result = match section {
            ReadSection::Eeprom => self.memory.read(address, length as usize),
            ReadSection::Flash => match FLASH_BASE.checked_add(address) {
                Some(address) => self.memory.read(address, length as usize),
                None => {
                    tracing::error!("Flash address {:x}h out of range.", address);
                    return OpenGd77Response::Command { success: false };
                }
            },
            ReadSection::FirmwareInfo => self.memory.read(FIRMWARE_INFO_ADDRESS, FIRMWARE_INFO_LEN),
            other => {
                tracing::warn!("Reading section {:?} is not supported.", other);
                return OpenGd77Response::Command { success: false };
            }
        };
        match result {
            Ok(data) => OpenGd77Response::Read { data },
            Err(_) => OpenGd77Response::Command { success: false },
        }
    }
}

impl RequestHandler for OpenGd77Device {
    type Protocol = OpenGd77Protocol;

    fn handle(&mut self, request: OpenGd77Request) -> Option<OpenGd77Response> {
        let acknowledge = request.write_section();
        let response = match request {
            OpenGd77Request::Command(command) => self.command(command),
            OpenGd77Request::Read {
                section,
                address,
                length,
            } => self.read(section, address, length),
            OpenGd77Request::SetSector { sector, .. } => {
                tracing::debug!("Select flash sector {:x}h.", sector);
                self.sector = Some(sector);
                OpenGd77Response::Command { success: true }
            }
            OpenGd77Request::WriteSector { .. } => {
                tracing::debug!("Commit flash sector {:x?}.", self.sector);
                OpenGd77Response::Command { success: true }
            }
            OpenGd77Request::WriteData {
                section,
                address,
                data,
                ..
            } => {
                let address = match section {
                    WriteSection::WriteEeprom => Some(address),
                    WriteSection::WriteSectorBuffer => match FLASH_BASE.checked_add(address) {
                        Some(address) => Some(address),
                        None => {
                            tracing::error!("Flash address {:x}h out of range.", address);
                            return Some(OpenGd77Response::Command { success: false });
                        }
                    },
                    _ => None,
                };
                if let Some(address) = address {
                    tracing::debug!("Write {}b to {:x}h.", data.len(), address);
                    if self.memory.write(address, &data).is_err() {
                        return Some(OpenGd77Response::Command { success: false });
                    }
                }
                OpenGd77Response::Command { success: true }
            }
        };

        // Writes of any kind are acknowledged by echoing type and section
        match (acknowledge, response) {
            (Some((kind, section)), OpenGd77Response::Command { success: true }) => {
                Some(OpenGd77Response::Write { kind, section })
            }
            (_, response) => Some(response),
        }
    }

    fn memory(&self) -> &DeviceMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut DeviceMemory {
        &mut self.memory
    }
}

fn create(
    _definition: &ModelDefinition,
    _firmware: Option<&str>,
    memory: DeviceMemory,
) -> DeviceResult<Box<dyn Device>> {
    Ok(Box::new(DeviceSession::new(
        "opengd77",
        OpenGd77Protocol::new(),
        OpenGd77Device::new(memory),
    )))
}

crate::register_device_class!("opengd77", "Radios running the OpenGD77 firmware", create);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::collector::ImageCollector;
    use crate::memmap::ModelRom;
    use std::sync::{Arc, Mutex};

    fn session(collector: ImageCollector) -> DeviceSession<OpenGd77Device> {
        let mut rom = ModelRom::new();
        rom.write(0x0080, b"eeprom");
        rom.write(FLASH_BASE + 0x1000, b"flash");
        rom.write(FIRMWARE_INFO_ADDRESS, &[0x47; FIRMWARE_INFO_LEN]);
        let memory = DeviceMemory::new(rom).with_collector(collector);
        DeviceSession::new("opengd77", OpenGd77Protocol::new(), OpenGd77Device::new(memory))
    }

    fn take_output(device: &mut impl Device) -> Vec<u8> {
        let output = device.pending_output().to_vec();
        device.on_bytes_written(output.len());
        output
    }

    #[test]
    fn test_reads() {
        let mut device = session(ImageCollector::new());
        device.on_bytes_available(&[b'R', 2, 0, 0, 0, 0x80, 0, 6]);
        assert_eq!(take_output(&mut device), b"R\x00\x06eeprom");

        device.on_bytes_available(&[b'R', 1, 0, 0, 0x10, 0x00, 0, 5]);
        assert_eq!(take_output(&mut device), b"R\x00\x05flash");

        device.on_bytes_available(&[b'R', 9, 0, 0, 0, 0, 0, 0]);
        let output = take_output(&mut device);
        assert_eq!(&output[..3], &[b'R', 0x00, 46]);
        assert_eq!(output.len(), 3 + FIRMWARE_INFO_LEN);

        device.on_bytes_available(&[b'R', 2, 0, 0, 0x40, 0x00, 0, 8]);
        device.on_bytes_available(&[b'R', 6, 0, 0, 0, 0, 0, 8]);
        assert_eq!(take_output(&mut device), b"EE");
    }

    #[test]
    fn test_flash_address_out_of_range() {
        let mut device = session(ImageCollector::new());
        device.on_bytes_available(&[b'R', 1, 0xff, 0xff, 0xff, 0xff, 0, 4]);
        assert_eq!(take_output(&mut device), b"E");

        device.on_bytes_available(&[b'C', 0]);
        device.on_bytes_available(&[b'X', 2, 0xff, 0x00, 0x00, 0x00, 0, 1, 0xaa]);
        assert_eq!(take_output(&mut device), b"-E");
        assert!(device.collector().last().unwrap().is_empty());
    }

    #[test]
    fn test_program_session() {
        let received = Arc::new(Mutex::new(0));
        let counter = received.clone();
        let collector = ImageCollector::new().with_listener(Box::new(move |_| {
            *counter.lock().unwrap() += 1;
        }));
        let mut device = session(collector);

        device.on_bytes_available(&[b'C', 0, b'C', 1]);
        assert_eq!(take_output(&mut device), b"--");

        device.on_bytes_available(&[b'W', 4, 0, 0, 0, 0x10, 0, 2, 0xaa, 0xbb]);
        assert_eq!(take_output(&mut device), [b'W', 4]);

        device.on_bytes_available(&[b'X', 1, 0, 0, 0x01]);
        device.on_bytes_available(&[b'X', 2, 0, 0, 0x10, 0x00, 0, 3, 1, 2, 3]);
        device.on_bytes_available(&[b'X', 3]);
        assert_eq!(take_output(&mut device), [b'X', 1, b'X', 2, b'X', 3]);
        assert_eq!(device.handler().sector(), Some(1));

        device.on_bytes_available(&[b'C', 6, 0, b'C', 6, 1]);
        assert_eq!(take_output(&mut device), b"--");

        let image = &device.collector().last().unwrap().rom;
        assert_eq!(image.read(0x10, 2).unwrap(), &[0xaa, 0xbb]);
        assert_eq!(image.read(FLASH_BASE + 0x1000, 3).unwrap(), &[1, 2, 3]);
        assert_eq!(*received.lock().unwrap(), 1);
    }

    #[test]
    fn test_write_without_session_fails() {
        let mut device = session(ImageCollector::new());
        device.on_bytes_available(&[b'W', 4, 0, 0, 0, 0x10, 0, 1, 0xaa]);
        assert_eq!(take_output(&mut device), b"E");
    }

    #[test]
    fn test_unknown_bytes_are_skipped() {
        let mut device = session(ImageCollector::new());
        device.on_bytes_available(&[0x00, 0x01, 0x02]);
        assert!(device.pending_output().is_empty());
        assert!(device.pending_input().is_empty());

        device.on_bytes_available(&[b'C', 0xfe]);
        assert_eq!(take_output(&mut device), b"-");
    }
}
