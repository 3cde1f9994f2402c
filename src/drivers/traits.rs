// Emulated device traits

use super::collector::ImageCollector;
use crate::formats::DefinitionError;
use crate::memmap::ModelRom;
use crate::pattern::{PatternError, PatternTree};
use crate::serial::{SerialError, WireProtocol};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Unknown device class: {0}")]
    UnknownClass(String),

    #[error("Device class {class} needs the model property '{property}'")]
    MissingProperty {
        class: &'static str,
        property: &'static str,
    },

    #[error("No image created yet")]
    NoImage,

    #[error("Cannot read {len}b from ROM at address {address:x}h")]
    Read { address: u32, len: usize },

    #[error("Model definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Codeplug pattern error: {0}")]
    Pattern(#[from] PatternError),

    #[error("Serial communication error: {0}")]
    Serial(#[from] SerialError),
}

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// A radio answering a programming session over a byte stream
pub trait Device: Send {
    /// Device class name
    fn name(&self) -> &str;

    /// Feed bytes received from the programming software
    fn on_bytes_available(&mut self, data: &[u8]);

    /// Confirm that `count` bytes of the pending output were sent
    fn on_bytes_written(&mut self, count: usize);

    /// Encoded responses not yet sent
    fn pending_output(&self) -> &[u8];

    fn collector(&self) -> &ImageCollector;

    fn collector_mut(&mut self) -> &mut ImageCollector;
}

/// Answers decoded requests of one wire protocol
pub trait RequestHandler: Send {
    type Protocol: WireProtocol;

    /// Produce the response to `request`, if the protocol expects one
    fn handle(
        &mut self,
        request: <Self::Protocol as WireProtocol>::Request,
    ) -> Option<<Self::Protocol as WireProtocol>::Response>;

    fn memory(&self) -> &DeviceMemory;

    fn memory_mut(&mut self) -> &mut DeviceMemory;
}

/// State every emulated device shares: the ROM reads are answered from,
/// the optional codeplug pattern and the collector receiving writes.
#[derive(Debug, Default)]
pub struct DeviceMemory {
    rom: ModelRom,
    pattern: Option<PatternTree>,
    collector: ImageCollector,
}

impl DeviceMemory {
    pub fn new(rom: ModelRom) -> Self {
        Self {
            rom,
            ..Default::default()
        }
    }

    pub fn with_pattern(mut self, pattern: Option<PatternTree>) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_collector(mut self, collector: ImageCollector) -> Self {
        self.collector = collector;
        self
    }

    pub fn rom(&self) -> &ModelRom {
        &self.rom
    }

    pub fn rom_mut(&mut self) -> &mut ModelRom {
        &mut self.rom
    }

    pub fn pattern(&self) -> Option<&PatternTree> {
        self.pattern.as_ref()
    }

    pub fn collector(&self) -> &ImageCollector {
        &self.collector
    }

    pub fn collector_mut(&mut self) -> &mut ImageCollector {
        &mut self.collector
    }

    /// Read `len` bytes from the ROM
    pub fn read(&self, address: u32, len: usize) -> DeviceResult<Vec<u8>> {
        match self.rom.read(address, len) {
            Ok(data) => Ok(data.to_vec()),
            Err(_) => {
                tracing::error!("Cannot read {}b from ROM at address {:x}h.", len, address);
                Err(DeviceError::Read { address, len })
            }
        }
    }

    /// Hand written data to the image collector; the ROM stays untouched
    pub fn write(&mut self, address: u32, data: &[u8]) -> DeviceResult<()> {
        if let Some(pattern) = &self.pattern {
            if !pattern.covers(address, data.len()) {
                tracing::warn!(
                    "Write of {}b at {:x}h is not covered by the codeplug pattern.",
                    data.len(),
                    address
                );
            }
        }
        self.collector.write(address, data)
    }

    pub fn start_program(&mut self) {
        self.collector.start_program();
    }

    pub fn end_program(&mut self) {
        self.collector.end_program();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::parse_str;

    #[test]
    fn test_read() {
        let mut rom = ModelRom::new();
        rom.write(0x100, b"abcdef");
        let memory = DeviceMemory::new(rom);

        assert_eq!(memory.read(0x102, 2).unwrap(), b"cd");
        assert!(matches!(
            memory.read(0x104, 4),
            Err(DeviceError::Read {
                address: 0x104,
                len: 4
            })
        ));
    }

    #[test]
    fn test_write_goes_to_collector() {
        let mut memory = DeviceMemory::new(ModelRom::new());
        assert!(memory.write(0, b"abc").is_err());

        memory.start_program();
        memory.write(0, b"abc").unwrap();
        assert!(memory.rom().is_empty());
        assert_eq!(memory.collector().last().unwrap().rom.read(0, 3).unwrap(), b"abc");
    }

    #[test]
    fn test_write_outside_pattern_is_accepted() {
        let pattern = parse_str(r#"<codeplug><uint32le at="10"/></codeplug>"#).unwrap();
        let mut memory = DeviceMemory::new(ModelRom::new()).with_pattern(Some(pattern));
        assert!(memory.pattern().is_some());

        memory.start_program();
        memory.write(0x10, &[1, 2, 3, 4]).unwrap();
        memory.write(0x80, &[5]).unwrap();
        let image = &memory.collector().last().unwrap().rom;
        assert_eq!(image.segment_count(), 2);
    }
}
