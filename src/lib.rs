// codeplug-rs: codeplug patterns and radio emulation for programming software

pub mod bitwise;
pub mod drivers;
pub mod formats;
pub mod memmap;
pub mod pattern;
pub mod serial;

// Re-export commonly used types
pub use bitwise::{Address, Endianness, Offset, Size};
pub use drivers::{create_device, serve, Device, DeviceError, ImageCollector};
pub use formats::ModelDefinition;
pub use memmap::ModelRom;
pub use pattern::{parse_str, PatternError, PatternTree};
pub use serial::{ChecksumPolicy, SerialConfig, SerialPort, Transport, WireProtocol};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
