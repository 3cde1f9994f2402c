// Byte transports for emulated devices
// The serial port side of a programming cable, driven from tokio.

use std::io::{self, Read, Write};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

#[derive(Error, Debug)]
pub enum SerialError {
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Port not open")]
    NotOpen,
}

pub type Result<T> = std::result::Result<T, SerialError>;

/// Line settings of the emulated radio's port
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Ignored by USB radios and pseudo terminals
    pub baud_rate: u32,
    pub data_bits: serialport::DataBits,
    pub stop_bits: serialport::StopBits,
    pub parity: serialport::Parity,
    pub flow_control: serialport::FlowControl,

    /// Longest wait for a read or write; a served device polls at this
    /// interval while the line is idle
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            data_bits: serialport::DataBits::Eight,
            stop_bits: serialport::StopBits::One,
            parity: serialport::Parity::None,
            flow_control: serialport::FlowControl::None,
            timeout: Duration::from_millis(250),
        }
    }
}

impl SerialConfig {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// RTS/CTS handshake, required by some cables
    pub fn with_hardware_flow(mut self) -> Self {
        self.flow_control = serialport::FlowControl::Hardware;
        self
    }
}

/// Async serial port wrapper
pub struct SerialPort {
    port: Option<Box<dyn serialport::SerialPort>>,
    config: SerialConfig,
    port_name: String,
}

impl SerialPort {
    pub fn open(port_name: &str, config: SerialConfig) -> Result<Self> {
        let mut port = serialport::new(port_name, config.baud_rate)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .parity(config.parity)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()?;

        // Signal a present radio; pseudo terminals do not support this
        let _ = port.write_data_terminal_ready(true);
        let _ = port.write_request_to_send(true);
        tracing::debug!("Opened {} at {} baud", port_name, config.baud_rate);

        Ok(Self {
            port: Some(port),
            config,
            port_name: port_name.to_string(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn port(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port.as_mut().ok_or(SerialError::NotOpen)
    }

    /// Read whatever arrives within the configured timeout
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let limit = self.config.timeout;
        let port = self.port()?;

        let received = timeout(limit, async {
            loop {
                match port.read(buf) {
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    result => return result,
                }
            }
        })
        .await
        .map_err(|_| SerialError::Timeout(limit))?;
        Ok(received?)
    }

    /// Write part of `buf`, returning the number of bytes taken
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let limit = self.config.timeout;
        let port = self.port()?;

        let written = timeout(limit, async { port.write(buf) })
            .await
            .map_err(|_| SerialError::Timeout(limit))?;
        Ok(written?)
    }

    pub async fn flush(&mut self) -> Result<()> {
        Ok(self.port()?.flush()?)
    }

    /// Drop stale data in both directions
    pub fn clear_all(&mut self) -> Result<()> {
        Ok(self.port()?.clear(serialport::ClearBuffer::All)?)
    }

    pub fn close(mut self) -> Result<()> {
        self.port.take();
        tracing::debug!("Closed {}", self.port_name);
        Ok(())
    }
}

/// Full-duplex byte stream a device is served on
pub trait Transport: Send {
    /// Read whatever is available into `buf`.
    /// `Ok(0)` means the peer has gone away, a timeout only means silence.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write some of `buf`, returning the number of bytes taken
    async fn write(&mut self, buf: &[u8]) -> Result<usize>;

    async fn flush(&mut self) -> Result<()>;
}

impl Transport for SerialPort {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        SerialPort::read(self, buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        SerialPort::write(self, buf).await
    }

    async fn flush(&mut self) -> Result<()> {
        SerialPort::flush(self).await
    }
}

/// Names of the serial ports present on this machine
pub fn list_ports() -> Result<Vec<String>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|port| port.port_name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.data_bits, serialport::DataBits::Eight);
        assert_eq!(config.flow_control, serialport::FlowControl::None);

        let config = SerialConfig::new(9600)
            .with_timeout(Duration::from_millis(500))
            .with_hardware_flow();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.flow_control, serialport::FlowControl::Hardware);
    }

    #[test]
    fn test_open_missing_port() {
        let result = SerialPort::open("/dev/does-not-exist", SerialConfig::default());
        assert!(matches!(result, Err(SerialError::Port(_))));
    }
}
