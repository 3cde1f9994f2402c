// Mock serial port for testing without hardware

use super::comm::{SerialConfig, SerialError, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock serial port for testing
#[derive(Clone)]
pub struct MockSerialPort {
    /// Data to be read (simulates the programming software sending)
    read_buffer: Arc<Mutex<VecDeque<u8>>>,

    /// Data that was written (the emulated device's responses)
    write_buffer: Arc<Mutex<Vec<u8>>>,

    /// Reads return EOF once the read buffer is drained
    closed: Arc<Mutex<bool>>,

    /// Largest chunk a single read or write moves
    chunk_size: usize,

    /// Configuration
    config: SerialConfig,

    /// Simulated delay for read/write operations (in ms)
    delay_ms: u64,
}

impl MockSerialPort {
    /// Create a new mock serial port
    pub fn new() -> Self {
        Self {
            read_buffer: Arc::new(Mutex::new(VecDeque::new())),
            write_buffer: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(Mutex::new(false)),
            chunk_size: usize::MAX,
            config: SerialConfig::default(),
            delay_ms: 0,
        }
    }

    /// Set simulated delay for operations
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Split reads and writes into chunks of at most `size` bytes
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Push data to be read
    pub fn push_read_data(&mut self, data: &[u8]) {
        let mut buffer = self.read_buffer.lock().unwrap();
        buffer.extend(data.iter().copied());
    }

    /// Hang up after the pending read data
    pub fn close(&mut self) {
        *self.closed.lock().unwrap() = true;
    }

    /// Get data that was written
    pub fn get_written_data(&self) -> Vec<u8> {
        self.write_buffer.lock().unwrap().clone()
    }

    /// Clear written data
    pub fn clear_written_data(&mut self) {
        self.write_buffer.lock().unwrap().clear();
    }

    /// Check if a specific sequence was written
    pub fn was_written(&self, expected: &[u8]) -> bool {
        let buffer = self.write_buffer.lock().unwrap();
        buffer
            .windows(expected.len())
            .any(|window| window == expected)
    }

    /// Get number of bytes available to read
    pub fn bytes_available(&self) -> usize {
        self.read_buffer.lock().unwrap().len()
    }

    async fn delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
    }

    /// Simulate reading bytes
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        self.delay().await;

        let mut buffer = self.read_buffer.lock().unwrap();
        let count = buf.len().min(buffer.len()).min(self.chunk_size);
        for (item, byte) in buf.iter_mut().zip(buffer.drain(..count)) {
            *item = byte;
        }

        if count > 0 {
            Ok(count)
        } else if *self.closed.lock().unwrap() {
            Ok(0)
        } else {
            Err(SerialError::Timeout(self.config.timeout))
        }
    }

    /// Simulate writing bytes
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, SerialError> {
        self.delay().await;

        let count = buf.len().min(self.chunk_size);
        let mut buffer = self.write_buffer.lock().unwrap();
        buffer.extend_from_slice(&buf[..count]);
        Ok(count)
    }

    /// Simulate flush (no-op for mock)
    pub async fn flush(&mut self) -> Result<(), SerialError> {
        Ok(())
    }
}

impl Default for MockSerialPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockSerialPort {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        MockSerialPort::read(self, buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, SerialError> {
        MockSerialPort::write(self, buf).await
    }

    async fn flush(&mut self) -> Result<(), SerialError> {
        MockSerialPort::flush(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_serial_basic() {
        let mut port = MockSerialPort::new();
        port.push_read_data(b"Hello");

        let mut buf = [0u8; 5];
        assert_eq!(port.read(&mut buf).await.unwrap(), 5);
        assert_eq!(&buf, b"Hello");

        port.write(b"World").await.unwrap();
        assert_eq!(port.get_written_data(), b"World");
        port.clear_written_data();
        assert!(port.get_written_data().is_empty());
    }

    #[tokio::test]
    async fn test_mock_serial_timeout_and_close() {
        let mut port = MockSerialPort::new();
        let mut buf = [0u8; 5];
        assert!(matches!(
            port.read(&mut buf).await,
            Err(SerialError::Timeout(_))
        ));

        port.push_read_data(b"Hi");
        port.close();
        assert_eq!(port.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"Hi");
        assert_eq!(port.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mock_chunking() {
        let mut port = MockSerialPort::new().with_chunk_size(3);
        port.push_read_data(b"PROGRAM");

        let mut buf = [0u8; 16];
        assert_eq!(port.read(&mut buf).await.unwrap(), 3);
        assert_eq!(port.bytes_available(), 4);
        assert_eq!(port.write(b"QX\x06ID").await.unwrap(), 3);
        assert!(port.was_written(b"QX\x06"));
        assert!(!port.was_written(b"ID"));
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let mut port = MockSerialPort::new().with_delay(10);
        port.push_read_data(b"Test");

        let start = std::time::Instant::now();
        let mut buf = [0u8; 4];
        port.read(&mut buf).await.unwrap();
        assert!(start.elapsed().as_millis() >= 10);
    }
}
