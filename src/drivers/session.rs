// Request/response session driving a device over a byte stream

use super::collector::ImageCollector;
use super::traits::{Device, DeviceResult, RequestHandler};
use crate::serial::{SerialError, Transport, WireProtocol};

/// Size of a single transport read
const READ_CHUNK: usize = 4096;

/// Owns the receive and transmit buffers of one connection.
///
/// Received bytes are appended to the input buffer and decoded while
/// complete requests are available; every response is encoded once into the
/// output buffer, which shrinks as the transport confirms written bytes.
pub struct DeviceSession<H: RequestHandler> {
    name: &'static str,
    protocol: H::Protocol,
    handler: H,
    in_buffer: Vec<u8>,
    out_buffer: Vec<u8>,
}

impl<H: RequestHandler> DeviceSession<H> {
    pub fn new(name: &'static str, protocol: H::Protocol, handler: H) -> Self {
        Self {
            name,
            protocol,
            handler,
            in_buffer: Vec::new(),
            out_buffer: Vec::new(),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Received bytes not yet forming a complete request
    pub fn pending_input(&self) -> &[u8] {
        &self.in_buffer
    }
}

impl<H: RequestHandler> Device for DeviceSession<H> {
    fn name(&self) -> &str {
        self.name
    }

    fn on_bytes_available(&mut self, data: &[u8]) {
        self.in_buffer.extend_from_slice(data);

        loop {
            let before = self.in_buffer.len();
            match self.protocol.decode(&mut self.in_buffer) {
                Ok(Some(request)) => {
                    tracing::debug!("{}: received {:?}", self.name, request);
                    if let Some(response) = self.handler.handle(request) {
                        tracing::debug!("{}: respond {:?}", self.name, response);
                        self.protocol.encode(&response, &mut self.out_buffer);
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::error!("Cannot receive/handle request: {}", err);
                    if self.in_buffer.len() >= before {
                        break;
                    }
                }
            }
        }
    }

    fn on_bytes_written(&mut self, count: usize) {
        let count = count.min(self.out_buffer.len());
        self.out_buffer.drain(..count);
    }

    fn pending_output(&self) -> &[u8] {
        &self.out_buffer
    }

    fn collector(&self) -> &ImageCollector {
        self.handler.memory().collector()
    }

    fn collector_mut(&mut self) -> &mut ImageCollector {
        self.handler.memory_mut().collector_mut()
    }
}

/// Run `device` on `transport` until the peer hangs up
pub async fn serve<T, D>(transport: &mut T, device: &mut D) -> DeviceResult<()>
where
    T: Transport,
    D: Device + ?Sized,
{
    tracing::info!("Serving {} device", device.name());
    let mut buffer = vec![0u8; READ_CHUNK];

    loop {
        match transport.read(&mut buffer).await {
            Ok(0) => {
                tracing::info!("Connection closed");
                return Ok(());
            }
            Ok(n) => device.on_bytes_available(&buffer[..n]),
            Err(SerialError::Timeout(_)) => continue,
            Err(err) => return Err(err.into()),
        }

        while !device.pending_output().is_empty() {
            let written = transport.write(device.pending_output()).await?;
            device.on_bytes_written(written);
            if written == 0 {
                break;
            }
        }
        transport.flush().await?;
    }
}
