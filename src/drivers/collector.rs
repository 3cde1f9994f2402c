// Collects the codeplug images written to an emulated device

use super::traits::{DeviceError, DeviceResult};
use crate::memmap::ModelRom;
use std::fmt;

/// Callback invoked with every completely received image
pub type ImageListener = Box<dyn FnMut(&CodeplugImage) + Send>;

/// Memory written during one programming session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeplugImage {
    pub label: String,
    pub rom: ModelRom,
}

impl CodeplugImage {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            rom: ModelRom::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rom.is_empty()
    }
}

/// Records one image per programming session.
///
/// A session opens with [`start_program`](Self::start_program); writes land
/// in the latest image until the next session starts. A session that wrote
/// nothing leaves its image to be reused by the next one.
#[derive(Default)]
pub struct ImageCollector {
    images: Vec<CodeplugImage>,
    listener: Option<ImageListener>,
}

impl fmt::Debug for ImageCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageCollector")
            .field("images", &self.images)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl ImageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify `listener` of every received image
    pub fn with_listener(mut self, listener: ImageListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[CodeplugImage] {
        &self.images
    }

    pub fn image(&self, index: usize) -> Option<&CodeplugImage> {
        self.images.get(index)
    }

    pub fn first(&self) -> Option<&CodeplugImage> {
        self.images.first()
    }

    pub fn last(&self) -> Option<&CodeplugImage> {
        self.images.last()
    }

    /// The image before the last one
    pub fn previous(&self) -> Option<&CodeplugImage> {
        self.images.len().checked_sub(2).and_then(|i| self.images.get(i))
    }

    pub fn take_images(&mut self) -> Vec<CodeplugImage> {
        std::mem::take(&mut self.images)
    }

    pub fn start_program(&mut self) {
        match self.images.last() {
            Some(image) if image.is_empty() => tracing::info!("Reuse last image."),
            _ => {
                tracing::info!("Create new image.");
                let label = format!("Codeplug {}", self.images.len());
                self.images.push(CodeplugImage::new(label));
            }
        }
    }

    pub fn end_program(&mut self) {
        let Some(image) = self.images.last().filter(|image| !image.is_empty()) else {
            return;
        };
        tracing::info!("Image received.");
        if let Some(listener) = self.listener.as_mut() {
            listener(image);
        }
    }

    /// Store `data` in the current image
    pub fn write(&mut self, address: u32, data: &[u8]) -> DeviceResult<()> {
        let Some(image) = self.images.last_mut() else {
            tracing::error!("No image created yet.");
            return Err(DeviceError::NoImage);
        };
        image.rom.write(address, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_write_without_session() {
        let mut collector = ImageCollector::new();
        assert!(matches!(collector.write(0, b"abc"), Err(DeviceError::NoImage)));
        assert_eq!(collector.count(), 0);
    }

    #[test]
    fn test_sessions() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let mut collector = ImageCollector::new().with_listener(Box::new(move |image| {
            sink.lock().unwrap().push(image.label.clone());
        }));

        collector.start_program();
        collector.write(0x100, b"abc").unwrap();
        collector.write(0x103, b"def").unwrap();
        collector.end_program();
        assert_eq!(collector.count(), 1);
        assert_eq!(collector.last().unwrap().rom.read(0x100, 6).unwrap(), b"abcdef");

        // A session without writes keeps its image around for reuse
        collector.start_program();
        collector.end_program();
        collector.start_program();
        assert_eq!(collector.count(), 2);
        collector.write(0, b"x").unwrap();
        collector.end_program();

        assert_eq!(collector.previous().unwrap().label, "Codeplug 0");
        assert_eq!(collector.image(1).unwrap().label, "Codeplug 1");
        assert_eq!(*received.lock().unwrap(), vec!["Codeplug 0", "Codeplug 1"]);

        let images = collector.take_images();
        assert_eq!(images.len(), 2);
        assert!(collector.first().is_none());
    }
}
