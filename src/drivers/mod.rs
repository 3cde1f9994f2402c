// Emulated device framework
pub mod collector;
pub mod registry;
pub mod session;
pub mod traits;

// Device classes
pub mod anytone;
pub mod opengd77;
pub mod radtel;

pub use collector::{CodeplugImage, ImageCollector, ImageListener};
pub use registry::{create_device, get_device_class, list_device_classes, DeviceClass};
pub use session::{serve, DeviceSession};
pub use traits::{Device, DeviceError, DeviceMemory, DeviceResult, RequestHandler};
