// Registry of emulated device classes

use super::collector::ImageCollector;
use super::traits::{Device, DeviceError, DeviceMemory, DeviceResult};
use crate::formats::ModelDefinition;
use crate::pattern::PatternTree;
use std::collections::HashMap;

/// Builds a device of one class from a model definition
pub type DeviceFactory =
    fn(&ModelDefinition, Option<&str>, DeviceMemory) -> DeviceResult<Box<dyn Device>>;

/// A device class, i.e. a wire protocol family
pub struct DeviceClass {
    pub name: &'static str,
    pub description: &'static str,
    pub create: DeviceFactory,
}

impl DeviceClass {
    pub const fn new(name: &'static str, description: &'static str, create: DeviceFactory) -> Self {
        Self {
            name,
            description,
            create,
        }
    }
}

inventory::collect!(DeviceClass);

lazy_static::lazy_static! {
    static ref DEVICE_CLASSES: HashMap<&'static str, &'static DeviceClass> =
        inventory::iter::<DeviceClass>
            .into_iter()
            .map(|class| (class.name, class))
            .collect();
}

/// Look up a device class by name
pub fn get_device_class(name: &str) -> Option<&'static DeviceClass> {
    DEVICE_CLASSES.get(name).copied()
}

/// List all registered device classes, sorted by name
pub fn list_device_classes() -> Vec<&'static DeviceClass> {
    let mut classes: Vec<_> = DEVICE_CLASSES.values().copied().collect();
    classes.sort_by_key(|class| class.name);
    classes
}

/// Instantiate the device described by `definition` running `firmware`.
///
/// The ROM is the base layer overlaid with the firmware layer. Without an
/// explicit `pattern` the codeplug file named by the definition is loaded.
pub fn create_device(
    definition: &ModelDefinition,
    firmware: Option<&str>,
    pattern: Option<PatternTree>,
    collector: ImageCollector,
) -> DeviceResult<Box<dyn Device>> {
    let class = get_device_class(&definition.class)
        .ok_or_else(|| DeviceError::UnknownClass(definition.class.clone()))?;

    let rom = definition.compose_rom(firmware)?;
    let pattern = match pattern {
        Some(pattern) => Some(pattern),
        None => match definition.codeplug_path(firmware)? {
            Some(path) => Some(PatternTree::load(path)?),
            None => None,
        },
    };
    if pattern.is_none() {
        tracing::warn!("No codeplug pattern for {}, writes are not checked.", definition.name);
    }

    tracing::info!(
        "Create {} device for {} {} (firmware {})",
        class.name,
        definition.manufacturer,
        definition.name,
        firmware.unwrap_or("none")
    );
    let memory = DeviceMemory::new(rom)
        .with_pattern(pattern)
        .with_collector(collector);
    (class.create)(definition, firmware, memory)
}

/// Helper macro to register a device class
#[macro_export]
macro_rules! register_device_class {
    ($name:expr, $description:expr, $create:expr) => {
        inventory::submit! {
            $crate::drivers::registry::DeviceClass::new($name, $description, $create)
        }
    };
}
