// Model definition files
pub mod definition;

pub use definition::{DefinitionError, FirmwareDefinition, ModelDefinition, RomSegment};
