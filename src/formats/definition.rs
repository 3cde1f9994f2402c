// Model definitions for emulated radios
// A JSON document names the device class and carries the ROM content the
// emulated radio answers reads from, split into a base layer and one layer per
// firmware release.

use crate::memmap::ModelRom;
use crate::serial::ChecksumPolicy;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model {model} has no firmware {firmware}")]
    UnknownFirmware { model: String, firmware: String },
}

pub type Result<T> = std::result::Result<T, DefinitionError>;

/// Bytes stored at a fixed address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomSegment {
    #[serde(serialize_with = "write_address", deserialize_with = "read_address")]
    pub address: u32,

    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl RomSegment {
    pub fn new(address: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            address,
            data: data.into(),
        }
    }
}

/// Addresses are written as hex strings, plain numbers are accepted too
#[derive(Deserialize)]
#[serde(untagged)]
enum AddressRepr {
    Number(u32),
    Text(String),
}

fn read_address<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    match AddressRepr::deserialize(deserializer)? {
        AddressRepr::Number(address) => Ok(address),
        AddressRepr::Text(text) => {
            let digits = text.trim();
            let digits = digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_suffix('h'))
                .unwrap_or(digits);
            u32::from_str_radix(digits, 16)
                .map_err(|e| serde::de::Error::custom(format!("invalid address '{}': {}", text, e)))
        }
    }
}

fn write_address<S: Serializer>(address: &u32, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:x}h", address))
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid base64 content: {}", e)))
    }
}

fn layer(segments: &[RomSegment]) -> ModelRom {
    let mut rom = ModelRom::new();
    for segment in segments {
        rom.write(segment.address, &segment.data);
    }
    rom
}

/// One firmware release of a model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirmwareDefinition {
    pub name: String,

    /// Release date, free form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<String>,

    #[serde(default)]
    pub description: String,

    /// Codeplug pattern of this release, overrides the model's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codeplug: Option<PathBuf>,

    /// Model identifier, overrides the model's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Hardware revision, overrides the model's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// ROM content differing from the model's base layer
    #[serde(default)]
    pub rom: Vec<RomSegment>,
}

impl FirmwareDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn store_rom(&mut self, address: u32, data: &[u8]) {
        self.rom.push(RomSegment::new(address, data));
    }

    pub fn rom(&self) -> ModelRom {
        layer(&self.rom)
    }
}

/// Description of an emulated radio model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Device class implementing the wire protocol
    pub class: String,

    pub name: String,

    #[serde(default)]
    pub manufacturer: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Model identifier reported by AnyTone radios
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Hardware revision reported by AnyTone radios
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// Checksum handling, the protocol default if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<ChecksumPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codeplug: Option<PathBuf>,

    /// Base ROM layer shared by all firmware releases
    #[serde(default)]
    pub rom: Vec<RomSegment>,

    #[serde(default)]
    pub firmware: Vec<FirmwareDefinition>,

    /// Additional properties
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ModelDefinition {
    pub fn new(class: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn store_rom(&mut self, address: u32, data: &[u8]) {
        self.rom.push(RomSegment::new(address, data));
    }

    pub fn add_firmware(&mut self, firmware: FirmwareDefinition) {
        self.firmware.push(firmware);
    }

    pub fn firmware(&self, name: &str) -> Option<&FirmwareDefinition> {
        self.firmware.iter().find(|firmware| firmware.name == name)
    }

    pub fn firmware_names(&self) -> Vec<&str> {
        self.firmware.iter().map(|firmware| firmware.name.as_str()).collect()
    }

    /// The base ROM layer
    pub fn rom(&self) -> ModelRom {
        layer(&self.rom)
    }

    fn lookup(&self, firmware: &str) -> Result<&FirmwareDefinition> {
        self.firmware(firmware)
            .ok_or_else(|| DefinitionError::UnknownFirmware {
                model: self.name.clone(),
                firmware: firmware.to_string(),
            })
    }

    /// Base layer overlaid with the layer of the given firmware release
    pub fn compose_rom(&self, firmware: Option<&str>) -> Result<ModelRom> {
        let mut rom = self.rom();
        if let Some(name) = firmware {
            rom += &self.lookup(name)?.rom();
        }
        tracing::debug!(
            "Composed ROM of {} ({} segments, {}b)",
            self.name,
            rom.segment_count(),
            rom.stored_bytes()
        );
        Ok(rom)
    }

    /// Codeplug pattern for the given firmware, falling back to the model's
    pub fn codeplug_path(&self, firmware: Option<&str>) -> Result<Option<&Path>> {
        let firmware_codeplug = match firmware {
            Some(name) => self.lookup(name)?.codeplug.as_deref(),
            None => None,
        };
        Ok(firmware_codeplug.or(self.codeplug.as_deref()))
    }

    /// Model identifier reported for the given firmware
    pub fn model_id(&self, firmware: Option<&str>) -> Result<Option<&str>> {
        let firmware_model = match firmware {
            Some(name) => self.lookup(name)?.model.as_deref(),
            None => None,
        };
        Ok(firmware_model.or(self.model.as_deref()))
    }

    /// Hardware revision reported for the given firmware
    pub fn revision(&self, firmware: Option<&str>) -> Result<Option<&str>> {
        let firmware_revision = match firmware {
            Some(name) => self.lookup(name)?.revision.as_deref(),
            None => None,
        };
        Ok(firmware_revision.or(self.revision.as_deref()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a definition file; relative codeplug paths resolve against its directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut definition = Self::from_json(&std::fs::read_to_string(path)?)?;
        if let Some(dir) = path.parent() {
            let resolve = |codeplug: &mut Option<PathBuf>| {
                if let Some(file) = codeplug.as_mut().filter(|file| file.is_relative()) {
                    *file = dir.join(&*file);
                }
            };
            resolve(&mut definition.codeplug);
            for firmware in &mut definition.firmware {
                resolve(&mut firmware.codeplug);
            }
        }
        tracing::info!(
            "Loaded model {} ({} firmware releases) from {}",
            definition.name,
            definition.firmware.len(),
            path.display()
        );
        Ok(definition)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
