// AnyTone device emulation
// Models the D868UV/D878UV/D578UV family answering the manufacturer CPS.

use super::session::DeviceSession;
use super::traits::{Device, DeviceError, DeviceMemory, DeviceResult, RequestHandler};
use crate::formats::ModelDefinition;
use crate::serial::{AnytoneProtocol, AnytoneRequest, AnytoneResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnytoneState {
    Initial,
    Program,
}

/// Answers AnyTone requests; device info, reads and writes are only
/// served in program mode.
pub struct AnytoneDevice {
    memory: DeviceMemory,
    model: Vec<u8>,
    revision: Vec<u8>,
    state: AnytoneState,
}

impl AnytoneDevice {
    pub fn new(memory: DeviceMemory, model: &str, revision: &str) -> Self {
        Self {
            memory,
            model: model.as_bytes().to_vec(),
            revision: revision.as_bytes().to_vec(),
            state: AnytoneState::Initial,
        }
    }

    pub fn state(&self) -> AnytoneState {
        self.state
    }
}

impl RequestHandler for AnytoneDevice {
    type Protocol = AnytoneProtocol;

    fn handle(&mut self, request: AnytoneRequest) -> Option<AnytoneResponse> {
        match (self.state, request) {
            (state, AnytoneRequest::Program) => {
                if state == AnytoneState::Initial {
                    self.memory.start_program();
                }
                tracing::debug!("Enter program mode.");
                self.state = AnytoneState::Program;
                Some(AnytoneResponse::Program)
            }
            (AnytoneState::Program, AnytoneRequest::DeviceInfo) => {
                tracing::debug!("Get device info.");
                Some(AnytoneResponse::DeviceInfo {
                    model: self.model.clone(),
                    revision: self.revision.clone(),
                })
            }
            (AnytoneState::Program, AnytoneRequest::Read { address, length }) => {
                tracing::debug!("Read {}b from {:x}h.", length, address);
                match self.memory.read(address, length as usize) {
                    Ok(payload) => Some(AnytoneResponse::Read { address, payload }),
                    Err(_) => {
                        tracing::error!("Cannot read from emulated device.");
                        None
                    }
                }
            }
            (AnytoneState::Program, AnytoneRequest::Write { address, payload }) => {
                tracing::debug!("Write {}b to {:x}h.", payload.len(), address);
                self.memory
                    .write(address, &payload)
                    .ok()
                    .map(|_| AnytoneResponse::Write)
            }
            (state, AnytoneRequest::End) => {
                if state == AnytoneState::Program {
                    self.memory.end_program();
                }
                tracing::debug!("Done.");
                self.state = AnytoneState::Initial;
                None
            }
            (_, request) => {
                tracing::warn!("Unknown request {:?}.", request);
                None
            }
        }
    }

    fn memory(&self) -> &DeviceMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut DeviceMemory {
        &mut self.memory
    }
}

fn create(
    definition: &ModelDefinition,
    firmware: Option<&str>,
    memory: DeviceMemory,
) -> DeviceResult<Box<dyn Device>> {
    let model = definition
        .model_id(firmware)?
        .ok_or(DeviceError::MissingProperty {
            class: "anytone",
            property: "model",
        })?;
    let revision = definition
        .revision(firmware)?
        .ok_or(DeviceError::MissingProperty {
            class: "anytone",
            property: "revision",
        })?;

    let mut protocol = AnytoneProtocol::new();
    if let Some(policy) = definition.checksum {
        protocol = protocol.with_checksum_policy(policy);
    }
    let handler = AnytoneDevice::new(memory, model, revision);
    Ok(Box::new(DeviceSession::new("anytone", protocol, handler)))
}

crate::register_device_class!("anytone", "AnyTone D868UV, D878UV and D578UV radios", create);
