// Shared pieces of the device wire protocols
// Every vendor protocol decodes requests from a receive buffer and encodes
// responses into a transmit buffer.

use crate::bitwise::ElementError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unexpected request starting with {0:#04x}")]
    UnexpectedRequest(u8),

    #[error("Unknown command {0:#04x}")]
    UnknownCommand(u8),

    #[error("Unknown section {0}")]
    UnknownSection(u8),

    #[error("Checksum mismatch: received {received:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { received: u8, computed: u8 },

    #[error(transparent)]
    Field(#[from] ElementError),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// What to do with a frame whose checksum does not match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChecksumPolicy {
    /// Log the mismatch and accept the frame
    #[default]
    WarnOnly,
    /// Drop the frame
    Reject,
}

impl ChecksumPolicy {
    /// Compare a received checksum with the computed one
    pub fn check(&self, received: u8, computed: u8) -> Result<()> {
        if received == computed {
            return Ok(());
        }
        tracing::warn!(
            "CRC mismatch! received {:#04x}, computed {:#04x}",
            received,
            computed
        );
        match self {
            ChecksumPolicy::WarnOnly => Ok(()),
            ChecksumPolicy::Reject => Err(ProtocolError::ChecksumMismatch { received, computed }),
        }
    }
}

/// 8-bit additive checksum
pub fn sum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte))
}

/// Request decoder and response encoder of one vendor protocol
pub trait WireProtocol: Send {
    type Request: fmt::Debug + Send;
    type Response: fmt::Debug + Send;

    /// Take one complete request from the front of `buffer`.
    ///
    /// Returns `Ok(None)` and leaves the buffer untouched while a frame is
    /// incomplete. Errors always consume the offending bytes.
    fn decode(&self, buffer: &mut Vec<u8>) -> Result<Option<Self::Request>>;

    /// Append the wire form of `response` to `out`
    fn encode(&self, response: &Self::Response, out: &mut Vec<u8>);
}
