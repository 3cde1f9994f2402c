// OpenGD77 firmware CPS protocol
// Commands drive the radio screen, reads and writes address one of several
// memory sections.

use super::protocol::{ProtocolError, Result, WireProtocol};
use crate::bitwise::{read_u16_be, read_u24_be, read_u32_be, write_u16_be};

const COMMAND: u8 = b'C';
const READ: u8 = b'R';
const READ_LEN: usize = 8;
const WRITE: u8 = b'W';
const WRITE_ALT: u8 = b'X';
const DATA_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOption {
    SaveSettingsNotVfos,
    Reboot,
    SaveSettingsAndVfos,
    FlashGreenLed,
    FlashRedLed,
    Other(u8),
}

impl From<u8> for ControlOption {
    fn from(value: u8) -> Self {
        match value {
            0 => ControlOption::SaveSettingsNotVfos,
            1 => ControlOption::Reboot,
            2 => ControlOption::SaveSettingsAndVfos,
            3 => ControlOption::FlashGreenLed,
            4 => ControlOption::FlashRedLed,
            other => ControlOption::Other(other),
        }
    }
}

impl ControlOption {
    /// Options the CPS sends when it is done with the radio
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            ControlOption::Reboot
                | ControlOption::SaveSettingsNotVfos
                | ControlOption::SaveSettingsAndVfos
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenGd77Command {
    ShowCpsScreen,
    ClearScreen,
    Display {
        x: u8,
        y: u8,
        font: u8,
        alignment: u8,
        inverted: bool,
        text: Vec<u8>,
    },
    RenderCps,
    CloseCpsScreen,
    Control(ControlOption),
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSection {
    Flash,
    Eeprom,
    McuRom,
    DisplayBuffer,
    WavBuffer,
    AmbeBuffer,
    FirmwareInfo,
}

impl TryFrom<u8> for ReadSection {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            1 => ReadSection::Flash,
            2 => ReadSection::Eeprom,
            5 => ReadSection::McuRom,
            6 => ReadSection::DisplayBuffer,
            7 => ReadSection::WavBuffer,
            8 => ReadSection::AmbeBuffer,
            9 => ReadSection::FirmwareInfo,
            other => return Err(ProtocolError::UnknownSection(other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSection {
    SetFlashSector = 1,
    WriteSectorBuffer = 2,
    WriteFlashSector = 3,
    WriteEeprom = 4,
    WriteWavBuffer = 7,
}

impl TryFrom<u8> for WriteSection {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            1 => WriteSection::SetFlashSector,
            2 => WriteSection::WriteSectorBuffer,
            3 => WriteSection::WriteFlashSector,
            4 => WriteSection::WriteEeprom,
            7 => WriteSection::WriteWavBuffer,
            other => return Err(ProtocolError::UnknownSection(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenGd77Request {
    Command(OpenGd77Command),
    Read {
        section: ReadSection,
        address: u32,
        length: u16,
    },
    /// Select the flash sector buffered by following data writes
    SetSector { kind: u8, sector: u32 },
    /// Commit the sector buffer to flash
    WriteSector { kind: u8 },
    WriteData {
        kind: u8,
        section: WriteSection,
        address: u32,
        data: Vec<u8>,
    },
}

impl OpenGd77Request {
    /// Section byte echoed by the write acknowledgement
    pub fn write_section(&self) -> Option<(u8, WriteSection)> {
        match self {
            OpenGd77Request::SetSector { kind, .. } => Some((*kind, WriteSection::SetFlashSector)),
            OpenGd77Request::WriteSector { kind } => Some((*kind, WriteSection::WriteFlashSector)),
            OpenGd77Request::WriteData { kind, section, .. } => Some((*kind, *section)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenGd77Response {
    Command { success: bool },
    Read { data: Vec<u8> },
    Write { kind: u8, section: WriteSection },
}

/// Codec for the OpenGD77 wire format
#[derive(Debug, Clone, Default)]
pub struct OpenGd77Protocol;

impl OpenGd77Protocol {
    pub fn new() -> Self {
        Self
    }

    fn decode_command(&self, buffer: &mut Vec<u8>) -> Result<Option<OpenGd77Request>> {
        if buffer.len() < 2 {
            return Ok(None);
        }
        let (command, consumed) = match buffer[1] {
            0 => (OpenGd77Command::ShowCpsScreen, 2),
            1 => (OpenGd77Command::ClearScreen, 2),
            2 => {
                if buffer.len() < 7 {
                    return Ok(None);
                }
                // The text runs up to the end of the received chunk
                let command = OpenGd77Command::Display {
                    x: buffer[2],
                    y: buffer[3],
                    font: buffer[4],
                    alignment: buffer[5],
                    inverted: buffer[6] != 0,
                    text: buffer[7..].to_vec(),
                };
                (command, buffer.len())
            }
            3 => (OpenGd77Command::RenderCps, 2),
            5 => (OpenGd77Command::CloseCpsScreen, 2),
            6 => {
                if buffer.len() < 3 {
                    return Ok(None);
                }
                (OpenGd77Command::Control(ControlOption::from(buffer[2])), 3)
            }
            0x0a | 0xfe => (OpenGd77Command::Ping, 2),
            other => {
                tracing::error!("Unknown command {:#04x}", other);
                buffer.clear();
                return Err(ProtocolError::UnknownCommand(other));
            }
        };
        buffer.drain(..consumed);
        Ok(Some(OpenGd77Request::Command(command)))
    }

    fn decode_read(&self, buffer: &mut Vec<u8>) -> Result<Option<OpenGd77Request>> {
        if buffer.len() < READ_LEN {
            return Ok(None);
        }
        let section = ReadSection::try_from(buffer[1]);
        let address = read_u32_be(&buffer[2..6])?;
        let length = read_u16_be(&buffer[6..8])?;
        buffer.drain(..READ_LEN);
        Ok(Some(OpenGd77Request::Read {
            section: section?,
            address,
            length,
        }))
    }

    fn decode_write(&self, buffer: &mut Vec<u8>) -> Result<Option<OpenGd77Request>> {
        if buffer.len() < 2 {
            return Ok(None);
        }
        let kind = buffer[0];
        let section = match WriteSection::try_from(buffer[1]) {
            Ok(section) => section,
            Err(err) => {
                tracing::error!("Unknown write section {}", buffer[1]);
                buffer.clear();
                return Err(err);
            }
        };

        match section {
            WriteSection::SetFlashSector => {
                if buffer.len() < 5 {
                    return Ok(None);
                }
                let sector = read_u24_be(&buffer[2..5])?;
                buffer.drain(..5);
                Ok(Some(OpenGd77Request::SetSector { kind, sector }))
            }
            WriteSection::WriteFlashSector => {
                buffer.drain(..2);
                Ok(Some(OpenGd77Request::WriteSector { kind }))
            }
            WriteSection::WriteSectorBuffer
            | WriteSection::WriteEeprom
            | WriteSection::WriteWavBuffer => {
                if buffer.len() < DATA_HEADER_LEN {
                    return Ok(None);
                }
                let address = read_u32_be(&buffer[2..6])?;
                let length = read_u16_be(&buffer[6..8])? as usize;
                if buffer.len() < DATA_HEADER_LEN + length {
                    return Ok(None);
                }
                let data = buffer[DATA_HEADER_LEN..DATA_HEADER_LEN + length].to_vec();
                buffer.drain(..DATA_HEADER_LEN + length);
                Ok(Some(OpenGd77Request::WriteData {
                    kind,
                    section,
                    address,
                    data,
                }))
            }
        }
    }
}

impl WireProtocol for OpenGd77Protocol {
    type Request = OpenGd77Request;
    type Response = OpenGd77Response;

    fn decode(&self, buffer: &mut Vec<u8>) -> Result<Option<OpenGd77Request>> {
        match buffer.first() {
            None => Ok(None),
            Some(&COMMAND) => self.decode_command(buffer),
            Some(&READ) => self.decode_read(buffer),
            Some(&WRITE) | Some(&WRITE_ALT) => self.decode_write(buffer),
            Some(&other) => {
                tracing::error!("Unknown command type {:#04x}", other);
                buffer.clear();
                Err(ProtocolError::UnexpectedRequest(other))
            }
        }
    }

    fn encode(&self, response: &OpenGd77Response, out: &mut Vec<u8>) {
        match response {
            OpenGd77Response::Command { success: true } => out.push(b'-'),
            OpenGd77Response::Command { success: false } => out.push(b'E'),
            OpenGd77Response::Read { data } => {
                let len = data.len().min(u16::MAX as usize);
                out.push(READ);
                out.extend_from_slice(&write_u16_be(len as u16));
                out.extend_from_slice(&data[..len]);
            }
            OpenGd77Response::Write { kind, section } => {
                out.push(*kind);
                out.push(*section as u8);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        let protocol = OpenGd77Protocol::new();
        let mut buffer = vec![b'C', 0, b'C', 1, b'C', 3, b'C', 5, b'C', 0xfe, b'C', 0x0a];
        let expected = [
            OpenGd77Command::ShowCpsScreen,
            OpenGd77Command::ClearScreen,
            OpenGd77Command::RenderCps,
            OpenGd77Command::CloseCpsScreen,
            OpenGd77Command::Ping,
            OpenGd77Command::Ping,
        ];
        for command in expected {
            assert_eq!(
                protocol.decode(&mut buffer).unwrap(),
                Some(OpenGd77Request::Command(command))
            );
        }
        assert!(buffer.is_empty());
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_display_takes_whole_buffer() {
        let protocol = OpenGd77Protocol::new();
        let mut buffer = vec![b'C', 2, 0, 16, 3, 1];
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
        buffer.extend_from_slice(&[1, b'C', b'P', b'S']);
        assert_eq!(
            protocol.decode(&mut buffer).unwrap(),
            Some(OpenGd77Request::Command(OpenGd77Command::Display {
                x: 0,
                y: 16,
                font: 3,
                alignment: 1,
                inverted: true,
                text: b"CPS".to_vec(),
            }))
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_control() {
        let protocol = OpenGd77Protocol::new();
        let mut buffer = vec![b'C', 6];
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
        buffer.push(1);
        let request = protocol.decode(&mut buffer).unwrap();
        assert_eq!(
            request,
            Some(OpenGd77Request::Command(OpenGd77Command::Control(
                ControlOption::Reboot
            )))
        );
        assert!(ControlOption::Reboot.ends_session());
        assert!(ControlOption::SaveSettingsNotVfos.ends_session());
        assert!(!ControlOption::FlashGreenLed.ends_session());
        assert_eq!(ControlOption::from(9), ControlOption::Other(9));
    }

    #[test]
    fn test_unknown_command_clears_buffer() {
        let protocol = OpenGd77Protocol::new();
        let mut buffer = vec![b'C', 0x42, 0x00, 0x01];
        assert_eq!(
            protocol.decode(&mut buffer),
            Err(ProtocolError::UnknownCommand(0x42))
        );
        assert!(buffer.is_empty());

        let mut buffer = vec![b'Z', 0x00];
        assert_eq!(
            protocol.decode(&mut buffer),
            Err(ProtocolError::UnexpectedRequest(b'Z'))
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_read_request() {
        let protocol = OpenGd77Protocol::new();
        let mut buffer = vec![b'R', 2, 0x00, 0x00, 0x10, 0x80, 0x00];
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
        buffer.push(0x20);
        assert_eq!(
            protocol.decode(&mut buffer).unwrap(),
            Some(OpenGd77Request::Read {
                section: ReadSection::Eeprom,
                address: 0x1080,
                length: 0x20
            })
        );
        assert!(buffer.is_empty());

        let mut buffer = vec![b'R', 4, 0, 0, 0, 0, 0, 8, b'C', 0xfe];
        assert_eq!(
            protocol.decode(&mut buffer),
            Err(ProtocolError::UnknownSection(4))
        );
        assert_eq!(buffer, [b'C', 0xfe]);
    }

    #[test]
    fn test_flash_write_sequence() {
        let protocol = OpenGd77Protocol::new();
        let mut buffer = vec![b'X', 1, 0x00, 0x00, 0x12];
        buffer.extend_from_slice(&[b'X', 2, 0x00, 0x01, 0x20, 0x00, 0x00, 0x03, 0xaa, 0xbb]);
        assert_eq!(
            protocol.decode(&mut buffer).unwrap(),
            Some(OpenGd77Request::SetSector {
                kind: b'X',
                sector: 0x12
            })
        );
        // Payload incomplete
        assert_eq!(protocol.decode(&mut buffer).unwrap(), None);
        assert_eq!(buffer.len(), 10);

        buffer.extend_from_slice(&[0xcc, b'X', 3]);
        let request = protocol.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(
            request,
            OpenGd77Request::WriteData {
                kind: b'X',
                section: WriteSection::WriteSectorBuffer,
                address: 0x0001_2000,
                data: vec![0xaa, 0xbb, 0xcc],
            }
        );
        assert_eq!(
            request.write_section(),
            Some((b'X', WriteSection::WriteSectorBuffer))
        );
        assert_eq!(
            protocol.decode(&mut buffer).unwrap(),
            Some(OpenGd77Request::WriteSector { kind: b'X' })
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_unknown_write_section() {
        let protocol = OpenGd77Protocol::new();
        let mut buffer = vec![b'W', 9, 1, 2, 3];
        assert_eq!(
            protocol.decode(&mut buffer),
            Err(ProtocolError::UnknownSection(9))
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_encode() {
        let protocol = OpenGd77Protocol::new();
        let mut out = Vec::new();
        protocol.encode(&OpenGd77Response::Command { success: true }, &mut out);
        protocol.encode(&OpenGd77Response::Command { success: false }, &mut out);
        assert_eq!(out, b"-E");

        out.clear();
        protocol.encode(
            &OpenGd77Response::Read {
                data: vec![1, 2, 3],
            },
            &mut out,
        );
        assert_eq!(out, [b'R', 0x00, 0x03, 1, 2, 3]);

        out.clear();
        protocol.encode(
            &OpenGd77Response::Write {
                kind: b'W',
                section: WriteSection::WriteEeprom,
            },
            &mut out,
        );
        assert_eq!(out, [b'W', 4]);
    }
}
