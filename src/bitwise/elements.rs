// Byte-order aware integer access on byte slices
// Multi-byte values are assembled explicitly, never by reinterpreting memory.

use super::types::Endianness;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Cannot hold {0} bytes in a 64 bit value")]
    TooWide(usize),

    #[error("{width} bit value at bit {bit} crosses a byte boundary")]
    CrossesByte { bit: u8, width: u32 },
}

pub type Result<T> = std::result::Result<T, ElementError>;

fn ensure(data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(ElementError::InsufficientData {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Read a u16 in big-endian format
pub fn read_u16_be(data: &[u8]) -> Result<u16> {
    ensure(data, 2)?;
    Ok(u16::from_be_bytes([data[0], data[1]]))
}

/// Read a u24 (3 bytes) in big-endian format
pub fn read_u24_be(data: &[u8]) -> Result<u32> {
    ensure(data, 3)?;
    Ok(u32::from_be_bytes([0, data[0], data[1], data[2]]))
}

/// Read a u32 in big-endian format
pub fn read_u32_be(data: &[u8]) -> Result<u32> {
    ensure(data, 4)?;
    Ok(u32::from_be_bytes([data[0], data[1], data[2], data[3]]))
}

/// Write a u16 in big-endian format
pub fn write_u16_be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Write a u32 in big-endian format
pub fn write_u32_be(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Read an unsigned integer of `len` bytes (at most 8)
pub fn read_uint(data: &[u8], len: usize, endian: Endianness) -> Result<u64> {
    if len > 8 {
        return Err(ElementError::TooWide(len));
    }
    ensure(data, len)?;
    let bytes = &data[..len];
    let fold = |acc: u64, byte: &u8| (acc << 8) | *byte as u64;
    Ok(match endian {
        Endianness::Big => bytes.iter().fold(0, fold),
        Endianness::Little => bytes.iter().rev().fold(0, fold),
    })
}

/// Extract `width` bits from `byte`, starting at bit label `bit` (7 = MSB) downwards
pub fn extract_bits(byte: u8, bit: u8, width: u32) -> Result<u8> {
    if width == 0 || width > 8 || (bit as u32 + 1) < width {
        return Err(ElementError::CrossesByte { bit, width });
    }
    let shift = bit as u32 + 1 - width;
    let mask = if width == 8 { 0xff } else { (1u16 << width) as u8 - 1 };
    Ok((byte >> shift) & mask)
}

/// Interpret the low `width` bits of `value` as two's complement
pub fn sign_extend(value: u64, width: u32) -> i64 {
    if width == 0 || width >= 64 {
        return value as i64;
    }
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}
