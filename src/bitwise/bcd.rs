// Binary-Coded Decimal (BCD) encoding/decoding
// Two decimal digits per byte, most significant digit in the high nibble.

use super::types::Endianness;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BcdError {
    #[error("Invalid BCD digit: {0:#x}")]
    InvalidDigit(u8),

    #[error("Value too large for {digits} BCD digits: {value}")]
    ValueTooLarge { value: u64, digits: usize },
}

pub type Result<T> = std::result::Result<T, BcdError>;

/// Convert a BCD byte to its two decimal digits (tens, ones)
/// Example: 0x12 -> (1, 2), 0x95 -> (9, 5)
pub fn bcd_byte_to_digits(byte: u8) -> Result<(u8, u8)> {
    let tens = (byte & 0xF0) >> 4;
    let ones = byte & 0x0F;

    if tens > 9 || ones > 9 {
        return Err(BcdError::InvalidDigit(byte));
    }

    Ok((tens, ones))
}

/// Decode a packed BCD number. With big endian the first byte holds the
/// most significant digits, with little endian the last one does.
/// Example: [0x12, 0x34, 0x56] big endian -> 123456
pub fn bcd_to_int(data: &[u8], endian: Endianness) -> Result<u64> {
    let mut value: u64 = 0;
    let mut push = |byte: u8| -> Result<()> {
        let (tens, ones) = bcd_byte_to_digits(byte)?;
        value = value
            .checked_mul(100)
            .and_then(|v| v.checked_add((tens * 10 + ones) as u64))
            .ok_or(BcdError::ValueTooLarge {
                value,
                digits: data.len() * 2,
            })?;
        Ok(())
    };

    match endian {
        Endianness::Big => data.iter().try_for_each(|b| push(*b))?,
        Endianness::Little => data.iter().rev().try_for_each(|b| push(*b))?,
    }

    Ok(value)
}

/// A single BCD digit stored in a nibble
pub fn nibble_to_digit(nibble: u8) -> Result<u8> {
    if nibble > 9 {
        return Err(BcdError::InvalidDigit(nibble));
    }
    Ok(nibble)
}
