// Bit-granular positions and widths inside a codeplug image
// Bits are numbered MSB-first inside a byte: bit 7 is the first bit of a byte.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OffsetError {
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("Invalid size '{0}'")]
    InvalidSize(String),

    #[error("Address {address} moved by {offset} is out of range")]
    OutOfRange { address: Address, offset: Offset },
}

pub type Result<T> = std::result::Result<T, OffsetError>;

lazy_static! {
    // "<hex>[h]" or "[<hex>][h]:<octal bits>"
    static ref BYTE_BIT_RE: Regex =
        Regex::new(r"^\s*(?:([0-9A-Fa-f]*)h?:([0-7]+)|([0-9A-Fa-f]+)h?)\s*$")
            .expect("byte:bit pattern compiles");
}

/// Splits a `byte:bit` string into its byte count and bit count.
/// The bit part is octal, so `:40` is 32 bits.
fn parse_byte_bit(text: &str) -> Option<(u64, u64, bool)> {
    let caps = BYTE_BIT_RE.captures(text)?;
    if let Some(bytes) = caps.get(3) {
        let bytes = u64::from_str_radix(bytes.as_str(), 16).ok()?;
        return Some((bytes, 0, false));
    }
    let bytes = match caps.get(1).map(|m| m.as_str()).unwrap_or("") {
        "" => 0,
        hex => u64::from_str_radix(hex, 16).ok()?,
    };
    let bits = u64::from_str_radix(caps.get(2)?.as_str(), 8).ok()?;
    Some((bytes, bits, true))
}

fn format_byte_bit(f: &mut fmt::Formatter<'_>, bytes: u64, bits: u64) -> fmt::Result {
    if bits == 0 {
        write!(f, "{:x}h", bytes)
    } else {
        write!(f, "{:x}h:{:o}", bytes, bits)
    }
}

/// An exact bit position within a memory image.
///
/// Internally this is the number of bits from the start of the image. The
/// conventional `(byte, bit)` view labels the first bit of each byte as bit 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address {
    pub const fn zero() -> Self {
        Address(0)
    }

    /// Address of `bit` inside `byte`. Bit 7 is the start of the byte,
    /// bit indices above 7 carry into the following bytes.
    pub const fn from_byte(byte: u64, bit: u8) -> Self {
        let bit = bit as u64;
        Address(8 * (byte + bit / 8) + (7 - bit % 8))
    }

    /// Like [`from_byte`](Self::from_byte), `None` beyond the address space
    pub fn checked_from_byte(byte: u64, bit: u64) -> Option<Self> {
        let bits = byte.checked_add(bit / 8)?.checked_mul(8)?;
        bits.checked_add(7 - bit % 8).map(Address)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Address(bits)
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    pub const fn byte(&self) -> u64 {
        self.0 / 8
    }

    pub const fn bit(&self) -> u8 {
        7 - (self.0 % 8) as u8
    }

    pub const fn is_byte_aligned(&self) -> bool {
        self.0 % 8 == 0
    }

    /// Moves the address by a signed offset, failing on underflow.
    pub fn offset_by(self, offset: Offset) -> Result<Address> {
        let bits = self.0 as i128 + offset.bits() as i128;
        if bits < 0 || bits > u64::MAX as i128 {
            return Err(OffsetError::OutOfRange {
                address: self,
                offset,
            });
        }
        Ok(Address(bits as u64))
    }

    pub fn checked_add(self, size: Size) -> Option<Address> {
        self.0.checked_add(size.bits()).map(Address)
    }

    pub fn saturating_add(self, size: Size) -> Address {
        Address(self.0.saturating_add(size.bits()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_byte_aligned() {
            write!(f, "{:x}h", self.byte())
        } else {
            write!(f, "{:x}h:{:o}", self.byte(), self.bit())
        }
    }
}

impl FromStr for Address {
    type Err = OffsetError;

    fn from_str(s: &str) -> Result<Self> {
        match parse_byte_bit(s) {
            Some((byte, _, false)) => Address::checked_from_byte(byte, 7),
            Some((byte, bit, true)) if bit <= u8::MAX as u64 => Address::checked_from_byte(byte, bit),
            _ => None,
        }
        .ok_or_else(|| OffsetError::InvalidAddress(s.to_string()))
    }
}

impl Add<Size> for Address {
    type Output = Address;

    fn add(self, rhs: Size) -> Address {
        Address(self.0 + rhs.bits())
    }
}

impl AddAssign<Size> for Address {
    fn add_assign(&mut self, rhs: Size) {
        self.0 += rhs.bits();
    }
}

impl Sub for Address {
    type Output = Offset;

    fn sub(self, rhs: Address) -> Offset {
        Offset::from_bits(self.0.wrapping_sub(rhs.0) as i64)
    }
}

/// A signed distance between two addresses, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Offset(i64);

impl Offset {
    pub const fn zero() -> Self {
        Offset(0)
    }

    pub const fn from_bits(bits: i64) -> Self {
        Offset(bits)
    }

    pub const fn from_byte(bytes: i64, bits: i64) -> Self {
        Offset(8 * bytes + bits)
    }

    pub const fn bits(&self) -> i64 {
        self.0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Magnitude of the offset as a size.
    pub const fn magnitude(&self) -> Size {
        Size(self.0.unsigned_abs())
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-")?;
        }
        let magnitude = self.0.unsigned_abs();
        format_byte_bit(f, magnitude / 8, magnitude % 8)
    }
}

impl From<Size> for Offset {
    fn from(size: Size) -> Self {
        Offset(size.bits() as i64)
    }
}

impl Add for Offset {
    type Output = Offset;

    fn add(self, rhs: Offset) -> Offset {
        Offset(self.0 + rhs.0)
    }
}

/// An unsigned width in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Size(u64);

impl Size {
    pub const fn zero() -> Self {
        Size(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Size(bits)
    }

    pub const fn from_bytes(bytes: u64) -> Self {
        Size(8 * bytes)
    }

    /// `bytes` whole bytes plus `bits` additional bits.
    pub const fn from_byte(bytes: u64, bits: u64) -> Self {
        Size(8 * bytes + bits)
    }

    pub fn checked_from_byte(bytes: u64, bits: u64) -> Option<Self> {
        bytes.checked_mul(8)?.checked_add(bits).map(Size)
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Number of whole bytes, discarding any trailing bits.
    pub const fn byte(&self) -> u64 {
        self.0 / 8
    }

    /// Trailing bits beyond the last whole byte.
    pub const fn bit(&self) -> u64 {
        self.0 % 8
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_byte_aligned(&self) -> bool {
        self.0 % 8 == 0
    }

    /// Byte count, only when the size is a whole number of bytes.
    pub const fn whole_bytes(&self) -> Option<u64> {
        if self.is_byte_aligned() {
            Some(self.0 / 8)
        } else {
            None
        }
    }

    /// Byte count rounded up to cover every bit.
    pub const fn bytes_ceil(&self) -> u64 {
        self.0.div_ceil(8)
    }

    pub fn checked_add(self, rhs: Size) -> Option<Size> {
        self.0.checked_add(rhs.0).map(Size)
    }

    pub fn checked_mul(self, count: u64) -> Option<Size> {
        self.0.checked_mul(count).map(Size)
    }

    pub fn checked_sub(self, rhs: Size) -> Option<Size> {
        self.0.checked_sub(rhs.0).map(Size)
    }

    pub fn saturating_sub(self, rhs: Size) -> Size {
        Size(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_byte_bit(f, self.byte(), self.bit())
    }
}

impl FromStr for Size {
    type Err = OffsetError;

    fn from_str(s: &str) -> Result<Self> {
        parse_byte_bit(s)
            .and_then(|(bytes, bits, _)| Size::checked_from_byte(bytes, bits))
            .ok_or_else(|| OffsetError::InvalidSize(s.to_string()))
    }
}

impl Add for Size {
    type Output = Size;

    fn add(self, rhs: Size) -> Size {
        Size(self.0 + rhs.0)
    }
}

impl AddAssign for Size {
    fn add_assign(&mut self, rhs: Size) {
        self.0 += rhs.0;
    }
}

impl Mul<u64> for Size {
    type Output = Size;

    fn mul(self, rhs: u64) -> Size {
        Size(self.0 * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_byte() {
        let addr = Address::from_byte(0x100, 7);
        assert_eq!(addr.byte(), 0x100);
        assert_eq!(addr.bit(), 7);
        assert!(addr.is_byte_aligned());
        assert_eq!(addr.bits(), 0x800);

        let addr = Address::from_byte(1, 0);
        assert_eq!(addr.bits(), 15);
        assert_eq!(addr.bit(), 0);

        // bit indices above 7 carry into the next byte
        assert_eq!(Address::from_byte(1, 9), Address::from_byte(2, 1));
    }

    #[test]
    fn test_address_arithmetic() {
        let addr = Address::from_byte(0x100, 7);
        let moved = addr.offset_by(Offset::from_byte(1, 3)).unwrap();
        assert_eq!(moved, Address::from_byte(0x101, 4));
        assert_eq!(moved - addr, Offset::from_bits(11));
        assert_eq!(addr - moved, Offset::from_bits(-11));

        assert_eq!(addr + Size::from_bytes(2), Address::from_byte(0x102, 7));
        assert!(Address::zero().offset_by(Offset::from_bits(-1)).is_err());
    }

    #[test]
    fn test_address_display_and_parse() {
        assert_eq!(Address::from_byte(0x1a, 7).to_string(), "1ah");
        assert_eq!(Address::from_byte(0x1a, 3).to_string(), "1ah:3");

        assert_eq!("8".parse::<Address>().unwrap(), Address::from_byte(8, 7));
        assert_eq!("1ah".parse::<Address>().unwrap(), Address::from_byte(0x1a, 7));
        assert_eq!("4:3".parse::<Address>().unwrap(), Address::from_byte(4, 3));
        assert_eq!(":5".parse::<Address>().unwrap(), Address::from_byte(0, 5));

        for addr in [Address::from_byte(0x3f, 7), Address::from_byte(0x200, 1)] {
            assert_eq!(addr.to_string().parse::<Address>().unwrap(), addr);
        }

        assert!("xyz".parse::<Address>().is_err());
        assert!("".parse::<Address>().is_err());
        assert!("1:9".parse::<Address>().is_err());
        assert!("ffffffffffffffff".parse::<Address>().is_err());
        assert!("1fffffffffffffff:0".parse::<Address>().is_ok());
    }

    #[test]
    fn test_size_parse() {
        assert_eq!("1:7".parse::<Size>().unwrap().bits(), 15);
        assert_eq!(":40".parse::<Size>().unwrap().bits(), 32);
        assert_eq!(":20".parse::<Size>().unwrap().bits(), 16);
        assert_eq!(":10".parse::<Size>().unwrap().bits(), 8);
        assert_eq!(":1".parse::<Size>().unwrap().bits(), 1);
        assert_eq!("4".parse::<Size>().unwrap().bits(), 32);
        assert_eq!("10h".parse::<Size>().unwrap(), Size::from_bytes(16));
        assert!("g".parse::<Size>().is_err());
        assert!("2000000000000000".parse::<Size>().is_err());
    }

    #[test]
    fn test_size_display() {
        assert_eq!(Size::from_bytes(4).to_string(), "4h");
        assert_eq!(Size::from_bits(15).to_string(), "1h:7");
        assert_eq!(Size::from_bits(3).to_string(), "0h:3");

        for size in [Size::from_bits(15), Size::from_bytes(0x20), Size::from_bits(1)] {
            assert_eq!(size.to_string().parse::<Size>().unwrap(), size);
        }
    }

    #[test]
    fn test_size_bytes() {
        assert_eq!(Size::from_bytes(3).whole_bytes(), Some(3));
        assert_eq!(Size::from_bits(15).whole_bytes(), None);
        assert_eq!(Size::from_bits(15).bytes_ceil(), 2);
        assert_eq!(Size::from_bits(15).byte(), 1);
        assert_eq!(Size::from_bits(15).bit(), 7);
        assert_eq!(Size::from_bytes(2) * 3, Size::from_bytes(6));
        assert_eq!(Size::from_bits(3).checked_sub(Size::from_bits(4)), None);
        assert_eq!(Size::from_bits(u64::MAX).checked_mul(2), None);
        assert_eq!(Size::from_bits(u64::MAX).checked_add(Size::from_bits(1)), None);
        assert_eq!(Address::from_bits(u64::MAX).checked_add(Size::from_bits(1)), None);
        assert_eq!(Size::from_bits(3).saturating_sub(Size::from_bits(4)), Size::zero());
    }

    #[test]
    fn test_offset_display() {
        assert_eq!(Offset::from_bits(-11).to_string(), "-1h:3");
        assert_eq!(Offset::from_byte(2, 0).to_string(), "2h");
        assert_eq!(Offset::from_bits(-11).magnitude(), Size::from_bits(11));
    }
}
