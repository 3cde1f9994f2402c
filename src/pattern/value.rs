// Decoding field values out of a memory image

use super::node::{FieldKind, IntegerFormat, PatternKind, StringFormat};
use super::tree::{PatternId, PatternTree};
use crate::bitwise::{
    bcd, extract_bits, read_u16_be, read_u24_be, read_u32_be, read_uint, sign_extend,
    Address, BcdError, ElementError, Endianness,
};
use crate::memmap::{ModelRom, ModelRomError};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{0} is not a field")]
    NotAField(String),

    #[error("{0} has no resolved address")]
    NoAddress(String),

    #[error("Field at {address} lies outside the image")]
    OutsideImage { address: Address },

    #[error("Field at {address} lies beyond the 32 bit ROM address range")]
    BeyondRom { address: Address },

    #[error("{width} bit field at {address} must be byte aligned")]
    Unaligned { address: Address, width: u64 },

    #[error("Cannot decode {width} bit {kind} fields")]
    UnsupportedWidth { kind: &'static str, width: u64 },

    #[error(transparent)]
    Element(#[from] ElementError),

    #[error(transparent)]
    Bcd(#[from] BcdError),

    #[error(transparent)]
    Rom(#[from] ModelRomError),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Something suspicious about a decoded value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, "warning: {}", self.message),
            Severity::Error => write!(f, "error: {}", self.message),
        }
    }
}

impl Issue {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Signed(i64),
    Unsigned(u64),
    Bcd(u64),
    Enum { value: u64, name: Option<String> },
    String(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Signed(v) => write!(f, "{}", v),
            FieldValue::Unsigned(v) | FieldValue::Bcd(v) => write!(f, "{}", v),
            FieldValue::Enum { value, name: Some(name) } => write!(f, "{} ({})", name, value),
            FieldValue::Enum { value, name: None } => write!(f, "{}", value),
            FieldValue::String(s) => write!(f, "{:?}", s),
            FieldValue::Bytes(bytes) => {
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// A decoded value together with any issues found while decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub value: FieldValue,
    pub issues: Vec<Issue>,
}

impl Decoded {
    fn clean(value: FieldValue) -> Self {
        Self {
            value,
            issues: Vec::new(),
        }
    }
}

/// Bytes covering the field, or an error if the image is too short
fn field_bytes(image: &[u8], base: u32, address: Address, len: u64) -> Result<&[u8]> {
    let start = address
        .byte()
        .checked_sub(base as u64)
        .ok_or(DecodeError::OutsideImage { address })? as usize;
    let end = usize::try_from(len)
        .ok()
        .and_then(|len| start.checked_add(len))
        .ok_or(DecodeError::OutsideImage { address })?;
    image
        .get(start..end)
        .ok_or(DecodeError::OutsideImage { address })
}

/// Small values live inside one byte, wide ones are whole bytes
fn read_raw(
    image: &[u8],
    base: u32,
    address: Address,
    width: u64,
    endian: Endianness,
    kind: &'static str,
) -> Result<u64> {
    if width <= 8 {
        let byte = field_bytes(image, base, address, 1)?[0];
        return Ok(extract_bits(byte, address.bit(), width as u32)? as u64);
    }
    if !address.is_byte_aligned() || width % 8 != 0 {
        return Err(DecodeError::Unaligned { address, width });
    }
    let len = (width / 8) as usize;
    let bytes = field_bytes(image, base, address, len as u64)?;
    Ok(match (len, endian) {
        (2, Endianness::Big) => read_u16_be(bytes)? as u64,
        (3, Endianness::Big) => read_u24_be(bytes)? as u64,
        (4, Endianness::Big) => read_u32_be(bytes)? as u64,
        (1..=8, _) => read_uint(bytes, len, endian)?,
        _ => return Err(DecodeError::UnsupportedWidth { kind, width }),
    })
}

/// Decode the field `id` from `image`, where `image[0]` is the byte at address `base`
pub fn decode_field(tree: &PatternTree, id: PatternId, image: &[u8], base: u32) -> Result<Decoded> {
    let field = match tree.get(id).map(|node| node.kind()) {
        Some(PatternKind::Field(field)) => field,
        _ => return Err(DecodeError::NotAField(tree.describe(id))),
    };
    let address = tree
        .absolute_address(id)
        .ok_or_else(|| DecodeError::NoAddress(tree.describe(id)))?;

    match field {
        FieldKind::Integer(int) => {
            let width = int.width.bits();
            let raw = read_raw(image, base, address, width, int.endian, "integer")?;
            let (value, number) = match int.format {
                IntegerFormat::Unsigned => (FieldValue::Unsigned(raw), raw as i128),
                IntegerFormat::Signed => {
                    let signed = sign_extend(raw, width as u32);
                    (FieldValue::Signed(signed), signed as i128)
                }
            };
            let mut decoded = Decoded::clean(value);
            if let Some(min) = int.min.filter(|min| number < *min as i128) {
                decoded
                    .issues
                    .push(Issue::warning(format!("Value {} is below minimum {}", number, min)));
            }
            if let Some(max) = int.max.filter(|max| number > *max as i128) {
                decoded
                    .issues
                    .push(Issue::warning(format!("Value {} exceeds maximum {}", number, max)));
            }
            Ok(decoded)
        }
        FieldKind::Bcd(field) => {
            let width = field.width.bits();
            let value = if width == 4 {
                let nibble = read_raw(image, base, address, width, field.endian, "BCD")?;
                bcd::nibble_to_digit(nibble as u8)? as u64
            } else {
                if !address.is_byte_aligned() || width % 8 != 0 {
                    return Err(DecodeError::Unaligned { address, width });
                }
                let bytes = field_bytes(image, base, address, width / 8)?;
                bcd::bcd_to_int(bytes, field.endian)?
            };
            Ok(Decoded::clean(FieldValue::Bcd(value)))
        }
        FieldKind::Enum(field) => {
            let width = field.width.bits();
            if width > 8 {
                return Err(DecodeError::UnsupportedWidth { kind: "enum", width });
            }
            let value = read_raw(image, base, address, width, Endianness::Little, "enum")?;
            let name = field.item(value).map(|item| item.meta.name.clone());
            let mut decoded = Decoded::clean(FieldValue::Enum {
                value,
                name: name.clone(),
            });
            if name.is_none() {
                decoded
                    .issues
                    .push(Issue::warning(format!("Unknown enum value {}", value)));
            }
            Ok(decoded)
        }
        FieldKind::String(field) => {
            if !address.is_byte_aligned() {
                return Err(DecodeError::Unaligned {
                    address,
                    width: field.width().bits(),
                });
            }
            let bytes = field_bytes(image, base, address, field.width().byte())?;
            let mut issues = Vec::new();
            let text = match field.format {
                StringFormat::Ascii => {
                    let end = bytes
                        .iter()
                        .position(|b| *b as u16 == field.pad)
                        .unwrap_or(bytes.len());
                    let content = &bytes[..end];
                    if content.iter().any(|b| !(0x20..0x7f).contains(b)) {
                        issues.push(Issue::warning("String contains non-printable characters"));
                    }
                    String::from_utf8_lossy(content).into_owned()
                }
                StringFormat::Unicode => {
                    let units: Vec<u16> = bytes
                        .chunks_exact(2)
                        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                        .take_while(|unit| *unit != field.pad)
                        .collect();
                    String::from_utf16_lossy(&units)
                }
            };
            Ok(Decoded {
                value: FieldValue::String(text),
                issues,
            })
        }
        FieldKind::Unknown { width } | FieldKind::Unused { width, .. } => {
            let bytes = field_bytes(image, base, address, width.bytes_ceil())?.to_vec();
            let mut decoded = Decoded::clean(FieldValue::Bytes(bytes));
            if let FieldKind::Unused {
                content: Some(expected),
                ..
            } = field
            {
                if let FieldValue::Bytes(actual) = &decoded.value {
                    if actual != expected {
                        decoded
                            .issues
                            .push(Issue::warning("Unused bytes differ from the expected content"));
                    }
                }
            }
            Ok(decoded)
        }
    }
}

/// Decode a field straight from a ROM snapshot
pub fn decode_from_rom(tree: &PatternTree, id: PatternId, rom: &ModelRom) -> Result<Decoded> {
    let address = tree
        .absolute_address(id)
        .ok_or_else(|| DecodeError::NoAddress(tree.describe(id)))?;
    let width = tree.size(id).unwrap_or_default();
    let beyond_rom = DecodeError::BeyondRom { address };
    let Ok(start) = u32::try_from(address.byte()) else {
        return Err(beyond_rom);
    };
    let Some(end) = address.checked_add(width) else {
        return Err(beyond_rom);
    };
    let Ok(len) = usize::try_from(end.bits().div_ceil(8) - address.byte()) else {
        return Err(beyond_rom);
    };
    let bytes = rom.read(start, len)?;
    decode_field(tree, id, bytes, start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitwise::Size;
    use crate::pattern::meta::Meta;
    use crate::pattern::node::{
        BcdField, EnumField, EnumItem, IntegerField, StringField,
    };

    fn place(tree: &mut PatternTree, field: FieldKind, byte: u64, bit: u8) -> PatternId {
        let root = tree.root().unwrap();
        let id = tree.create_with(
            PatternKind::Field(field),
            Meta::default(),
            Some(Address::from_byte(byte, bit)),
        );
        tree.append_child(root, id).unwrap();
        id
    }

    fn int(bits: u64, format: IntegerFormat, endian: Endianness) -> FieldKind {
        FieldKind::Integer(IntegerField::new(Size::from_bits(bits), format, endian))
    }

    #[test]
    fn test_decode_integers() {
        let mut tree = PatternTree::with_codeplug(Meta::default());
        let image = [0xb2, 0x34, 0x12, 0xfe, 0xff, 0x12, 0x34, 0x56, 0x78];

        let nibble = place(&mut tree, int(4, IntegerFormat::Unsigned, Endianness::Little), 0, 7);
        let low = place(&mut tree, int(4, IntegerFormat::Signed, Endianness::Little), 0, 3);
        let le16 = place(&mut tree, int(16, IntegerFormat::Unsigned, Endianness::Little), 1, 7);
        let neg = place(&mut tree, int(16, IntegerFormat::Signed, Endianness::Little), 3, 7);
        let be32 = place(&mut tree, int(32, IntegerFormat::Unsigned, Endianness::Big), 5, 7);

        assert_eq!(decode_field(&tree, nibble, &image, 0).unwrap().value, FieldValue::Unsigned(0xb));
        assert_eq!(decode_field(&tree, low, &image, 0).unwrap().value, FieldValue::Signed(2));
        assert_eq!(decode_field(&tree, le16, &image, 0).unwrap().value, FieldValue::Unsigned(0x1234));
        assert_eq!(decode_field(&tree, neg, &image, 0).unwrap().value, FieldValue::Signed(-2));
        assert_eq!(
            decode_field(&tree, be32, &image, 0).unwrap().value,
            FieldValue::Unsigned(0x12345678)
        );
        assert!(matches!(
            decode_field(&tree, be32, &image[..6], 0),
            Err(DecodeError::OutsideImage { .. })
        ));
    }

    #[test]
    fn test_bounds_warning() {
        let mut tree = PatternTree::with_codeplug(Meta::default());
        let mut field = IntegerField::new(Size::from_bits(8), IntegerFormat::Unsigned, Endianness::Little);
        field.max = Some(100);
        let id = place(&mut tree, FieldKind::Integer(field), 0, 7);
        let decoded = decode_field(&tree, id, &[200], 0).unwrap();
        assert_eq!(decoded.value, FieldValue::Unsigned(200));
        assert_eq!(decoded.issues.len(), 1);
        assert_eq!(decoded.issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_unaligned_wide_integer() {
        let mut tree = PatternTree::with_codeplug(Meta::default());
        let id = place(&mut tree, int(16, IntegerFormat::Unsigned, Endianness::Little), 0, 3);
        assert!(matches!(
            decode_field(&tree, id, &[0; 4], 0),
            Err(DecodeError::Unaligned { .. })
        ));
    }

    #[test]
    fn test_decode_bcd_enum_string() {
        let mut tree = PatternTree::with_codeplug(Meta::default());
        let mut image = vec![0x44, 0x60, 0x06, 0x25, 0x02];
        image.extend_from_slice(b"CALL\xff\xff");
        image.extend_from_slice(&[b'H', 0, b'i', 0, 0, 0]);

        let freq = place(
            &mut tree,
            FieldKind::Bcd(BcdField {
                width: Size::from_bits(32),
                endian: Endianness::Big,
            }),
            0,
            7,
        );
        let power = place(
            &mut tree,
            FieldKind::Enum(EnumField {
                width: Size::from_bits(2),
                items: vec![EnumItem::new(0, "Low"), EnumItem::new(2, "High")],
            }),
            4,
            1,
        );
        let call = place(
            &mut tree,
            FieldKind::String(StringField {
                chars: 6,
                format: StringFormat::Ascii,
                pad: 0xff,
            }),
            5,
            7,
        );
        let name = place(
            &mut tree,
            FieldKind::String(StringField {
                chars: 3,
                format: StringFormat::Unicode,
                pad: 0,
            }),
            11,
            7,
        );

        assert_eq!(decode_field(&tree, freq, &image, 0).unwrap().value, FieldValue::Bcd(44600625));
        assert_eq!(
            decode_field(&tree, power, &image, 0).unwrap().value,
            FieldValue::Enum {
                value: 2,
                name: Some("High".into())
            }
        );
        assert_eq!(
            decode_field(&tree, call, &image, 0).unwrap().value,
            FieldValue::String("CALL".into())
        );
        assert_eq!(
            decode_field(&tree, name, &image, 0).unwrap().value,
            FieldValue::String("Hi".into())
        );
    }

    #[test]
    fn test_decode_from_rom() {
        let mut tree = PatternTree::with_codeplug(Meta::default());
        let id = place(&mut tree, int(16, IntegerFormat::Unsigned, Endianness::Big), 0x100, 7);
        let unused = place(
            &mut tree,
            FieldKind::Unused {
                width: Size::from_bytes(2),
                content: Some(vec![0xff, 0xff]),
            },
            0x102,
            7,
        );

        let mut rom = ModelRom::new();
        rom.write(0x100, &[0x01, 0x02, 0xff, 0x00]);
        assert_eq!(decode_from_rom(&tree, id, &rom).unwrap().value, FieldValue::Unsigned(0x0102));

        let decoded = decode_from_rom(&tree, unused, &rom).unwrap();
        assert_eq!(decoded.value, FieldValue::Bytes(vec![0xff, 0x00]));
        assert_eq!(decoded.issues.len(), 1);
        assert_eq!(decoded.value.to_string(), "ff00");

        let empty = ModelRom::new();
        assert!(matches!(decode_from_rom(&tree, id, &empty), Err(DecodeError::Rom(_))));
    }

    #[test]
    fn test_decode_beyond_rom_range() {
        let mut tree = PatternTree::with_codeplug(Meta::default());
        let id = place(&mut tree, int(8, IntegerFormat::Unsigned, Endianness::Little), 0x1_0000_0100, 7);

        let mut rom = ModelRom::new();
        rom.write(0x100, &[0x42]);
        assert!(matches!(
            decode_from_rom(&tree, id, &rom),
            Err(DecodeError::BeyondRom { .. })
        ));
    }

    #[test]
    fn test_not_a_field() {
        let tree = PatternTree::with_codeplug(Meta::default());
        let root = tree.root().unwrap();
        assert!(matches!(
            decode_field(&tree, root, &[], 0),
            Err(DecodeError::NotAField(_))
        ));
    }
}
