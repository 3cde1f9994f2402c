// Pattern node kinds
// A closed set of layout descriptions; containers keep their children in the tree arena.

use crate::bitwise::{Address, Endianness, Size};
use super::meta::Meta;
use super::tree::PatternId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerFormat {
    Signed,
    Unsigned,
}

impl IntegerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegerFormat::Signed => "signed",
            IntegerFormat::Unsigned => "unsigned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerField {
    pub width: Size,
    pub format: IntegerFormat,
    pub endian: Endianness,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub default: Option<i64>,
}

impl IntegerField {
    pub fn new(width: Size, format: IntegerFormat, endian: Endianness) -> Self {
        Self {
            width,
            format,
            endian,
            min: None,
            max: None,
            default: None,
        }
    }

    /// Range of values representable in the declared width
    pub fn representable(&self) -> (i128, i128) {
        let bits = self.width.bits().min(64) as u32;
        if bits == 0 {
            return (0, 0);
        }
        match self.format {
            IntegerFormat::Unsigned => (0, (1i128 << bits) - 1),
            IntegerFormat::Signed => (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1),
        }
    }
}

/// Packed binary-coded decimal, one digit per nibble
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BcdField {
    pub width: Size,
    pub endian: Endianness,
}

impl BcdField {
    pub fn digits(&self) -> u64 {
        self.width.bits() / 4
    }

    /// Largest value the declared digits can hold
    pub fn max_value(&self) -> u128 {
        10u128.saturating_pow(self.digits().min(38) as u32) - 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumItem {
    pub value: u64,
    pub meta: Meta,
}

impl EnumItem {
    pub fn new(value: u64, name: impl Into<String>) -> Self {
        Self {
            value,
            meta: Meta::named(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumField {
    pub width: Size,
    pub items: Vec<EnumItem>,
}

impl EnumField {
    pub fn item(&self, value: u64) -> Option<&EnumItem> {
        self.items.iter().find(|item| item.value == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Ascii,
    Unicode,
}

impl StringFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StringFormat::Ascii => "ascii",
            StringFormat::Unicode => "unicode",
        }
    }

    pub fn bytes_per_char(&self) -> u64 {
        match self {
            StringFormat::Ascii => 1,
            StringFormat::Unicode => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringField {
    pub chars: u64,
    pub format: StringFormat,
    pub pad: u16,
}

impl StringField {
    pub fn width(&self) -> Size {
        Size::from_bits(self.chars.saturating_mul(8 * self.format.bytes_per_char()))
    }
}

/// Leaf patterns, always of fixed size
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Integer(IntegerField),
    Bcd(BcdField),
    Enum(EnumField),
    String(StringField),
    /// Not yet reverse engineered
    Unknown { width: Size },
    /// Known padding, optionally with the expected content
    Unused { width: Size, content: Option<Vec<u8>> },
}

impl FieldKind {
    pub fn width(&self) -> Size {
        match self {
            FieldKind::Integer(field) => field.width,
            FieldKind::Bcd(field) => field.width,
            FieldKind::Enum(field) => field.width,
            FieldKind::String(field) => field.width(),
            FieldKind::Unknown { width } => *width,
            FieldKind::Unused { width, .. } => *width,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::Integer(_) => "int",
            FieldKind::Bcd(_) => "bcd",
            FieldKind::Enum(_) => "enum",
            FieldKind::String(_) => "string",
            FieldKind::Unknown { .. } => "unknown",
            FieldKind::Unused { .. } => "unused",
        }
    }
}

/// Variable repeat count within `[min, max]`.
/// Without a step the repetitions are packed back to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepeatSpec {
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub step: Option<Size>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRepeatSpec {
    pub count: u64,
    pub step: Option<Size>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternKind {
    Codeplug,
    Element,
    Repeat(RepeatSpec),
    FixedRepeat(FixedRepeatSpec),
    Field(FieldKind),
}

impl PatternKind {
    /// Whether the size of this kind is known without any document content
    pub fn is_fixed(&self) -> bool {
        matches!(
            self,
            PatternKind::Element | PatternKind::FixedRepeat(_) | PatternKind::Field(_)
        )
    }

    pub fn is_repeat(&self) -> bool {
        matches!(self, PatternKind::Repeat(_) | PatternKind::FixedRepeat(_))
    }

    pub fn is_field(&self) -> bool {
        matches!(self, PatternKind::Field(_))
    }

    pub fn can_have_children(&self) -> bool {
        !self.is_field()
    }

    pub fn tag(&self) -> &'static str {
        match self {
            PatternKind::Codeplug => "codeplug",
            PatternKind::Element => "element",
            PatternKind::Repeat(_) | PatternKind::FixedRepeat(_) => "repeat",
            PatternKind::Field(field) => field.tag(),
        }
    }

    pub fn as_field(&self) -> Option<&FieldKind> {
        match self {
            PatternKind::Field(field) => Some(field),
            _ => None,
        }
    }
}

/// One slot of the pattern arena
#[derive(Debug, Clone)]
pub struct PatternNode {
    pub(crate) kind: PatternKind,
    pub(crate) meta: Meta,
    /// Absolute below a codeplug, relative to the parent otherwise
    pub(crate) address: Option<Address>,
    pub(crate) parent: Option<PatternId>,
    pub(crate) children: Vec<PatternId>,
}

impl PatternNode {
    pub(crate) fn new(kind: PatternKind) -> Self {
        Self {
            kind,
            meta: Meta::default(),
            address: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> &PatternKind {
        &self.kind
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn parent(&self) -> Option<PatternId> {
        self.parent
    }

    pub fn children(&self) -> &[PatternId] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_representable() {
        let field = IntegerField::new(Size::from_bits(8), IntegerFormat::Unsigned, Endianness::Little);
        assert_eq!(field.representable(), (0, 255));

        let field = IntegerField::new(Size::from_bits(4), IntegerFormat::Signed, Endianness::Little);
        assert_eq!(field.representable(), (-8, 7));

        let field = IntegerField::new(Size::from_bits(64), IntegerFormat::Unsigned, Endianness::Big);
        assert_eq!(field.representable().1, u64::MAX as i128);
    }

    #[test]
    fn test_bcd_digits() {
        let bcd = BcdField {
            width: Size::from_bits(32),
            endian: Endianness::Big,
        };
        assert_eq!(bcd.digits(), 8);
        assert_eq!(bcd.max_value(), 99_999_999);
    }

    #[test]
    fn test_string_width() {
        let field = StringField {
            chars: 16,
            format: StringFormat::Unicode,
            pad: 0,
        };
        assert_eq!(field.width(), Size::from_bytes(32));
        assert_eq!(FieldKind::String(field).tag(), "string");
    }

    #[test]
    fn test_kind_classes() {
        assert!(PatternKind::Element.is_fixed());
        assert!(!PatternKind::Codeplug.is_fixed());
        assert!(!PatternKind::Repeat(RepeatSpec::default()).is_fixed());
        assert!(PatternKind::Repeat(RepeatSpec::default()).is_repeat());
        assert!(!PatternKind::Field(FieldKind::Unknown { width: Size::from_bits(1) }).can_have_children());
    }
}
