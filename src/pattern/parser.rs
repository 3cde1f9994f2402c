// Pattern document builder
// Consumes tag events and maintains an explicit stack of open tags. Every tag
// has a begin handler that turns attributes into a node and an end handler
// that attaches the finished node to its parent.

use super::events::{TagEvent, TagReader};
use super::meta::{simplify_whitespace, MetaFlags};
use super::node::{
    BcdField, EnumField, EnumItem, FieldKind, FixedRepeatSpec, IntegerField, IntegerFormat,
    PatternKind, RepeatSpec, StringField, StringFormat,
};
use super::tree::{PatternId, PatternTree};
use super::{PatternError, Result};
use crate::bitwise::{Address, Endianness, Size};
use std::path::Path;
use std::str::FromStr;

type Attributes = [(String, String)];
type Step<T> = std::result::Result<T, String>;

/// Meta text tags and where their content goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Name,
    ShortName,
    Brief,
    Description,
    Firmware,
}

impl TextField {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "name" => Some(TextField::Name),
            "short-name" | "shortName" => Some(TextField::ShortName),
            "brief" => Some(TextField::Brief),
            "description" => Some(TextField::Description),
            "firmware" | "version" => Some(TextField::Firmware),
            _ => None,
        }
    }

    fn assign(&self, meta: &mut super::Meta, text: String) {
        match self {
            TextField::Name => meta.name = text,
            TextField::ShortName => meta.short_name = text,
            TextField::Brief => meta.brief = text,
            TextField::Description => meta.description = text,
            TextField::Firmware => meta.firmware = text,
        }
    }
}

#[derive(Debug)]
enum Frame {
    Pattern(PatternId),
    Meta,
    Text(TextField, String),
    Flag,
    Item(EnumItem),
}

#[derive(Debug)]
struct OpenTag {
    tag: String,
    frame: Frame,
}

/// A pattern node described by a begin tag, before it is part of the tree
#[derive(Debug, Clone, PartialEq)]
struct NewPattern {
    kind: PatternKind,
    address: Option<Address>,
}

/// Builds a [`PatternTree`] from a stream of tag events.
#[derive(Debug, Default)]
pub struct PatternBuilder {
    tree: PatternTree,
    stack: Vec<OpenTag>,
    closed: bool,
}

impl PatternBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, event: &TagEvent) -> Step<()> {
        match event {
            TagEvent::Start { name, attributes } => self.start(name, attributes),
            TagEvent::Text(text) => self.text(text),
            TagEvent::End { name } => self.end(name),
        }
    }

    /// Complete the document, failing if any tag is still open
    pub fn finish(self) -> Step<PatternTree> {
        if let Some(open) = self.stack.last() {
            return Err(format!("Unexpected end of document, <{}> is not closed.", open.tag));
        }
        if self.tree.root().is_none() || !self.closed {
            return Err("Document contains no <codeplug>.".to_string());
        }
        Ok(self.tree)
    }

    fn start(&mut self, tag: &str, attributes: &Attributes) -> Step<()> {
        if tag == "codeplug" {
            return self.begin_codeplug();
        }
        if self.stack.is_empty() {
            return Err(format!("Expected <codeplug> as root element, found <{}>.", tag));
        }

        let frame = if tag == "meta" {
            self.begin_meta()?
        } else if let Some(field) = TextField::from_tag(tag) {
            self.begin_text(tag, field)?
        } else if let Some(flag) = MetaFlags::from_tag(tag) {
            self.begin_flag(tag, flag)?
        } else if tag == "item" {
            self.begin_item(attributes)?
        } else {
            let pattern = match tag {
                "element" => element_pattern(attributes)?,
                "repeat" => repeat_pattern(attributes)?,
                _ => field_pattern(tag, attributes)?
                    .ok_or_else(|| format!("Unknown tag <{}>.", tag))?,
            };
            self.begin_pattern(tag, pattern)?
        };

        self.stack.push(OpenTag {
            tag: tag.to_string(),
            frame,
        });
        Ok(())
    }

    fn text(&mut self, text: &str) -> Step<()> {
        let open = self
            .stack
            .last_mut()
            .ok_or_else(|| "Text outside of <codeplug>.".to_string())?;
        match &mut open.frame {
            Frame::Text(_, content) => {
                content.push_str(text);
                Ok(())
            }
            Frame::Pattern(id) => {
                let id = *id;
                match self.tree.kind_mut(id).map_err(|e| e.to_string())? {
                    PatternKind::Field(FieldKind::Unused { content, .. }) => {
                        content.get_or_insert_with(Vec::new).extend(parse_hex(text)?);
                        Ok(())
                    }
                    _ if text.trim().is_empty() => Ok(()),
                    _ => Err(format!("Unexpected text in <{}>.", open.tag)),
                }
            }
            _ if text.trim().is_empty() => Ok(()),
            _ => Err(format!("Unexpected text in <{}>.", open.tag)),
        }
    }

    fn end(&mut self, tag: &str) -> Step<()> {
        let open = self
            .stack
            .pop()
            .ok_or_else(|| format!("Unexpected </{}>.", tag))?;
        if open.tag != tag {
            return Err(format!("Expected </{}>, found </{}>.", open.tag, tag));
        }

        match open.frame {
            Frame::Pattern(id) => self.end_pattern(tag, id),
            Frame::Meta | Frame::Flag => Ok(()),
            Frame::Text(field, content) => self.end_text(field, content),
            Frame::Item(item) => self.end_item(item),
        }
    }

    fn top(&self) -> Option<&Frame> {
        self.stack.last().map(|open| &open.frame)
    }

    /// Innermost open pattern
    fn current_pattern(&self) -> Option<PatternId> {
        self.stack.iter().rev().find_map(|open| match open.frame {
            Frame::Pattern(id) => Some(id),
            _ => None,
        })
    }

    fn begin_codeplug(&mut self) -> Step<()> {
        if self.closed || !self.stack.is_empty() {
            return Err("<codeplug> must be the root element.".to_string());
        }
        let root = self.tree.create(PatternKind::Codeplug);
        self.tree.set_root(root).map_err(|e| e.to_string())?;
        self.stack.push(OpenTag {
            tag: "codeplug".to_string(),
            frame: Frame::Pattern(root),
        });
        Ok(())
    }

    fn begin_meta(&self) -> Step<Frame> {
        match self.top() {
            Some(Frame::Pattern(_)) => Ok(Frame::Meta),
            _ => Err("Unexpected <meta> tag.".to_string()),
        }
    }

    fn begin_text(&self, tag: &str, field: TextField) -> Step<Frame> {
        match self.top() {
            Some(Frame::Meta) | Some(Frame::Item(_)) => Ok(Frame::Text(field, String::new())),
            _ => Err(format!("Unexpected <{}> tag.", tag)),
        }
    }

    fn begin_flag(&mut self, tag: &str, flag: MetaFlags) -> Step<Frame> {
        let pattern = match self.top() {
            Some(Frame::Meta) => self.current_pattern(),
            _ => None,
        }
        .ok_or_else(|| format!("Unexpected <{}> tag.", tag))?;
        let meta = self.tree.meta_mut(pattern).map_err(|e| e.to_string())?;
        meta.flags = meta.flags.max(flag);
        Ok(Frame::Flag)
    }

    fn begin_item(&self, attributes: &Attributes) -> Step<Frame> {
        let is_enum = match self.top() {
            Some(Frame::Pattern(id)) => matches!(
                self.tree.get(*id).map(|node| node.kind()),
                Some(PatternKind::Field(FieldKind::Enum(_)))
            ),
            _ => false,
        };
        if !is_enum {
            return Err("Unexpected <item> tag.".to_string());
        }
        let value = uint_attribute(attributes, "value")?
            .ok_or_else(|| "<item> requires a 'value' attribute.".to_string())?;
        Ok(Frame::Item(EnumItem {
            value,
            meta: Default::default(),
        }))
    }

    fn begin_pattern(&mut self, tag: &str, pattern: NewPattern) -> Step<Frame> {
        match self.top() {
            Some(Frame::Pattern(parent))
                if self
                    .tree
                    .get(*parent)
                    .is_some_and(|node| node.kind().can_have_children()) => {}
            _ => return Err(format!("Unexpected <{}> tag.", tag)),
        }
        let id = self
            .tree
            .create_with(pattern.kind, Default::default(), pattern.address);
        Ok(Frame::Pattern(id))
    }

    fn end_pattern(&mut self, tag: &str, id: PatternId) -> Step<()> {
        if self.tree.root() == Some(id) {
            self.closed = true;
            return Ok(());
        }
        let parent = self
            .current_pattern()
            .ok_or_else(|| format!("<{}> has no parent.", tag))?;
        self.tree
            .append_child(parent, id)
            .map_err(|e| format!("Cannot add <{}> to {}: {}", tag, self.tree.describe(parent), e))?;
        self.tree.check_layout(id).map_err(|e| e.to_string())
    }

    fn end_text(&mut self, field: TextField, content: String) -> Step<()> {
        let text = simplify_whitespace(&content);
        match self.stack.last_mut().map(|open| &mut open.frame) {
            Some(Frame::Item(item)) => {
                field.assign(&mut item.meta, text);
                Ok(())
            }
            Some(Frame::Meta) => {
                let pattern = self
                    .current_pattern()
                    .ok_or_else(|| "<meta> outside of a pattern.".to_string())?;
                let meta = self.tree.meta_mut(pattern).map_err(|e| e.to_string())?;
                field.assign(meta, text);
                Ok(())
            }
            _ => Err("Meta text outside of <meta>.".to_string()),
        }
    }

    fn end_item(&mut self, item: EnumItem) -> Step<()> {
        let pattern = self
            .current_pattern()
            .ok_or_else(|| "<item> outside of <enum>.".to_string())?;
        match self.tree.kind_mut(pattern).map_err(|e| e.to_string())? {
            PatternKind::Field(FieldKind::Enum(field)) => {
                if field.item(item.value).is_some() {
                    return Err(format!("Duplicate enum item value {}.", item.value));
                }
                field.items.push(item);
                Ok(())
            }
            _ => Err("<item> outside of <enum>.".to_string()),
        }
    }
}

fn attribute<'a>(attributes: &'a Attributes, key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn address_attribute(attributes: &Attributes) -> Step<Option<Address>> {
    attribute(attributes, "at")
        .map(|text| Address::from_str(text).map_err(|e| e.to_string()))
        .transpose()
}

fn size_attribute(attributes: &Attributes, key: &str) -> Step<Option<Size>> {
    attribute(attributes, key)
        .map(|text| Size::from_str(text).map_err(|e| e.to_string()))
        .transpose()
}

fn split_radix(text: &str) -> (&str, u32) {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (text, 10),
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (digits, radix) = split_radix(digits);
    let value = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -value } else { value })
}

fn parse_uint(text: &str) -> Option<u64> {
    let (digits, radix) = split_radix(text.trim());
    u64::from_str_radix(digits, radix).ok()
}

fn int_attribute(attributes: &Attributes, key: &str) -> Step<Option<i64>> {
    attribute(attributes, key)
        .map(|text| parse_int(text).ok_or_else(|| format!("Invalid integer '{}' for '{}'.", text, key)))
        .transpose()
}

fn uint_attribute(attributes: &Attributes, key: &str) -> Step<Option<u64>> {
    attribute(attributes, key)
        .map(|text| parse_uint(text).ok_or_else(|| format!("Invalid count '{}' for '{}'.", text, key)))
        .transpose()
}

fn endian_attribute(attributes: &Attributes) -> Step<Option<Endianness>> {
    attribute(attributes, "endian")
        .map(Endianness::from_str)
        .transpose()
}

/// Body of `<unused>`: hex digits with arbitrary whitespace
fn parse_hex(text: &str) -> Step<Vec<u8>> {
    let digits: Vec<u8> = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            c.to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| format!("Invalid hex digit '{}' in <unused> content.", c))
        })
        .collect::<Step<_>>()?;
    if digits.len() % 2 != 0 {
        return Err("Odd number of hex digits in <unused> content.".to_string());
    }
    Ok(digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

fn element_pattern(attributes: &Attributes) -> Step<NewPattern> {
    Ok(NewPattern {
        kind: PatternKind::Element,
        address: address_attribute(attributes)?,
    })
}

fn repeat_pattern(attributes: &Attributes) -> Step<NewPattern> {
    let address = address_attribute(attributes)?;
    let step = size_attribute(attributes, "step")?;
    let min = uint_attribute(attributes, "min")?;
    let max = uint_attribute(attributes, "max")?;

    let kind = if let Some(count) = uint_attribute(attributes, "n")? {
        PatternKind::FixedRepeat(FixedRepeatSpec { count, step })
    } else if step.is_some() || max.is_some() {
        if step.is_none() && min.is_none() {
            return Err("Block <repeat> requires a 'min' attribute.".to_string());
        }
        PatternKind::Repeat(RepeatSpec { min, max, step })
    } else {
        return Err("<repeat> requires either 'min'/'max' or 'n' attribute.".to_string());
    };
    Ok(NewPattern { kind, address })
}

/// Integer tags and their implied width, format and byte order.
/// `strict` tags need an explicit `endian` above one byte.
fn integer_pattern(
    tag: &str,
    attributes: &Attributes,
    format: IntegerFormat,
    width: Option<Size>,
    endian: Option<Endianness>,
    strict: bool,
) -> Step<FieldKind> {
    let width = match width {
        Some(width) => width,
        None => size_attribute(attributes, "width")?
            .ok_or_else(|| format!("<{}> requires a 'width' attribute.", tag))?,
    };
    if width.bits() > 64 {
        return Err(format!("<{}> width {} exceeds 64 bits.", tag, width));
    }

    let endian = match (endian, endian_attribute(attributes)?) {
        (Some(fixed), _) => fixed,
        (None, Some(endian)) => endian,
        (None, None) if strict && width.bits() > 8 => {
            return Err(format!(
                "<{}> requires an 'endian' attribute for widths above one byte.",
                tag
            ))
        }
        (None, None) => Endianness::Little,
    };

    let format = match attribute(attributes, "format") {
        None => format,
        Some("signed") => IntegerFormat::Signed,
        Some("unsigned") => IntegerFormat::Unsigned,
        Some("bcd") => return Ok(FieldKind::Bcd(BcdField { width, endian })),
        Some(other) => return Err(format!("Unknown integer format '{}'.", other)),
    };

    let mut field = IntegerField::new(width, format, endian);
    field.min = int_attribute(attributes, "min")?;
    field.max = int_attribute(attributes, "max")?;
    field.default = int_attribute(attributes, "default")?;

    let (lowest, highest) = field.representable();
    for (key, value) in [("min", field.min), ("max", field.max), ("default", field.default)] {
        if let Some(value) = value {
            if (value as i128) < lowest || (value as i128) > highest {
                return Err(format!(
                    "'{}' value {} does not fit into a {} bit {} field.",
                    key,
                    value,
                    width.bits(),
                    format.as_str()
                ));
            }
        }
    }
    Ok(FieldKind::Integer(field))
}

fn bcd_pattern(tag: &str, attributes: &Attributes, width: Option<Size>) -> Step<FieldKind> {
    let width = match width {
        Some(width) => width,
        None => size_attribute(attributes, "width")?
            .ok_or_else(|| format!("<{}> requires a 'width' attribute.", tag))?,
    };
    let endian = match endian_attribute(attributes)? {
        Some(endian) => endian,
        None if width.bits() > 8 => {
            return Err(format!(
                "<{}> requires an 'endian' attribute for widths above one byte.",
                tag
            ))
        }
        None => Endianness::Little,
    };
    Ok(FieldKind::Bcd(BcdField { width, endian }))
}

fn string_pattern(attributes: &Attributes) -> Step<FieldKind> {
    let chars = attribute(attributes, "width")
        .ok_or_else(|| "<string> requires a 'width' attribute.".to_string())?;
    let chars = chars
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("Invalid string width '{}'.", chars))?;
    let format = match attribute(attributes, "format") {
        None | Some("ascii") => StringFormat::Ascii,
        Some("unicode") => StringFormat::Unicode,
        Some(other) => return Err(format!("Unknown string format '{}'.", other)),
    };
    if chars.checked_mul(8 * format.bytes_per_char()).is_none() {
        return Err(format!("String width {} does not fit into the address space.", chars));
    }
    let pad = match attribute(attributes, "pad") {
        None => 0,
        Some(pad) => pad
            .trim()
            .parse::<u16>()
            .map_err(|_| format!("Invalid pad value '{}'.", pad))?,
    };
    Ok(FieldKind::String(StringField { chars, format, pad }))
}

/// Leaf tags; `None` for names that are not field tags
fn field_pattern(tag: &str, attributes: &Attributes) -> Step<Option<NewPattern>> {
    use IntegerFormat::{Signed, Unsigned};
    let bits = |n| Some(Size::from_bits(n));
    let little = Some(Endianness::Little);
    let big = Some(Endianness::Big);

    let field = match tag {
        "int" => integer_pattern(tag, attributes, Signed, None, None, true)?,
        "uint" => integer_pattern(tag, attributes, Unsigned, None, None, true)?,
        "bit" => integer_pattern(tag, attributes, Unsigned, bits(1), little, false)?,
        "int8" => integer_pattern(tag, attributes, Signed, bits(8), little, false)?,
        "uint8" => integer_pattern(tag, attributes, Unsigned, bits(8), little, false)?,
        "uint16" => integer_pattern(tag, attributes, Unsigned, bits(16), None, false)?,
        "uint16le" => integer_pattern(tag, attributes, Unsigned, bits(16), little, false)?,
        "uint16be" => integer_pattern(tag, attributes, Unsigned, bits(16), big, false)?,
        "uint32" => integer_pattern(tag, attributes, Unsigned, bits(32), None, false)?,
        "uint32le" => integer_pattern(tag, attributes, Unsigned, bits(32), little, false)?,
        "uint32be" => integer_pattern(tag, attributes, Unsigned, bits(32), big, false)?,
        "bcd" => bcd_pattern(tag, attributes, None)?,
        "bcd8" => bcd_pattern(tag, attributes, bits(32))?,
        "enum" => FieldKind::Enum(EnumField {
            width: size_attribute(attributes, "width")?
                .ok_or_else(|| "<enum> requires a 'width' attribute.".to_string())?,
            items: Vec::new(),
        }),
        "string" => string_pattern(attributes)?,
        "unknown" => FieldKind::Unknown {
            width: size_attribute(attributes, "width")?
                .ok_or_else(|| "<unknown> requires a 'width' attribute.".to_string())?,
        },
        "unused" => FieldKind::Unused {
            width: size_attribute(attributes, "width")?
                .ok_or_else(|| "<unused> requires a 'width' attribute.".to_string())?,
            content: None,
        },
        _ => return Ok(None),
    };
    Ok(Some(NewPattern {
        kind: PatternKind::Field(field),
        address: address_attribute(attributes)?,
    }))
}

/// Build a tree from already tokenized events; errors report the event number
pub fn parse_events<I>(events: I) -> Result<PatternTree>
where
    I: IntoIterator<Item = TagEvent>,
{
    let mut builder = PatternBuilder::new();
    let mut count = 0;
    for event in events {
        count += 1;
        builder
            .feed(&event)
            .map_err(|message| PatternError::Parse { line: count, message })?;
    }
    builder
        .finish()
        .map_err(|message| PatternError::Parse { line: count, message })
}

/// Parse a pattern document
pub fn parse_str(text: &str) -> Result<PatternTree> {
    let mut reader = TagReader::new(text);
    let mut builder = PatternBuilder::new();
    while let Some(event) = reader.next() {
        let event = event?;
        builder.feed(&event).map_err(|message| PatternError::Parse {
            line: reader.line(),
            message,
        })?;
    }
    let tree = builder.finish().map_err(|message| PatternError::Parse {
        line: reader.line(),
        message,
    })?;
    tracing::debug!("Parsed pattern document with {} nodes", tree.len());
    Ok(tree)
}

impl FromStr for PatternTree {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        parse_str(s)
    }
}

impl PatternTree {
    /// Read and parse a pattern file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading pattern from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        parse_str(&text)
    }
}
