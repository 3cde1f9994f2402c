// Pattern document serialization

use super::events::escape;
use super::meta::Meta;
use super::node::{FieldKind, PatternKind};
use super::tree::{PatternId, PatternTree};
use super::Result;
use std::fmt::Write as _;
use std::path::Path;

const INDENT: &str = "  ";

struct Tag {
    name: &'static str,
    attributes: Vec<(&'static str, String)>,
}

impl Tag {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            attributes: Vec::new(),
        }
    }

    fn attr(mut self, key: &'static str, value: impl ToString) -> Self {
        self.attributes.push((key, value.to_string()));
        self
    }

    fn attr_opt(self, key: &'static str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.attr(key, value),
            None => self,
        }
    }

    fn start(&self, out: &mut String, depth: usize) {
        out.push_str(&INDENT.repeat(depth));
        let _ = write!(out, "<{}", self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", key, escape(value));
        }
    }

    fn open(&self, out: &mut String, depth: usize, self_closing: bool) {
        self.start(out, depth);
        out.push_str(if self_closing { "/>\n" } else { ">\n" });
    }

    /// Tag with text content on a single line
    fn inline(&self, out: &mut String, depth: usize, text: &str) {
        self.start(out, depth);
        let _ = writeln!(out, ">{}</{}>", text, self.name);
    }

    fn close(&self, out: &mut String, depth: usize) {
        out.push_str(&INDENT.repeat(depth));
        let _ = writeln!(out, "</{}>", self.name);
    }
}

fn text_element(out: &mut String, depth: usize, name: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    out.push_str(&INDENT.repeat(depth));
    let _ = writeln!(out, "<{}>{}</{}>", name, escape(text), name);
}

fn write_meta_fields(out: &mut String, depth: usize, meta: &Meta) {
    text_element(out, depth, "name", &meta.name);
    text_element(out, depth, "short-name", &meta.short_name);
    text_element(out, depth, "brief", &meta.brief);
    text_element(out, depth, "description", &meta.description);
    text_element(out, depth, "firmware", &meta.firmware);
    if let Some(flag) = meta.flags.tag() {
        out.push_str(&INDENT.repeat(depth));
        let _ = writeln!(out, "<{}/>", flag);
    }
}

fn write_meta(out: &mut String, depth: usize, meta: &Meta) {
    if meta.is_empty() {
        return;
    }
    out.push_str(&INDENT.repeat(depth));
    out.push_str("<meta>\n");
    write_meta_fields(out, depth + 1, meta);
    out.push_str(&INDENT.repeat(depth));
    out.push_str("</meta>\n");
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn field_tag(field: &FieldKind) -> Tag {
    match field {
        FieldKind::Integer(int) => {
            let tag = Tag::new("int")
                .attr("width", int.width)
                .attr("format", int.format.as_str());
            let tag = if int.width.bits() > 8 {
                tag.attr("endian", int.endian)
            } else {
                tag
            };
            tag.attr_opt("min", int.min)
                .attr_opt("max", int.max)
                .attr_opt("default", int.default)
        }
        FieldKind::Bcd(bcd) => {
            let tag = if bcd.width.bits() == 32 {
                Tag::new("bcd8")
            } else {
                Tag::new("bcd").attr("width", bcd.width)
            };
            if bcd.width.bits() > 8 {
                tag.attr("endian", bcd.endian)
            } else {
                tag
            }
        }
        FieldKind::Enum(field) => Tag::new("enum").attr("width", field.width),
        FieldKind::String(field) => {
            let tag = Tag::new("string")
                .attr("format", field.format.as_str())
                .attr("width", field.chars);
            if field.pad != 0 {
                tag.attr("pad", field.pad)
            } else {
                tag
            }
        }
        FieldKind::Unknown { width } => Tag::new("unknown").attr("width", width),
        FieldKind::Unused { width, .. } => Tag::new("unused").attr("width", width),
    }
}

fn pattern_tag(kind: &PatternKind) -> Tag {
    match kind {
        PatternKind::Codeplug => Tag::new("codeplug"),
        PatternKind::Element => Tag::new("element"),
        PatternKind::Repeat(spec) => Tag::new("repeat")
            .attr_opt("step", spec.step)
            .attr_opt("min", spec.min)
            .attr_opt("max", spec.max),
        PatternKind::FixedRepeat(spec) => Tag::new("repeat")
            .attr("n", spec.count)
            .attr_opt("step", spec.step),
        PatternKind::Field(field) => field_tag(field),
    }
}

impl PatternTree {
    /// Serialize the document; a tree without root only yields the header
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<!--vi: set ts=2 sw=2:-->\n");
        if let Some(root) = self.root() {
            self.write_pattern(&mut out, root, 0);
        }
        out
    }

    fn write_pattern(&self, out: &mut String, id: PatternId, depth: usize) {
        let Some(node) = self.get(id) else {
            return;
        };
        let mut tag = pattern_tag(node.kind());
        // Addresses below elements and repeats follow from the layout
        let placed_by_codeplug = self
            .parent(id)
            .is_some_and(|parent| self[parent].kind() == &PatternKind::Codeplug);
        if let (true, Some(address)) = (placed_by_codeplug, node.address()) {
            tag.attributes.insert(0, ("at", address.to_string()));
        }

        let (items, content) = match node.kind() {
            PatternKind::Field(FieldKind::Enum(field)) => (field.items.as_slice(), None),
            PatternKind::Field(FieldKind::Unused { content, .. }) => {
                (&[][..], content.as_deref().map(hex))
            }
            _ => (&[][..], None),
        };

        if node.meta().is_empty() && node.children().is_empty() && items.is_empty() {
            match content {
                Some(text) => tag.inline(out, depth, &text),
                None => tag.open(out, depth, true),
            }
            return;
        }

        tag.open(out, depth, false);
        write_meta(out, depth + 1, node.meta());
        if let Some(text) = content {
            out.push_str(&INDENT.repeat(depth + 1));
            out.push_str(&text);
            out.push('\n');
        }
        for item in items {
            let item_tag = Tag::new("item").attr("value", item.value);
            if item.meta.is_empty() {
                item_tag.open(out, depth + 1, true);
            } else {
                item_tag.open(out, depth + 1, false);
                write_meta_fields(out, depth + 2, &item.meta);
                item_tag.close(out, depth + 1);
            }
        }
        for child in node.children() {
            self.write_pattern(out, *child, depth + 1);
        }
        tag.close(out, depth);
    }

    /// Write the document to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_xml())?;
        tracing::info!("Saved pattern to {}", path.display());
        Ok(())
    }
}
