// Streaming tag events for pattern documents
// A small nom based reader for the XML subset used by pattern files: a
// declaration, comments, nested tags with quoted attributes, and text.

use super::{PatternError, Result};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till, take_till1, take_until, take_while1};
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::recognize;
use nom::multi::many0;
use nom::sequence::delimited;
use nom::{IResult, Parser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    Start {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    End {
        name: String,
    },
}

impl TagEvent {
    pub fn start(name: &str, attributes: &[(&str, &str)]) -> Self {
        TagEvent::Start {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn text(text: &str) -> Self {
        TagEvent::Text(text.to_string())
    }

    pub fn end(name: &str) -> Self {
        TagEvent::End {
            name: name.to_string(),
        }
    }
}

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')).parse(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_till(|c: char| c == '"'), char('"')),
        delimited(char('\''), take_till(|c: char| c == '\''), char('\'')),
    ))
    .parse(input)
}

fn attribute(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = multispace1(input)?;
    let (input, key) = name(input)?;
    let (input, _) = (multispace0, char('='), multispace0).parse(input)?;
    let (input, value) = quoted(input)?;
    Ok((input, (key, value)))
}

/// `<name attr="value" ...>` or `<name .../>`; the flag tells if the tag closes itself
fn start_tag(input: &str) -> IResult<&str, (&str, Vec<(&str, &str)>, bool)> {
    let (input, _) = char('<').parse(input)?;
    let (input, tag_name) = name(input)?;
    let (input, attributes) = many0(attribute).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, close) = alt((tag("/>"), tag(">"))).parse(input)?;
    Ok((input, (tag_name, attributes, close == "/>")))
}

fn end_tag(input: &str) -> IResult<&str, &str> {
    delimited(tag("</"), name, (multispace0, char('>'))).parse(input)
}

fn declaration(input: &str) -> IResult<&str, &str> {
    recognize((tag("<?"), take_until("?>"), tag("?>"))).parse(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
    recognize((tag("<!--"), take_until("-->"), tag("-->"))).parse(input)
}

fn doctype(input: &str) -> IResult<&str, &str> {
    recognize((tag("<!"), take_till(|c: char| c == '>'), char('>'))).parse(input)
}

fn text(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c == '<').parse(input)
}

/// Resolve the predefined and numeric character entities
pub fn unescape(text: &str) -> std::result::Result<String, String> {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let end = after
            .find(';')
            .ok_or_else(|| format!("Unterminated entity in '{}'", text))?;
        let entity = &after[..end];
        let resolved = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("Unknown entity '&{};'", entity))?
            }
        };
        result.push(resolved);
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}

/// Escape text for use in element content or attribute values
pub fn escape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            c => result.push(c),
        }
    }
    result
}

/// Iterator over the tag events of a document.
///
/// Self-closing tags produce a start and an end event. Whitespace-only text is
/// skipped. End tags must match the innermost open tag.
pub struct TagReader<'a> {
    input: &'a str,
    rest: &'a str,
    open: Vec<String>,
    pending_end: Option<String>,
    failed: bool,
}

impl<'a> TagReader<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            rest: input,
            open: Vec::new(),
            pending_end: None,
            failed: false,
        }
    }

    /// Line of the current read position, starting at 1
    pub fn line(&self) -> usize {
        let consumed = self.input.len() - self.rest.len();
        1 + self.input[..consumed].matches('\n').count()
    }

    fn syntax(&mut self, message: impl Into<String>) -> Option<Result<TagEvent>> {
        self.failed = true;
        Some(Err(PatternError::Syntax {
            line: self.line(),
            message: message.into(),
        }))
    }

    fn snippet(&self) -> String {
        self.rest.chars().take(20).collect()
    }
}

impl Iterator for TagReader<'_> {
    type Item = Result<TagEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(name) = self.pending_end.take() {
            return Some(Ok(TagEvent::End { name }));
        }

        loop {
            if self.rest.is_empty() {
                return match self.open.last() {
                    Some(open) => {
                        let message = format!("Unexpected end of document, <{}> is not closed", open);
                        self.syntax(message)
                    }
                    None => None,
                };
            }

            if self.rest.starts_with("<?") {
                match declaration(self.rest) {
                    Ok((rest, _)) => self.rest = rest,
                    Err(_) => return self.syntax("Unterminated declaration"),
                }
                continue;
            }

            if self.rest.starts_with("<!--") {
                match comment(self.rest) {
                    Ok((rest, _)) => self.rest = rest,
                    Err(_) => return self.syntax("Unterminated comment"),
                }
                continue;
            }

            if self.rest.starts_with("<!") {
                match doctype(self.rest) {
                    Ok((rest, _)) => self.rest = rest,
                    Err(_) => return self.syntax("Unterminated document type"),
                }
                continue;
            }

            if self.rest.starts_with("</") {
                let (rest, tag_name) = match end_tag(self.rest) {
                    Ok(parsed) => parsed,
                    Err(_) => {
                        let message = format!("Malformed end tag near '{}'", self.snippet());
                        return self.syntax(message);
                    }
                };
                match self.open.pop() {
                    Some(open) if open == tag_name => {}
                    Some(open) => {
                        let message = format!("Expected </{}>, found </{}>", open, tag_name);
                        return self.syntax(message);
                    }
                    None => {
                        let message = format!("Unexpected </{}>", tag_name);
                        return self.syntax(message);
                    }
                }
                self.rest = rest;
                return Some(Ok(TagEvent::end(tag_name)));
            }

            if self.rest.starts_with('<') {
                let (rest, (tag_name, raw_attributes, self_closing)) = match start_tag(self.rest) {
                    Ok(parsed) => parsed,
                    Err(_) => {
                        let message = format!("Malformed tag near '{}'", self.snippet());
                        return self.syntax(message);
                    }
                };
                let mut attributes = Vec::with_capacity(raw_attributes.len());
                for (key, value) in raw_attributes {
                    match unescape(value) {
                        Ok(value) => attributes.push((key.to_string(), value)),
                        Err(message) => return self.syntax(message),
                    }
                }
                self.rest = rest;
                if self_closing {
                    self.pending_end = Some(tag_name.to_string());
                } else {
                    self.open.push(tag_name.to_string());
                }
                return Some(Ok(TagEvent::Start {
                    name: tag_name.to_string(),
                    attributes,
                }));
            }

            let (rest, content) = match text(self.rest) {
                Ok(parsed) => parsed,
                Err(_) => return self.syntax("Unreadable text"),
            };
            self.rest = rest;
            if content.trim().is_empty() {
                continue;
            }
            if self.open.is_empty() {
                return self.syntax("Text outside of the root element");
            }
            return match unescape(content) {
                Ok(content) => Some(Ok(TagEvent::Text(content))),
                Err(message) => self.syntax(message),
            };
        }
    }
}
