// Descriptive metadata attached to every pattern

use serde::{Deserialize, Serialize};
use std::fmt;

/// Review state of a pattern, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum MetaFlags {
    #[default]
    None,
    Done,
    NeedsReview,
    Incomplete,
}

impl MetaFlags {
    /// Tag name used in pattern documents, if the flag is set
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            MetaFlags::None => None,
            MetaFlags::Done => Some("done"),
            MetaFlags::NeedsReview => Some("needs-review"),
            MetaFlags::Incomplete => Some("incomplete"),
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "done" => Some(MetaFlags::Done),
            "needs-review" => Some(MetaFlags::NeedsReview),
            "incomplete" => Some(MetaFlags::Incomplete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub name: String,
    pub short_name: String,
    pub brief: String,
    pub description: String,
    /// Minimum firmware version this pattern applies to
    pub firmware: String,
    pub flags: MetaFlags,
}

impl Meta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    /// True when nothing needs to be serialized
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.short_name.is_empty()
            && self.brief.is_empty()
            && self.description.is_empty()
            && self.firmware.is_empty()
            && self.flags == MetaFlags::None
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.short_name.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.short_name)
        }
    }
}

/// Collapse runs of whitespace and trim, the way tag text is normalised
pub fn simplify_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
