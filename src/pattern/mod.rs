// Codeplug pattern engine
// Typed trees describing bit-level layouts of radio memory, read from and
// written to pattern documents.

pub mod events;
pub mod meta;
pub mod node;
pub mod parser;
pub mod tree;
pub mod value;
pub mod writer;

use crate::bitwise::{Address, OffsetError};
use thiserror::Error;

pub use events::{TagEvent, TagReader};
pub use meta::{Meta, MetaFlags};
pub use node::{
    BcdField, EnumField, EnumItem, FieldKind, FixedRepeatSpec, IntegerField, IntegerFormat,
    PatternKind, PatternNode, RepeatSpec, StringField, StringFormat,
};
pub use parser::{parse_events, parse_str, PatternBuilder};
pub use tree::{PatternId, PatternTree, VerifyError, VerifyReason};
pub use value::{decode_field, decode_from_rom, DecodeError, Decoded, FieldValue, Issue, Severity};

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Pattern {0} does not exist")]
    UnknownPattern(PatternId),

    #[error("{0} cannot hold child patterns")]
    NotAContainer(String),

    #[error("{0} only accepts fixed-size children")]
    NotFixed(String),

    #[error("Repeat already holds a pattern")]
    RepeatOccupied,

    #[error("A codeplug cannot be nested")]
    NestedCodeplug,

    #[error("Pattern is already attached to a parent")]
    AlreadyAttached,

    #[error("Pattern cannot contain itself")]
    Cycle,

    #[error("{0} has no address")]
    MissingAddress(String),

    #[error("Cannot append pattern at address {found}, must be {expected}")]
    Misplaced { found: Address, expected: Address },

    #[error("Address of {0} is managed by its parent")]
    ManagedAddress(String),

    #[error("{0} does not fit into the address space")]
    Overflow(String),

    #[error("Child index {index} out of range, have {count}")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Offset(#[from] OffsetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PatternError>;
