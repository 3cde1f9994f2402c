// Bit-level building blocks for codeplug layouts

pub mod bcd;
pub mod elements;
pub mod offset;
pub mod types;

pub use bcd::{bcd_to_int, BcdError};
pub use elements::{
    extract_bits, read_u16_be, read_u24_be, read_u32_be, read_uint, sign_extend, write_u16_be,
    write_u32_be, ElementError,
};
pub use offset::{Address, Offset, OffsetError, Size};
pub use types::Endianness;
