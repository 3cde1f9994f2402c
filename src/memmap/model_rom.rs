// Sparse memory snapshot of an emulated radio
// Stores disjoint byte ranges keyed by their start address.

use std::fmt;
use std::ops::{Add, AddAssign};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelRomError {
    #[error("Cannot read {len}b from ROM at address {address:x}h")]
    NotFound { address: u32, len: usize },
}

pub type Result<T> = std::result::Result<T, ModelRomError>;

/// A contiguous stored byte range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    address: u32,
    content: Vec<u8>,
}

impl Segment {
    pub fn new(address: u32, content: Vec<u8>) -> Self {
        Self { address, content }
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// One past the last byte, widened so segments ending at 4GiB are representable
    pub fn end(&self) -> u64 {
        self.address as u64 + self.content.len() as u64
    }

    /// True if `[address, address+len)` lies entirely within this segment
    pub fn contains(&self, address: u32, len: usize) -> bool {
        self.address <= address && self.end() >= address as u64 + len as u64
    }
}

/// Sparse, coalescing byte-range store.
///
/// Segments are address-ordered and never overlap or touch: a write that
/// overlaps or borders existing segments is merged with all of them, the new
/// bytes taking precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRom {
    segments: Vec<Segment>,
}

impl ModelRom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total number of stored bytes
    pub fn stored_bytes(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Store `data` at `address`, merging with any overlapping or adjacent segment
    pub fn write(&mut self, address: u32, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let start = address as u64;
        let end = start + data.len() as u64;

        // Segments touching [start, end] form the range first..last
        let first = self.segments.partition_point(|s| s.end() < start);
        let last = first + self.segments[first..].partition_point(|s| s.address as u64 <= end);

        if first == last {
            self.segments
                .insert(first, Segment::new(address, data.to_vec()));
            return;
        }

        if last - first == 1 {
            let segment = &mut self.segments[first];
            if segment.contains(address, data.len()) {
                let offset = (address - segment.address) as usize;
                segment.content[offset..offset + data.len()].copy_from_slice(data);
                return;
            }
            if segment.end() == start {
                segment.content.extend_from_slice(data);
                return;
            }
        }

        let merged_start = start.min(self.segments[first].address as u64);
        let merged_end = end.max(self.segments[last - 1].end());
        let mut content = vec![0u8; (merged_end - merged_start) as usize];

        for segment in self.segments.drain(first..last) {
            let offset = (segment.address as u64 - merged_start) as usize;
            content[offset..offset + segment.content.len()].copy_from_slice(&segment.content);
        }
        let offset = (start - merged_start) as usize;
        content[offset..offset + data.len()].copy_from_slice(data);

        self.segments
            .insert(first, Segment::new(merged_start as u32, content));
    }

    /// Exactly `len` bytes at `address`, if a single segment holds all of them
    pub fn read(&self, address: u32, len: usize) -> Result<&[u8]> {
        let idx = self.segments.partition_point(|s| s.address <= address);
        if idx == 0 {
            return Err(ModelRomError::NotFound { address, len });
        }
        let segment = &self.segments[idx - 1];
        if !segment.contains(address, len) {
            return Err(ModelRomError::NotFound { address, len });
        }
        let offset = (address - segment.address) as usize;
        Ok(&segment.content[offset..offset + len])
    }

    pub fn contains(&self, address: u32, len: usize) -> bool {
        self.read(address, len).is_ok()
    }

    /// Apply every segment of `other` on top of this image
    pub fn overlay(&mut self, other: &ModelRom) {
        for segment in &other.segments {
            self.write(segment.address, &segment.content);
        }
    }

    /// Hex dump of every segment, labelled with absolute addresses
    pub fn dump(&self) -> String {
        let mut output = String::new();
        for segment in &self.segments {
            output.push_str(&format!(
                "segment {:08x}h, {} bytes\n",
                segment.address,
                segment.len()
            ));
            output.push_str(&hexdump(segment.address as u64, &segment.content));
        }
        output
    }
}

impl fmt::Display for ModelRom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelRom({} segments, {} bytes)",
            self.segments.len(),
            self.stored_bytes()
        )
    }
}

impl AddAssign<&ModelRom> for ModelRom {
    fn add_assign(&mut self, rhs: &ModelRom) {
        self.overlay(rhs);
    }
}

impl AddAssign for ModelRom {
    fn add_assign(&mut self, rhs: ModelRom) {
        self.overlay(&rhs);
    }
}

impl Add<&ModelRom> for &ModelRom {
    type Output = ModelRom;

    fn add(self, rhs: &ModelRom) -> ModelRom {
        let mut result = self.clone();
        result.overlay(rhs);
        result
    }
}

impl Add for ModelRom {
    type Output = ModelRom;

    fn add(mut self, rhs: ModelRom) -> ModelRom {
        self.overlay(&rhs);
        self
    }
}

/// Create a hex dump of bytes (similar to hexdump -C), offsets starting at `base`
pub fn hexdump(base: u64, data: &[u8]) -> String {
    let mut output = String::new();

    for (i, chunk) in data.chunks(16).enumerate() {
        output.push_str(&format!("{:08x}  ", base + (i * 16) as u64));

        for (j, byte) in chunk.iter().enumerate() {
            if j == 8 {
                output.push(' ');
            }
            output.push_str(&format!("{:02x} ", byte));
        }

        // Padding for incomplete lines
        for j in chunk.len()..16 {
            if j == 8 {
                output.push(' ');
            }
            output.push_str("   ");
        }

        output.push_str(" |");
        for byte in chunk {
            if (0x20..=0x7e).contains(byte) {
                output.push(*byte as char);
            } else {
                output.push('.');
            }
        }
        output.push_str("|\n");
    }

    output
}
