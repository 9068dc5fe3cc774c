//! Heap file header codec.
//!
//! ```text
//! [magic: u32 LE][version: u32 LE][size: u32 LE][reserved: u32 LE]
//! ```
//!
//! The header lives at file offset 0 and is never moved. `size` is the
//! logical high-water mark of the bump allocator; `reserved` is written as
//! zero on creation and never touched again.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{self, Read};

use crate::error::HeapError;

/// Signature identifying heap files (ASCII "MHEP").
pub const HEAP_MAGIC: u32 = 0x4D48_4550;

/// The only format revision this crate reads or writes.
pub const HEAP_VERSION: u32 = 0;

/// Size of the encoded header in bytes.
pub const HEADER_BYTES: usize = 16;

/// Byte position of the `size` field inside the header.
pub(crate) const SIZE_FIELD: usize = 8;

/// Decoded copy of the on-disk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub version: u32,
    pub size: u32,
    pub reserved: u32,
}

impl Header {
    /// A header for a freshly created heap whose high-water mark is `size`.
    pub fn new(size: u32) -> Self {
        Self {
            magic: HEAP_MAGIC,
            version: HEAP_VERSION,
            size,
            reserved: 0,
        }
    }

    /// Decodes a header from the first [`HEADER_BYTES`] of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`HEADER_BYTES`].
    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            magic: LittleEndian::read_u32(&bytes[0..4]),
            version: LittleEndian::read_u32(&bytes[4..8]),
            size: LittleEndian::read_u32(&bytes[8..12]),
            reserved: LittleEndian::read_u32(&bytes[12..16]),
        }
    }

    /// Encodes this header into the first [`HEADER_BYTES`] of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`HEADER_BYTES`].
    pub fn encode_into(&self, bytes: &mut [u8]) {
        LittleEndian::write_u32(&mut bytes[0..4], self.magic);
        LittleEndian::write_u32(&mut bytes[4..8], self.version);
        LittleEndian::write_u32(&mut bytes[8..12], self.size);
        LittleEndian::write_u32(&mut bytes[12..16], self.reserved);
    }

    /// Reads a header from the current position of `r`.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let magic = r.read_u32::<LittleEndian>()?;
        let version = r.read_u32::<LittleEndian>()?;
        let size = r.read_u32::<LittleEndian>()?;
        let reserved = r.read_u32::<LittleEndian>()?;
        Ok(Self {
            magic,
            version,
            size,
            reserved,
        })
    }

    /// Checks the signature, the revision, and that `size` describes a heap
    /// holding at least `core` bytes (header + root) inside a file of
    /// `file_len` bytes.
    pub fn validate(&self, core: u64, file_len: u64) -> Result<(), HeapError> {
        if self.magic != HEAP_MAGIC {
            return Err(HeapError::BadMagic { found: self.magic });
        }
        if self.version != HEAP_VERSION {
            return Err(HeapError::UnsupportedVersion {
                found: self.version,
            });
        }
        let size = u64::from(self.size);
        if size < core {
            return Err(HeapError::corrupt(format!(
                "logical size {size} is smaller than header and root ({core})"
            )));
        }
        if size > file_len {
            return Err(HeapError::corrupt(format!(
                "logical size {size} exceeds file length {file_len}"
            )));
        }
        Ok(())
    }
}
