use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while opening, growing or reading a heap.
///
/// None of these are retried internally. A heap that fails validation is
/// never handed back to the caller, so a corrupt file cannot be used by
/// accident.
#[derive(Debug, Error)]
pub enum HeapError {
    /// The backing file could not be opened or inspected.
    #[error("failed to open heap file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The exclusive advisory lock is held by someone else (or could not be taken).
    #[error("failed to lock heap file {} for exclusive use: {source}", .path.display())]
    Locked {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is too small or its header describes an impossible heap.
    #[error("corrupt heap header: {reason}")]
    CorruptHeader { reason: String },

    /// The header does not start with the heap signature.
    #[error("bad heap magic {found:#010x}")]
    BadMagic { found: u32 },

    /// The header carries a format revision this build cannot read.
    #[error("unsupported heap version {found}")]
    UnsupportedVersion { found: u32 },

    /// Extending the backing file failed.
    #[error("can't resize heap file from {size:#x} to {requested:#x} bytes: {source}")]
    Resize {
        size: u64,
        requested: u64,
        #[source]
        source: io::Error,
    },

    /// Mapping a new window of the backing file failed.
    #[error("can't map {len:#x} bytes at file offset {offset:#x}: {source}")]
    Map {
        offset: u64,
        len: usize,
        #[source]
        source: io::Error,
    },

    /// Flushing mapped windows to disk failed.
    #[error("failed to sync heap to disk: {0}")]
    Sync(#[source] io::Error),

    /// Offset 0 names the header and never refers to an allocation.
    #[error("null offset dereferenced")]
    NullOffset,

    /// The requested range lies (partly) outside the allocated heap.
    #[error("range {offset:#x}+{len:#x} is outside the heap (size {size:#x})")]
    OutOfRange { offset: u32, len: usize, size: u32 },

    /// The offset does not satisfy the alignment of the requested type.
    #[error("offset {offset:#x} is not aligned to {align} bytes")]
    Misaligned { offset: u32, align: usize },

    /// The heap would grow past what a 32-bit offset can address.
    #[error("heap exhausted: {requested:#x} bytes requested")]
    Exhausted { requested: u64 },
}

impl HeapError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        HeapError::CorruptHeader {
            reason: reason.into(),
        }
    }
}
