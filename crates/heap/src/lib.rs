//! # Heap - MapHeap persistent offset heap
//!
//! A single backing file is memory-mapped and used as a growable heap that is
//! addressed by 32-bit offsets instead of native pointers. Structures built
//! inside it link their records with [`Offset<T>`] handles, so the file can be
//! reopened later at a different virtual address and still be consistent.
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ HEADER (16 bytes, little-endian)                          │
//! │ magic (u32) | version (u32) | size (u32) | reserved (u32) │
//! ├──────────────────────────────────────────────────────────┤
//! │ ROOT RECORD (size_of::<R>(), caller-defined)              │
//! ├──────────────────────────────────────────────────────────┤
//! │ ALLOCATIONS (bump-allocated, 8-byte aligned)              │
//! │ ...                                                       │
//! ├──────────────────────────────────────────────────────────┤  ← size
//! │ zero fill up to the next 128 KiB granule                  │
//! └──────────────────────────────────────────────────────────┘  ← capacity
//! ```
//!
//! The file length is always a multiple of [`GRANULE_BYTES`]. `size` is the
//! allocator's high-water mark and only ever grows; there is no free list.
//!
//! ## Module Responsibilities
//!
//! | Module      | Purpose                                              |
//! |-------------|------------------------------------------------------|
//! | [`lib.rs`]  | `Heap` struct, accessors, `flush`, `Debug`, `Drop`   |
//! | [`open`]    | create / open, locking, header validation            |
//! | [`alloc`]   | `reserve()`, `alloc()` and friends                   |
//! | [`access`]  | bounds-checked offset translation, root accessor     |
//! | [`granule`] | mapped windows and the granule table                 |
//! | [`header`]  | header codec and validation                          |
//! | [`offset`]  | `Offset<T>` and the `Plain` marker trait              |
//!
//! ## Concurrency
//!
//! One mutator at a time: allocation, growth and mutable access take
//! `&mut self`. Across processes, an advisory exclusive lock taken at open
//! time keeps a second holder out for as long as the heap is alive.
//!
//! ## Example
//!
//! ```rust,no_run
//! use heap::{Heap, Offset, Plain};
//!
//! #[derive(Clone, Copy)]
//! #[repr(C)]
//! struct Root {
//!     head: Offset<Node>,
//!     count: u32,
//! }
//! unsafe impl Plain for Root {}
//!
//! #[derive(Clone, Copy)]
//! #[repr(C)]
//! struct Node {
//!     next: Offset<Node>,
//!     value: u32,
//! }
//! unsafe impl Plain for Node {}
//!
//! let mut heap = Heap::<Root>::open("data.heap").unwrap();
//! let node = heap.alloc_value(Node { next: heap.root().head, value: 7 }).unwrap();
//! heap.root_mut().head = node;
//! heap.root_mut().count += 1;
//! ```

mod access;
mod alloc;
mod error;
mod granule;
mod header;
mod offset;
mod open;

pub use config::{HeapConfig, LockMode};
pub use error::HeapError;
pub use granule::{round_up, GRANULE_BYTES, GRANULE_SHIFT};
pub use header::{Header, HEADER_BYTES, HEAP_MAGIC, HEAP_VERSION};
pub use offset::{Offset, Plain};

use byteorder::{ByteOrder, LittleEndian};
use granule::GranuleMap;
use header::SIZE_FIELD;
use std::fmt;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use tracing::{debug, warn};

/// Alignment of every allocation. Fixed at 8 on all hosts so heap files are
/// interchangeable between 32- and 64-bit builds.
pub const WORD_BYTES: usize = 8;

/// Offset of the root record: immediately after the header.
pub const ROOT_OFFSET: usize = HEADER_BYTES;

/// Upper bound on the mapped capacity; everything must stay addressable by a `u32`.
pub const MAX_HEAP_BYTES: u64 = 1 << 32;

/// Bytes taken by the header plus a root record of type `R`.
#[must_use]
pub const fn core_bytes<R>() -> u64 {
    (HEADER_BYTES + std::mem::size_of::<R>()) as u64
}

/// A memory-mapped, offset-addressed heap whose root record is an `R`.
///
/// Owns the backing file (and its advisory lock) and every mapped window.
/// Dropping the heap optionally flushes, then releases the lock, unmaps all
/// windows and closes the file.
pub struct Heap<R: Plain> {
    /// Mapped windows. Declared before `file` so they are unmapped first.
    pub(crate) granules: GranuleMap,
    pub(crate) file: File,
    pub(crate) path: PathBuf,
    /// Start of the window that served granule 0 at open. That window is
    /// never unmapped while the heap lives, so the header and root stay here.
    pub(crate) base: NonNull<u8>,
    /// Mirror of the header's `size` field.
    pub(crate) size: u32,
    pub(crate) sync_on_close: bool,
    pub(crate) _root: PhantomData<R>,
}

// SAFETY: `base` points into mappings owned by this value; nothing is shared
// with other handles, so moving the heap to another thread is fine.
unsafe impl<R: Plain + Send> Send for Heap<R> {}

impl<R: Plain> Heap<R> {
    /// Logical high-water mark: bytes handed out so far, header and root included.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Mapped bytes; always a multiple of [`GRANULE_BYTES`].
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.granules.capacity()
    }

    #[must_use]
    pub fn granule_count(&self) -> usize {
        self.granules.granule_count()
    }

    /// Number of `mmap` calls backing the heap: the initial one, one per growth,
    /// and one per allocation that had to bridge a window seam.
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.granules.window_count()
    }

    /// Address space taken by all live windows. Exceeds [`capacity`](Heap::capacity)
    /// by the granules that are mapped more than once.
    #[must_use]
    pub fn mapped_bytes(&self) -> u64 {
        self.granules.mapped_bytes()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decoded copy of the on-disk header.
    #[must_use]
    pub fn header(&self) -> Header {
        Header::decode(self.header_bytes())
    }

    /// Synchronously writes every mapped window back to the file.
    pub fn flush(&self) -> Result<(), HeapError> {
        self.granules.flush().map_err(HeapError::Sync)
    }

    fn header_bytes(&self) -> &[u8] {
        // SAFETY: the first window covers at least header + root.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr(), HEADER_BYTES) }
    }

    fn header_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` rules out other borrows of the mapping.
        unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr(), HEADER_BYTES) }
    }

    /// Advances the high-water mark and persists it into the mapped header.
    pub(crate) fn store_size(&mut self, size: u32) {
        debug_assert!(size >= self.size);
        self.size = size;
        LittleEndian::write_u32(&mut self.header_bytes_mut()[SIZE_FIELD..SIZE_FIELD + 4], size);
    }
}

impl<R: Plain> fmt::Debug for Heap<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("capacity", &self.capacity())
            .field("granules", &self.granule_count())
            .field("windows", &self.window_count())
            .field("mapped_bytes", &self.mapped_bytes())
            .field("sync_on_close", &self.sync_on_close)
            .finish()
    }
}

impl<R: Plain> Drop for Heap<R> {
    fn drop(&mut self) {
        if self.sync_on_close {
            if let Err(e) = self.flush() {
                warn!(path = %self.path.display(), error = %e, "flush on close failed");
            }
        }
        // Explicit trait call: std's inherent `File::unlock` would otherwise win.
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "unlock on close failed");
        }
        debug!(path = %self.path.display(), size = self.size, "heap closed");
        // windows unmap, then the descriptor closes, as the fields drop
    }
}

#[cfg(test)]
mod tests;
