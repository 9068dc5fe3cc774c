//! Granule map: the set of mapped windows covering the heap file.
//!
//! The file is mapped in 128 KiB granules. Each growth maps one new
//! *window* (a single `mmap` call) spanning one or more granules, and a
//! table records which window currently serves every granule:
//!
//! ```text
//! granule:   0     1     2     3     4     5
//!          ┌─────┬─────┬─────┐
//! window 0 │  0  │  1  │  2  │                  (from open)
//!          └─────┴─────┴─────┘
//!                      ┌─────┬─────┬─────┬─────┐
//! window 1             │  2  │  3  │  4  │  5  │ (allocation crossing the end)
//!                      └─────┴─────┴─────┴─────┘
//! table:     0     0     1     1     1     1
//! ```
//!
//! A plain reservation maps only the granules it adds. An allocation whose
//! region would cross a window's end gets a window starting at its own first
//! granule, so the region is contiguous in memory; at most one granule is
//! mapped twice per such allocation. Windows are never unmapped
//! before the map is dropped, which keeps every address handed out earlier
//! valid; two windows covering the same granule are coherent shared
//! mappings of the same file pages.

use memmap2::{MmapOptions, MmapRaw};
use std::fs::File;
use std::io;
use std::ptr::NonNull;

use crate::error::HeapError;

/// log2 of the granule size.
pub const GRANULE_SHIFT: u32 = 17;

/// Size of one granule: 128 KiB.
pub const GRANULE_BYTES: usize = 1 << GRANULE_SHIFT;

/// Rounds `value` up to the next multiple of `align`, which must be a power of two.
#[inline]
#[must_use]
pub const fn round_up(value: u64, align: u64) -> u64 {
    let mask = align - 1;
    (value + mask) & !mask
}

struct Window {
    map: MmapRaw,
    /// Index of the first granule this window covers.
    first: usize,
}

impl Window {
    fn end(&self) -> usize {
        self.first + (self.map.len() >> GRANULE_SHIFT)
    }
}

pub(crate) struct GranuleMap {
    windows: Vec<Window>,
    /// Serving window for each granule.
    table: Vec<usize>,
}

impl GranuleMap {
    pub(crate) fn new() -> Self {
        Self {
            windows: Vec::new(),
            table: Vec::new(),
        }
    }

    pub(crate) fn granule_count(&self) -> usize {
        self.table.len()
    }

    pub(crate) fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Mapped bytes; always a whole number of granules.
    pub(crate) fn capacity(&self) -> u64 {
        (self.table.len() as u64) << GRANULE_SHIFT
    }

    /// Total length of every live window, counting aliased granules once per
    /// window that maps them.
    pub(crate) fn mapped_bytes(&self) -> u64 {
        self.windows.iter().map(|w| w.map.len() as u64).sum()
    }

    /// Maps `file` from granule `from` up to byte `end` as one window and
    /// makes it the serving window for that range.
    ///
    /// `end` must be granule-aligned and the file at least that long; `from`
    /// must not skip past the currently mapped granules. Granules past `end`
    /// keep their serving window.
    pub(crate) fn map_window(
        &mut self,
        file: &File,
        from: usize,
        end: u64,
    ) -> Result<(), HeapError> {
        debug_assert_eq!(end % GRANULE_BYTES as u64, 0);
        debug_assert!(from <= self.table.len());

        let offset = (from as u64) << GRANULE_SHIFT;
        debug_assert!(end > offset);
        let len = usize::try_from(end - offset)
            .map_err(|_| HeapError::Exhausted { requested: end })?;
        let map = MmapOptions::new()
            .offset(offset)
            .len(len)
            .map_raw(file)
            .map_err(|source| HeapError::Map {
                offset,
                len,
                source,
            })?;

        let index = self.windows.len();
        let window = Window { map, first: from };
        let last = window.end();
        self.windows.push(window);
        if self.table.len() < last {
            self.table.resize(last, index);
        }
        self.table[from..last].fill(index);
        Ok(())
    }

    /// Address of `offset`, provided the whole range `offset..offset + len`
    /// lies in the window serving `offset`'s granule.
    pub(crate) fn locate(&self, offset: usize, len: usize) -> Option<NonNull<u8>> {
        let window = &self.windows[*self.table.get(offset >> GRANULE_SHIFT)?];
        let last = offset.checked_add(len.max(1))? - 1;
        if last >> GRANULE_SHIFT >= window.end() {
            return None;
        }
        let rel = offset - (window.first << GRANULE_SHIFT);
        // SAFETY: `rel + len` is within the window's mapped length (checked above).
        NonNull::new(unsafe { window.map.as_mut_ptr().add(rel) })
    }

    /// Synchronously flushes every window to the backing file.
    pub(crate) fn flush(&self) -> io::Result<()> {
        for window in &self.windows {
            window.map.flush()?;
        }
        Ok(())
    }
}
