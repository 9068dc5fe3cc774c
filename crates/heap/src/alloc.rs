//! Growth and bump allocation.

use std::mem;
use tracing::debug;

use crate::error::HeapError;
use crate::granule::{round_up, GRANULE_BYTES, GRANULE_SHIFT};
use crate::offset::{Offset, Plain};
use crate::{Heap, MAX_HEAP_BYTES, WORD_BYTES};

impl<R: Plain> Heap<R> {
    /// Ensures at least `capacity` bytes are mapped. No-op if they already are.
    ///
    /// The file is extended to the next granule boundary (the new bytes read
    /// as zero) and only the added granules are mapped, as one new window.
    /// Windows mapped earlier stay where they are, so references obtained
    /// before the call remain valid.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), HeapError> {
        let from = self.granules.granule_count();
        self.grow(capacity as u64, from)
    }

    /// Extends the file to cover `requested` bytes and maps one window from
    /// granule `from` to the new end.
    fn grow(&mut self, requested: u64, from: usize) -> Result<(), HeapError> {
        let current = self.granules.capacity();
        if requested <= current {
            return Ok(());
        }

        let target = round_up(requested, GRANULE_BYTES as u64);
        if target > MAX_HEAP_BYTES {
            return Err(HeapError::Exhausted { requested });
        }

        self.file
            .set_len(target)
            .map_err(|source| HeapError::Resize {
                size: current,
                requested: target,
                source,
            })?;
        self.granules.map_window(&self.file, from, target)?;

        debug!(
            from = current,
            to = target,
            first_granule = from,
            windows = self.granules.window_count(),
            "heap grown"
        );
        Ok(())
    }

    /// Allocates room for one `T`. See [`alloc_extra`](Heap::alloc_extra).
    pub fn alloc<T: Plain>(&mut self) -> Result<Offset<T>, HeapError> {
        self.alloc_extra(0)
    }

    /// Allocates `size_of::<T>() + extra` bytes at the end of the heap.
    ///
    /// The request is rounded up to [`WORD_BYTES`] (and to at least one word,
    /// so every allocation gets a distinct offset). The new `size` is written
    /// to the header before returning; if the process dies before the caller
    /// fills the region, those bytes stay spent. Fresh space reads as zeroes.
    ///
    /// The `extra` tail is reachable through [`bytes`](Heap::bytes) /
    /// [`bytes_mut`](Heap::bytes_mut) at `offset + size_of::<T>()`.
    pub fn alloc_extra<T: Plain>(&mut self, extra: usize) -> Result<Offset<T>, HeapError> {
        let start = round_up(u64::from(self.size), WORD_BYTES as u64);
        let align = mem::align_of::<T>();
        if align > WORD_BYTES {
            return Err(HeapError::Misaligned {
                offset: start as u32,
                align,
            });
        }

        let bytes = (mem::size_of::<T>() as u64)
            .checked_add(extra as u64)
            .ok_or(HeapError::Exhausted {
                requested: u64::MAX,
            })?;
        let bytes = round_up(bytes.max(1), WORD_BYTES as u64);
        let end = start + bytes;
        if end > u64::from(u32::MAX) {
            return Err(HeapError::Exhausted { requested: end });
        }

        // The new region must be contiguous in memory: start its window at
        // the region's first granule whenever it would cross a window's end.
        let first = (start >> GRANULE_SHIFT) as usize;
        if end > self.granules.capacity() {
            self.grow(end, first)?;
        } else if self.granules.locate(start as usize, bytes as usize).is_none() {
            let last = round_up(end, GRANULE_BYTES as u64);
            self.granules.map_window(&self.file, first, last)?;
            debug!(
                first_granule = first,
                to = last,
                windows = self.granules.window_count(),
                "allocation span remapped"
            );
        }
        self.store_size(end as u32);
        Ok(Offset::new(start as u32))
    }

    /// Allocates a `T` and moves `value` into it.
    pub fn alloc_value<T: Plain>(&mut self, value: T) -> Result<Offset<T>, HeapError> {
        let offset = self.alloc::<T>()?;
        *self.get_mut(offset)? = value;
        Ok(offset)
    }
}
