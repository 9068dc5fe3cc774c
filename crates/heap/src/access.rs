//! Offset-to-reference translation and the root accessor.
//!
//! Every dereference is checked: null, header bytes, misalignment, and
//! anything past the high-water mark are reported as errors rather than
//! silently reading whatever the granule happens to contain.

use std::mem;
use std::ptr::NonNull;

use crate::error::HeapError;
use crate::offset::{Offset, Plain};
use crate::{Heap, HEADER_BYTES, ROOT_OFFSET, WORD_BYTES};

impl<R: Plain> Heap<R> {
    pub fn get<T: Plain>(&self, offset: Offset<T>) -> Result<&T, HeapError> {
        self.get_at(offset.get())
    }

    pub fn get_mut<T: Plain>(&mut self, offset: Offset<T>) -> Result<&mut T, HeapError> {
        self.get_at_mut(offset.get())
    }

    /// Reads a `T` at a raw byte offset.
    pub fn get_at<T: Plain>(&self, at: u32) -> Result<&T, HeapError> {
        let ptr = self.translate(at, mem::size_of::<T>(), mem::align_of::<T>())?;
        // SAFETY: range and alignment checked; `T: Plain` accepts any bytes.
        Ok(unsafe { &*ptr.as_ptr().cast::<T>() })
    }

    pub fn get_at_mut<T: Plain>(&mut self, at: u32) -> Result<&mut T, HeapError> {
        let ptr = self.translate(at, mem::size_of::<T>(), mem::align_of::<T>())?;
        // SAFETY: as in `get_at`; `&mut self` makes this the only live borrow.
        Ok(unsafe { &mut *ptr.as_ptr().cast::<T>() })
    }

    /// Borrows `len` raw bytes starting at `at`.
    pub fn bytes(&self, at: u32, len: usize) -> Result<&[u8], HeapError> {
        if len == 0 {
            self.check_range(at, 0)?;
            return Ok(&[]);
        }
        let ptr = self.translate(at, len, 1)?;
        // SAFETY: `at..at + len` lies inside one mapped window.
        Ok(unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) })
    }

    pub fn bytes_mut(&mut self, at: u32, len: usize) -> Result<&mut [u8], HeapError> {
        if len == 0 {
            self.check_range(at, 0)?;
            return Ok(&mut []);
        }
        let ptr = self.translate(at, len, 1)?;
        // SAFETY: as in `bytes`.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), len) })
    }

    /// The root record stored right after the header.
    #[must_use]
    pub fn root(&self) -> &R {
        // SAFETY: open checked that header + root are mapped at `base` and
        // that `R`'s alignment divides ROOT_OFFSET.
        unsafe { &*self.base.as_ptr().add(ROOT_OFFSET).cast::<R>() }
    }

    pub fn root_mut(&mut self) -> &mut R {
        // SAFETY: as in `root`.
        unsafe { &mut *self.base.as_ptr().add(ROOT_OFFSET).cast::<R>() }
    }

    #[must_use]
    pub fn root_offset(&self) -> Offset<R> {
        Offset::new(ROOT_OFFSET as u32)
    }

    fn check_range(&self, at: u32, len: usize) -> Result<(), HeapError> {
        if at == 0 {
            return Err(HeapError::NullOffset);
        }
        let end = u64::from(at) + len as u64;
        // The start itself must be an allocated byte, even for empty ranges.
        if (at as usize) < HEADER_BYTES || at >= self.size || end > u64::from(self.size) {
            return Err(HeapError::OutOfRange {
                offset: at,
                len,
                size: self.size,
            });
        }
        Ok(())
    }

    fn translate(&self, at: u32, len: usize, align: usize) -> Result<NonNull<u8>, HeapError> {
        self.check_range(at, len)?;
        if align > WORD_BYTES || at as usize % align != 0 {
            return Err(HeapError::Misaligned { offset: at, align });
        }
        self.granules
            .locate(at as usize, len)
            .ok_or(HeapError::OutOfRange {
                offset: at,
                len,
                size: self.size,
            })
    }
}
