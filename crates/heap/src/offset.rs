//! Typed 32-bit heap offsets and the [`Plain`] marker for storable records.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker for types that may live inside the heap.
///
/// The heap hands out references straight into mapped file memory, and a
/// freshly grown region is all zero bytes. Whatever is stored there must
/// therefore be meaningful for any byte content.
///
/// # Safety
///
/// Implementors must guarantee that:
///
/// - every bit pattern, including all zeroes, is a valid value;
/// - the type holds no pointers, references or other address-dependent
///   data (use [`Offset`] to link records instead);
/// - the layout is stable, i.e. the type is `#[repr(C)]` or
///   `#[repr(transparent)]` (or a primitive / array of primitives);
/// - the size does not depend on the host, so a file written on a 64-bit
///   machine reads the same on a 32-bit one.
///
/// For that last reason `usize` and `isize` are not `Plain`:
///
/// ```compile_fail
/// fn storable<T: heap::Plain>() {}
/// storable::<usize>();
/// ```
pub unsafe trait Plain: Copy + 'static {}

macro_rules! impl_plain {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl Plain for $t {})*
    };
}

impl_plain!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

unsafe impl<T: Plain, const N: usize> Plain for [T; N] {}

/// A position in the heap that is expected to hold a `T`.
///
/// The type parameter is a compile-time tag only: nothing stops a caller
/// from fabricating an offset of the wrong type, so every dereference goes
/// through the heap's bounds and alignment checks.
///
/// The value `0` is the null offset. The header occupies byte 0, so no
/// allocation can ever be returned there.
#[repr(transparent)]
pub struct Offset<T> {
    raw: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Offset<T> {
    /// The null offset.
    pub const NULL: Self = Self::new(0);

    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// The raw byte position.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.raw
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.raw == 0
    }

    /// Points this handle at a different byte position.
    pub fn set(&mut self, raw: u32) {
        self.raw = raw;
    }

    /// Re-tags the offset as pointing at a `U`.
    #[must_use]
    pub const fn cast<U>(self) -> Offset<U> {
        Offset::new(self.raw)
    }
}

// Manual impls: derives would demand `T: Clone` etc. for a pure tag.

impl<T> Clone for Offset<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Offset<T> {}

impl<T> PartialEq for Offset<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Offset<T> {}

impl<T> PartialOrd for Offset<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Offset<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for Offset<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> Default for Offset<T> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<T> From<u32> for Offset<T> {
    fn from(raw: u32) -> Self {
        Self::new(raw)
    }
}

impl<T> fmt::Debug for Offset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset({:#x})", self.raw)
    }
}

impl<T> fmt::Display for Offset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

unsafe impl<T: 'static> Plain for Offset<T> {}
