//! Allocation metadata - one record per live allocation
//!
//! A record owns its allocation only through its refcount: the registry
//! releases the memory once the count reaches zero and a sweep runs.

use core::ptr::NonNull;
use crate::logging::log_free;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Next slot handed out to a zero-sized allocation (1 is the dangling address)
static NEXT_ZST_SLOT: AtomicUsize = AtomicUsize::new(2);

/// Shape of an allocation: a single value or a contiguous array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Extent {
    #[default]
    Scalar,
    Array(usize),
}

impl Extent {
    /// Number of elements covered (1 for scalars)
    #[inline]
    pub const fn len(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Array(len) => len,
        }
    }

    #[inline]
    pub const fn is_array(self) -> bool {
        matches!(self, Self::Array(_))
    }
}

/// Address to register for a pointer just taken out of a `Box`
///
/// Every box of a zero-sized type shares one dangling address, which would
/// fold separate allocations into one record and skip destructors. Any
/// non-null aligned address is valid for such a box, so each one gets its own.
pub(crate) fn distinct_address<T>(ptr: *mut T) -> *mut T {
    if core::mem::size_of::<T>() != 0 {
        return ptr;
    }
    let slot = NEXT_ZST_SLOT.fetch_add(1, Ordering::Relaxed);
    slot.wrapping_mul(core::mem::align_of::<T>()) as *mut T
}

/// Registry entry tracking one allocation
pub(crate) struct Record<T> {
    address: NonNull<T>,
    refcount: usize,
    extent: Extent,
    /// Insertion sequence, keeps dumps in registration order
    order: u64,
}

impl<T> Record<T> {
    /// New record with a single reference
    #[inline]
    pub(crate) fn new(address: NonNull<T>, extent: Extent, order: u64) -> Self {
        Self { address, refcount: 1, extent, order }
    }

    #[inline]
    pub(crate) fn order(&self) -> u64 {
        self.order
    }

    #[inline]
    pub fn address(&self) -> NonNull<T> {
        self.address
    }

    #[inline]
    pub fn refcount(&self) -> usize {
        self.refcount
    }

    #[inline]
    pub(crate) fn retain(&mut self) -> usize {
        self.refcount += 1;
        self.refcount
    }

    /// Drop one reference. Underflow is a caller bug; release builds stop at zero.
    #[inline]
    pub(crate) fn release(&mut self) -> usize {
        debug_assert!(self.refcount > 0, "refcount underflow");
        self.refcount = self.refcount.saturating_sub(1);
        self.refcount
    }

    #[inline]
    pub(crate) fn zero(&mut self) {
        self.refcount = 0;
    }

    /// Read the first element of the allocation
    ///
    /// # Safety
    /// The record must not have been freed.
    #[inline]
    pub(crate) unsafe fn value(&self) -> &T {
        self.address.as_ref()
    }

    /// Snapshot of the bookkeeping fields
    pub fn info(&self) -> RecordInfo {
        RecordInfo {
            address: self.address.as_ptr() as usize,
            refcount: self.refcount,
            extent: self.extent,
        }
    }

    /// Return the allocation to the global allocator
    ///
    /// # Safety
    /// The address must come from `Box<T>` (scalar) or `Box<[T]>` of the
    /// recorded length (array), and no reference into it may outlive this call.
    pub(crate) unsafe fn free(self) {
        let ptr = self.address.as_ptr();
        log_free(ptr as *const u8, self.extent.len());

        match self.extent {
            Extent::Scalar => drop(Box::from_raw(ptr)),
            Extent::Array(len) => {
                drop(Box::from_raw(core::ptr::slice_from_raw_parts_mut(ptr, len)))
            }
        }
    }
}

/// Copy of a record's bookkeeping, safe to hold across registry mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordInfo {
    pub address: usize,
    pub refcount: usize,
    pub extent: Extent,
}
