//! Counted pointer handle
//!
//! A handle never owns memory outright. Ownership of an allocation is
//! spread across every handle bound to it through the record's refcount;
//! the registry frees the allocation on the sweep after the count hits zero.
//!
//! State machine: EMPTY (no address) <-> BOUND (registered address).

use super::cursor::Cursor;
use crate::error::{GcError, Result};
use crate::gc::{distinct_address, Extent, Registry};
use crate::logging::trace;
use core::ptr::NonNull;

/// Reference-counted pointer into a [`Registry`]
pub struct Handle<T> {
    ptr: Option<NonNull<T>>,
    extent: Extent,
    registry: Registry<T>,
}

impl<T: Send + Sync + 'static> Handle<T> {
    /// Empty handle bound to the global registry for `T`
    pub fn null() -> Self {
        Self::null_in(&Registry::global())
    }

    /// Allocate `value` and bind a handle to it
    pub fn new(value: T) -> Self {
        Self::new_in(&Registry::global(), value)
    }

    pub fn from_box(boxed: Box<T>) -> Self {
        Self::from_box_in(&Registry::global(), boxed)
    }

    /// Bind to an array allocation; an empty slice yields an empty handle
    pub fn from_boxed_slice(slice: Box<[T]>) -> Self {
        Self::from_boxed_slice_in(&Registry::global(), slice)
    }

    pub fn from_vec(values: Vec<T>) -> Self {
        Self::from_boxed_slice(values.into_boxed_slice())
    }

    /// Bind to a raw allocation (null yields an empty handle)
    ///
    /// # Safety
    /// Same contract as [`Registry::upsert`].
    pub unsafe fn from_raw(ptr: *mut T, extent: Extent) -> Self {
        Self::from_raw_in(&Registry::global(), ptr, extent)
    }
}

impl<T: Send + Sync + 'static> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Handle<T> {
    pub fn null_in(registry: &Registry<T>) -> Self {
        Self {
            ptr: None,
            extent: Extent::Scalar,
            registry: registry.clone(),
        }
    }

    pub fn new_in(registry: &Registry<T>, value: T) -> Self {
        Self::from_box_in(registry, Box::new(value))
    }

    pub fn from_box_in(registry: &Registry<T>, boxed: Box<T>) -> Self {
        let ptr = distinct_address(Box::into_raw(boxed));
        // Safety: a fresh box is a scalar allocation no registry knows about
        unsafe { Self::from_raw_in(registry, ptr, Extent::Scalar) }
    }

    pub fn from_boxed_slice_in(registry: &Registry<T>, slice: Box<[T]>) -> Self {
        let len = slice.len();
        if len == 0 {
            return Self::null_in(registry);
        }

        let ptr = distinct_address(Box::into_raw(slice) as *mut T);
        // Safety: a fresh boxed slice of `len` elements no registry knows about
        unsafe { Self::from_raw_in(registry, ptr, Extent::Array(len)) }
    }

    pub fn from_vec_in(registry: &Registry<T>, values: Vec<T>) -> Self {
        Self::from_boxed_slice_in(registry, values.into_boxed_slice())
    }

    /// # Safety
    /// Same contract as [`Registry::upsert`].
    pub unsafe fn from_raw_in(registry: &Registry<T>, ptr: *mut T, extent: Extent) -> Self {
        let mut handle = Self::null_in(registry);
        if let Some(address) = NonNull::new(ptr) {
            registry.upsert(address, extent);
            handle.bind(address, extent);
        }
        trace!(address = ?handle.ptr, extent = ?handle.extent, "Handle constructed");
        handle
    }

    // ===== Raw assignment =====

    /// Rebind to a raw allocation, releasing the current one first
    ///
    /// Returns the new address (null when `ptr` is null). Rebinding to the
    /// address already held leaves the count untouched: releasing first
    /// could free the allocation before it is registered again.
    ///
    /// # Safety
    /// Same contract as [`Registry::upsert`] for a non-null `ptr` that is
    /// not the address already held.
    pub unsafe fn assign_raw(&mut self, ptr: *mut T, extent: Extent) -> *mut T {
        let target = NonNull::new(ptr);

        match (self.ptr, target) {
            (None, None) => {}
            (None, Some(address)) => {
                self.registry.upsert(address, extent);
                self.bind(address, extent);
            }
            (Some(_), None) => {
                self.release();
                self.unbind();
            }
            (Some(current), Some(address)) if current == address => {}
            (Some(_), Some(address)) => {
                self.release();
                self.registry.upsert(address, extent);
                self.bind(address, extent);
            }
        }

        ptr
    }

    pub fn assign_box(&mut self, boxed: Box<T>) -> *mut T {
        let ptr = distinct_address(Box::into_raw(boxed));
        // Safety: a fresh box cannot alias the address this handle holds
        unsafe { self.assign_raw(ptr, Extent::Scalar) }
    }

    /// Rebind to an array allocation; an empty slice clears the handle
    pub fn assign_slice(&mut self, slice: Box<[T]>) -> *mut T {
        let len = slice.len();
        if len == 0 {
            self.clear();
            return core::ptr::null_mut();
        }

        let ptr = distinct_address(Box::into_raw(slice) as *mut T);
        // Safety: a fresh boxed slice cannot alias the address this handle holds
        unsafe { self.assign_raw(ptr, Extent::Array(len)) }
    }

    pub fn assign_vec(&mut self, values: Vec<T>) -> *mut T {
        self.assign_slice(values.into_boxed_slice())
    }

    /// Assign null: release the current allocation and become EMPTY
    pub fn clear(&mut self) {
        // Safety: assigning null registers nothing
        unsafe {
            self.assign_raw(core::ptr::null_mut(), Extent::Scalar);
        }
    }

    // ===== Handle assignment =====

    /// Rebind to whatever `rv` points at
    ///
    /// Rebinding to the address already held registers it again, so the
    /// record gains one more count than there are handles. That surplus
    /// delays reclamation until the registry is torn down.
    pub fn assign(&mut self, rv: &Handle<T>) {
        match (self.ptr, rv.ptr) {
            (None, None) => {}
            (None, Some(address)) => {
                // Safety: `rv` keeps the address registered in its registry
                unsafe { rv.registry.upsert(address, rv.extent) };
                self.adopt(rv);
            }
            (Some(_), None) => {
                self.release();
                self.unbind();
            }
            (Some(current), Some(address)) => {
                if current != address {
                    self.release();
                    self.adopt(rv);
                }
                // Safety: as above
                unsafe { rv.registry.upsert(address, rv.extent) };
            }
        }
    }

    fn bind(&mut self, address: NonNull<T>, extent: Extent) {
        self.ptr = Some(address);
        self.extent = extent;
    }

    /// EMPTY handles always carry a scalar extent
    fn unbind(&mut self) {
        self.ptr = None;
        self.extent = Extent::Scalar;
    }

    fn adopt(&mut self, rv: &Handle<T>) {
        self.ptr = rv.ptr;
        self.extent = rv.extent;
        if !self.registry.ptr_eq(&rv.registry) {
            self.registry = rv.registry.clone();
        }
    }

    /// Decrement the current record and sweep; never fails
    fn release(&mut self) {
        if let Some(address) = self.ptr {
            self.registry.release(address.as_ptr());
        }
    }

    // ===== Access =====

    /// Borrow the pointed-to value
    pub fn get(&self) -> Result<&T> {
        match self.ptr {
            // Safety: the allocation stays registered while this handle is bound
            Some(address) => Ok(unsafe { address.as_ref() }),
            None => Err(GcError::InvalidDereference),
        }
    }

    /// Mutably borrow the pointed-to value
    ///
    /// # Safety
    /// No other handle bound to the same allocation may be dereferenced
    /// while the returned borrow is alive.
    pub unsafe fn get_mut(&mut self) -> Result<&mut T> {
        match self.ptr {
            Some(mut address) => Ok(address.as_mut()),
            None => Err(GcError::InvalidDereference),
        }
    }

    /// Whole extent as a slice
    pub fn as_slice(&self) -> Result<&[T]> {
        match self.ptr {
            // Safety: the registered allocation holds `extent.len()` elements
            Some(address) => Ok(unsafe {
                core::slice::from_raw_parts(address.as_ptr(), self.extent.len())
            }),
            None => Err(GcError::InvalidDereference),
        }
    }

    /// Element `index` with no bounds or null check
    ///
    /// # Safety
    /// The handle must be bound and `index` must be below [`Handle::len`].
    #[inline]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        &*self.as_ptr().add(index)
    }

    /// Raw address, without transferring ownership
    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.map_or(core::ptr::null_mut(), NonNull::as_ptr)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.extent.is_array()
    }

    /// Elements in the allocation (1 for scalars)
    #[inline]
    pub fn len(&self) -> usize {
        self.extent.len()
    }

    /// Current count of the record this handle is bound to
    pub fn refcount(&self) -> Option<usize> {
        self.ptr
            .and_then(|address| self.registry.find(address.as_ptr()))
            .map(|info| info.refcount)
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    // ===== Comparison =====

    /// Exact address match against a raw pointer
    pub fn points_to(&self, ptr: *const T) -> bool {
        self.as_ptr() as *const T == ptr
    }

    /// Whether `ptr` lies in `[address, address + len * size_of::<T>()]`
    ///
    /// The upper bound is inclusive so the one-past-the-end address matches.
    pub fn contains(&self, ptr: *const T) -> bool {
        if self.is_null() {
            return false;
        }
        let start = self.as_ptr() as usize;
        let end = start + core::mem::size_of::<T>() * self.len();
        (start..=end).contains(&(ptr as usize))
    }

    // ===== Traversal =====

    /// Cursor at the first element
    pub fn begin(&self) -> Cursor<'_, T> {
        Cursor::new(self.as_ptr(), 0, self.span())
    }

    /// Cursor one past the last element
    pub fn end(&self) -> Cursor<'_, T> {
        let span = self.span();
        Cursor::new(self.as_ptr(), span, span)
    }

    fn span(&self) -> usize {
        if self.is_null() {
            0
        } else {
            self.extent.len()
        }
    }
}

impl<T> Clone for Handle<T> {
    /// Copy: share the allocation and count one more reference
    fn clone(&self) -> Self {
        if let Some(address) = self.ptr {
            if !self.registry.retain(address.as_ptr()) {
                trace!(address = ?address, "Copied handle has no record");
            }
        }

        Self {
            ptr: self.ptr,
            extent: self.extent,
            registry: self.registry.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_array(), other.is_array()) {
            (false, false) => self.ptr == other.ptr,
            (true, true) => self.ptr == other.ptr && self.len() == other.len(),
            _ => false,
        }
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialEq<*const T> for Handle<T> {
    fn eq(&self, other: &*const T) -> bool {
        self.points_to(*other)
    }
}

impl<T> PartialEq<*mut T> for Handle<T> {
    fn eq(&self, other: &*mut T) -> bool {
        self.points_to(*other as *const T)
    }
}

impl<T> core::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Handle")
            .field("address", &self.as_ptr())
            .field("extent", &self.extent)
            .field("refcount", &self.refcount())
            .finish()
    }
}
