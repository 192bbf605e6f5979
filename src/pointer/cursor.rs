//! Bounds-checked traversal over one allocation's extent
//!
//! A cursor borrows its handle, so the allocation outlives it, but it holds
//! no count of its own and never touches the registry.

use crate::error::{GcError, Result};
use core::marker::PhantomData;

/// Position within `[lower, upper)` of a handle's allocation
pub struct Cursor<'a, T> {
    base: *const T,
    position: usize,
    lower: usize,
    upper: usize,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Cursor<'a, T> {
    #[inline]
    pub(crate) fn new(base: *const T, position: usize, upper: usize) -> Self {
        Self {
            base,
            position,
            lower: 0,
            upper,
            _marker: PhantomData,
        }
    }

    /// Element under the cursor
    pub fn get(&self) -> Result<&'a T> {
        self.at(0)
    }

    /// Element `index` places from the current position
    pub fn at(&self, index: isize) -> Result<&'a T> {
        let target = self.resolve(index)?;
        // Safety: target lies inside the borrowed allocation
        Ok(unsafe { &*self.base.add(target) })
    }

    /// Mutable element under the cursor
    ///
    /// # Safety
    /// Same contract as [`Cursor::at_mut`].
    pub unsafe fn get_mut(&mut self) -> Result<&mut T> {
        self.at_mut(0)
    }

    /// Mutable element `index` places from the current position
    ///
    /// # Safety
    /// No other borrow of that element, through this cursor, another cursor
    /// or any handle bound to the same allocation, may be alive while the
    /// returned borrow is.
    pub unsafe fn at_mut(&mut self, index: isize) -> Result<&mut T> {
        let target = self.resolve(index)?;
        Ok(&mut *(self.base as *mut T).add(target))
    }

    /// Absolute position `index` places away, if it lies in `[lower, upper)`
    fn resolve(&self, index: isize) -> Result<usize> {
        match (self.position as isize).checked_add(index) {
            Some(target) if target >= self.lower as isize && (target as usize) < self.upper => {
                Ok(target as usize)
            }
            Some(target) => Err(self.out_of_bounds(target)),
            None => Err(self.out_of_bounds(if index < 0 { isize::MIN } else { isize::MAX })),
        }
    }

    /// Step forward; stepping past `upper` fails
    pub fn advance(&mut self) -> Result<()> {
        if self.position >= self.upper {
            return Err(self.out_of_bounds(self.position as isize + 1));
        }
        self.position += 1;
        Ok(())
    }

    /// Step back; stepping before `lower` fails
    pub fn retreat(&mut self) -> Result<()> {
        if self.position <= self.lower {
            return Err(self.out_of_bounds(self.position as isize - 1));
        }
        self.position -= 1;
        Ok(())
    }

    /// Offset from the start of the allocation
    #[inline]
    pub fn offset(&self) -> usize {
        self.position
    }

    /// Number of elements the cursor may visit
    #[inline]
    pub fn span(&self) -> usize {
        self.upper - self.lower
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.position == self.upper
    }

    fn out_of_bounds(&self, index: isize) -> GcError {
        GcError::OutOfBounds {
            index,
            lower: self.lower,
            upper: self.upper,
        }
    }
}

impl<T> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cursor<'_, T> {}

impl<T> PartialEq for Cursor<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.position == other.position
    }
}

impl<T> Eq for Cursor<'_, T> {}

impl<'a, T> Iterator for Cursor<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let item = self.get().ok()?;
        self.position += 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.upper.saturating_sub(self.position);
        (len, Some(len))
    }
}

impl<T> ExactSizeIterator for Cursor<'_, T> {}

impl<T> core::fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cursor")
            .field("base", &self.base)
            .field("position", &self.position)
            .field("lower", &self.lower)
            .field("upper", &self.upper)
            .finish()
    }
}
