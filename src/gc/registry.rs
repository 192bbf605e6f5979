//! Record registry - per-element-type table of live allocations
//!
//! Design: `RecordTable` is the plain keyed table; `Registry` is the shared
//! service handles talk to. Records are keyed by address in a hashed index,
//! so lookups are O(1) while equality stays plain address comparison.

use super::collector;
use super::record::{Extent, Record, RecordInfo};
use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::logging::{instrument, log_register, log_release, log_record_not_found, log_shutdown};
use core::ptr::NonNull;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Keyed table of records for one element type
pub(crate) struct RecordTable<T> {
    records: HashMap<usize, Record<T>>,
    next_order: u64,
    pub(crate) sweeps_run: usize,
    pub(crate) records_freed: usize,
}

// Safety: the table owns the allocations its records point to, like Box<T>.
// Dumps borrow `&T` under the lock while handles borrow it on their own
// thread, so sharing the table also needs `T: Sync`.
unsafe impl<T: Send + Sync> Send for RecordTable<T> {}

impl<T> RecordTable<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            records: HashMap::with_capacity(capacity),
            next_order: 0,
            sweeps_run: 0,
            records_freed: 0,
        }
    }

    /// Increment an existing record or insert a new one with refcount 1
    fn upsert(&mut self, address: NonNull<T>, extent: Extent) -> bool {
        let key = address.as_ptr() as usize;

        if let Some(record) = self.records.get_mut(&key) {
            let count = record.retain();
            log_register(key as *const u8, count, false);
            return false;
        }

        let order = self.next_order;
        self.next_order += 1;
        self.records.insert(key, Record::new(address, extent, order));
        log_register(key as *const u8, 1, true);
        true
    }

    pub(crate) fn find(&self, address: usize) -> Option<&Record<T>> {
        self.records.get(&address)
    }

    fn retain(&mut self, address: usize) -> Option<usize> {
        self.records.get_mut(&address).map(Record::retain)
    }

    fn decrement(&mut self, address: usize) -> Result<usize> {
        match self.records.get_mut(&address) {
            Some(record) => {
                let count = record.release();
                log_release(address as *const u8, count);
                Ok(count)
            }
            None => Err(GcError::RecordNotFound { address }),
        }
    }

    /// Remove every zero-count record, handing ownership to the caller
    pub(crate) fn detach_garbage(&mut self) -> Vec<Record<T>> {
        let dead: Vec<usize> = self
            .records
            .iter()
            .filter(|(_, record)| record.refcount() == 0)
            .map(|(&key, _)| key)
            .collect();

        dead.into_iter()
            .filter_map(|key| self.records.remove(&key))
            .collect()
    }

    fn zero_all(&mut self) {
        self.records.values_mut().for_each(Record::zero);
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Records in registration order
    pub(crate) fn ordered(&self) -> Vec<&Record<T>> {
        let mut records: Vec<&Record<T>> = self.records.values().collect();
        records.sort_by_key(|record| record.order());
        records
    }
}

impl<T> Drop for RecordTable<T> {
    fn drop(&mut self) {
        // No handle can reach the table any more, so leftovers are unreachable
        if self.records.is_empty() {
            return;
        }

        log_shutdown(core::any::type_name::<T>(), self.records.len());
        for (_, record) in self.records.drain() {
            unsafe { record.free() };
        }
    }
}

/// Shared registry of records for element type `T`
///
/// Cloning yields another reference to the same table. Handles keep a
/// clone, so a registry lives as long as any handle bound through it.
///
/// A registry crosses threads only when `T` is both `Send` and `Sync`:
///
/// ```compile_fail
/// use gcptr::Registry;
/// use std::cell::Cell;
///
/// fn assert_send<S: Send>(_: S) {}
/// assert_send(Registry::<Cell<u64>>::new());
/// ```
pub struct Registry<T> {
    inner: Arc<Mutex<RecordTable<T>>>,
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> core::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("element_type", &core::any::type_name::<T>())
            .field("records", &self.size())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Registry<T> {
    /// Process-wide registry for `T`, created on first use
    pub fn global() -> Self {
        collector::global_registry::<T>()
    }
}

impl<T> Registry<T> {
    /// Private registry with default configuration
    pub fn new() -> Self {
        Self::with_config(&GcConfig::default())
    }

    pub fn with_config(config: &GcConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecordTable::with_capacity(config.initial_capacity))),
        }
    }

    /// Register an allocation, or add a reference if already registered
    ///
    /// Returns `true` when a new record was inserted.
    ///
    /// # Safety
    /// `address` must come from `Box<T>` (scalar) or `Box<[T]>` with
    /// `extent.len()` elements (array), and its ownership passes to the
    /// registry. It must not be registered with any other registry. Boxes of
    /// zero-sized types share one address, so registering two of them
    /// directly folds them into one record; handle constructors avoid this.
    pub unsafe fn upsert(&self, address: NonNull<T>, extent: Extent) -> bool {
        self.inner.lock().upsert(address, extent)
    }

    /// Look up the record for an address
    pub fn find(&self, address: *const T) -> Option<RecordInfo> {
        self.inner.lock().find(address as usize).map(Record::info)
    }

    /// Add a reference to an existing record (no insert)
    pub(crate) fn retain(&self, address: *const T) -> bool {
        self.inner.lock().retain(address as usize).is_some()
    }

    /// Drop one reference from the record for `address`
    ///
    /// Does not sweep. Fails with `RecordNotFound` if nothing is registered.
    ///
    /// # Safety
    /// The caller must own one of the references being counted; releasing
    /// more references than exist frees memory other handles still use.
    pub unsafe fn decrement(&self, address: *const T) -> Result<()> {
        self.inner.lock().decrement(address as usize).map(|_| ())
    }

    /// Decrement then sweep; failures are logged, never raised
    pub(crate) fn release(&self, address: *const T) {
        let outcome = self.inner.lock().decrement(address as usize);
        if let Err(GcError::RecordNotFound { .. }) = outcome {
            log_record_not_found(address as *const u8);
        }
        self.sweep();
    }

    /// Free every allocation whose refcount is zero
    ///
    /// Returns `true` if at least one record was removed.
    pub fn sweep(&self) -> bool {
        collector::sweep(&self.inner)
    }

    /// Force every refcount to zero and sweep once
    ///
    /// # Safety
    /// Handles still bound through this registry are left dangling; they
    /// must not be dereferenced afterwards.
    #[instrument(level = "debug", skip_all, fields(element_type = core::any::type_name::<T>()))]
    pub unsafe fn shutdown(&self) {
        let records = {
            let mut table = self.inner.lock();
            table.zero_all();
            table.len()
        };

        if records > 0 {
            log_shutdown(core::any::type_name::<T>(), records);
        }
        self.sweep();
    }

    /// Number of live records
    pub fn size(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Snapshot of all records in registration order
    pub fn records(&self) -> Vec<RecordInfo> {
        self.inner.lock().ordered().into_iter().map(Record::info).collect()
    }

    /// Diagnostic listing of every record and the value it points to
    pub fn dump(&self) -> collector::Dump
    where
        T: core::fmt::Debug,
    {
        collector::dump(&self.inner.lock())
    }

    pub fn stats(&self) -> collector::RegistryStats {
        let table = self.inner.lock();
        collector::RegistryStats {
            records: table.len(),
            sweeps_run: table.sweeps_run,
            records_freed: table.records_freed,
        }
    }

    /// Whether both values refer to the same table
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
