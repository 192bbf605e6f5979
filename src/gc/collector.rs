//! Collector - sweep, diagnostics and the process-wide registries
//!
//! Design: sweeps detach zero-count records while the table is locked and
//! free them after the lock is released, so element destructors may drop
//! handles into the same registry. Global registries live in a lock-free
//! table keyed by element type and are torn down by an exit hook.

use super::registry::{Registry, RecordTable};
use crate::config::GcConfig;
use crate::logging::{debug, info, instrument, log_registry_created, log_sweep, warn};
use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shown in dumps for records whose count already reached zero
pub const PLACEHOLDER: &str = "---";

/// Global registries, one per element type
static GLOBAL_REGISTRIES: Lazy<DashMap<TypeId, Arc<dyn ErasedRegistry>>> =
    Lazy::new(|| DashMap::with_capacity(16));

/// Configuration applied to global registries
static CONFIG: OnceCell<GcConfig> = OnceCell::new();

/// Set once the exit hook is registered
static EXIT_HOOK: OnceCell<()> = OnceCell::new();

/// Process-wide collector counters (lock-free)
static GC_STATE: Lazy<GcState> = Lazy::new(GcState::new);

struct GcState {
    sweeps_run: AtomicUsize,
    records_freed: AtomicUsize,
}

impl GcState {
    fn new() -> Self {
        Self {
            sweeps_run: AtomicUsize::new(0),
            records_freed: AtomicUsize::new(0),
        }
    }
}

/// Type-erased view of a global registry
trait ErasedRegistry: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn element_type(&self) -> &'static str;
    fn size(&self) -> usize;
    unsafe fn shutdown(&self);
}

impl<T: Send + Sync + 'static> ErasedRegistry for Registry<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn element_type(&self) -> &'static str {
        core::any::type_name::<T>()
    }

    fn size(&self) -> usize {
        Registry::size(self)
    }

    unsafe fn shutdown(&self) {
        Registry::shutdown(self)
    }
}

/// Install the configuration used by global registries
///
/// Returns `false` if a configuration was already in effect (explicitly
/// or because a global registry was created first).
pub fn configure(config: GcConfig) -> bool {
    let accepted = CONFIG.set(config).is_ok();
    if !accepted {
        warn!("GC configuration already in effect; ignoring new configuration");
    }
    accepted
}

/// Configuration in effect, loaded from the environment on first use
pub fn config() -> &'static GcConfig {
    CONFIG.get_or_init(GcConfig::from_env)
}

/// Fetch or lazily create the global registry for `T`
pub(crate) fn global_registry<T: Send + Sync + 'static>() -> Registry<T> {
    let config = config();

    let registry = {
        let entry = GLOBAL_REGISTRIES
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                log_registry_created(core::any::type_name::<T>(), config.initial_capacity);
                let created: Arc<dyn ErasedRegistry> = Arc::new(Registry::<T>::with_config(config));
                created
            });

        entry
            .as_any()
            .downcast_ref::<Registry<T>>()
            .cloned()
            .expect("global registry is keyed by its own element type")
    };

    if config.exit_sweep {
        install_exit_hook();
    }
    registry
}

#[cfg(unix)]
fn install_exit_hook() {
    extern "C" fn on_exit() {
        // The process is exiting; no handle will be dereferenced again
        unsafe { shutdown_all() };
    }

    EXIT_HOOK.get_or_init(|| {
        if unsafe { libc::atexit(on_exit) } != 0 {
            warn!("Failed to register exit sweep; outstanding records will leak at exit");
        } else {
            debug!("Exit sweep registered");
        }
    });
}

#[cfg(not(unix))]
fn install_exit_hook() {
    EXIT_HOOK.get_or_init(|| {
        warn!("Exit sweep unsupported on this platform; call shutdown_all() before exit");
    });
}

/// Release every outstanding record in every global registry
///
/// Runs automatically at process exit unless disabled in [`GcConfig`].
///
/// # Safety
/// Every handle bound through a global registry is left dangling.
#[instrument(level = "debug")]
pub unsafe fn shutdown_all() {
    let registries: Vec<Arc<dyn ErasedRegistry>> = GLOBAL_REGISTRIES
        .iter()
        .map(|entry| Arc::clone(entry.value()))
        .collect();

    info!(registries = registries.len(), "Shutting down global registries");
    for registry in registries {
        registry.shutdown();
    }
}

/// Free every zero-count record in the table
#[instrument(level = "trace", skip_all, fields(element_type = core::any::type_name::<T>()))]
pub(crate) fn sweep<T>(table: &Mutex<RecordTable<T>>) -> bool {
    let (garbage, remaining) = {
        let mut table = table.lock();
        let garbage = table.detach_garbage();
        table.sweeps_run += 1;
        table.records_freed += garbage.len();
        (garbage, table.len())
    };

    let freed = garbage.len();
    GC_STATE.sweeps_run.fetch_add(1, Ordering::Relaxed);
    GC_STATE.records_freed.fetch_add(freed, Ordering::Relaxed);

    for record in garbage {
        // Safety: detached records are unreachable from any live handle
        unsafe { record.free() };
    }

    if freed > 0 {
        log_sweep(freed, remaining);
    }
    freed > 0
}

/// One line of a registry dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpEntry {
    pub address: usize,
    pub refcount: usize,
    /// Debug rendering of the first element; `None` once the count is zero
    pub value: Option<String>,
}

/// Registry contents in registration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dump {
    pub element_type: &'static str,
    pub entries: Vec<DumpEntry>,
}

impl Dump {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry exists for the address
    pub fn contains<T>(&self, address: *const T) -> bool {
        self.entries.iter().any(|entry| entry.address == address as usize)
    }
}

impl core::fmt::Display for Dump {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "registry<{}>:", self.element_type)?;
        writeln!(f, "address refcount value")?;
        if self.entries.is_empty() {
            return writeln!(f, " registry is empty");
        }
        for entry in &self.entries {
            writeln!(
                f,
                "[{:#x}] {} {}",
                entry.address,
                entry.refcount,
                entry.value.as_deref().unwrap_or(PLACEHOLDER)
            )?;
        }
        Ok(())
    }
}

pub(crate) fn dump<T: core::fmt::Debug>(table: &RecordTable<T>) -> Dump {
    let entries = table
        .ordered()
        .into_iter()
        .map(|record| DumpEntry {
            address: record.address().as_ptr() as usize,
            refcount: record.refcount(),
            // Safety: records are removed before their memory is freed
            value: (record.refcount() > 0).then(|| format!("{:?}", unsafe { record.value() })),
        })
        .collect();

    Dump {
        element_type: core::any::type_name::<T>(),
        entries,
    }
}

/// Per-registry counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub records: usize,
    pub sweeps_run: usize,
    pub records_freed: usize,
}

/// Process-wide collector statistics
#[derive(Debug, Clone, Copy)]
pub struct GcStats {
    /// Global registries created so far
    pub registries: usize,
    /// Records held by global registries
    pub live_records: usize,
    /// Sweeps run by any registry
    pub sweeps_run: usize,
    /// Records freed by any registry
    pub records_freed: usize,
}

/// Get collector statistics
pub fn stats() -> GcStats {
    let registries: Vec<Arc<dyn ErasedRegistry>> = GLOBAL_REGISTRIES
        .iter()
        .map(|entry| Arc::clone(entry.value()))
        .collect();

    let stats = GcStats {
        registries: registries.len(),
        live_records: registries.iter().map(|registry| registry.size()).sum(),
        sweeps_run: GC_STATE.sweeps_run.load(Ordering::Relaxed),
        records_freed: GC_STATE.records_freed.load(Ordering::Relaxed),
    };

    debug!(
        registries = stats.registries,
        live_records = stats.live_records,
        sweeps_run = stats.sweeps_run,
        records_freed = stats.records_freed,
        "GC statistics retrieved"
    );

    stats
}

/// Element types that currently have a global registry
pub fn registered_types() -> Vec<&'static str> {
    GLOBAL_REGISTRIES
        .iter()
        .map(|entry| entry.value().element_type())
        .collect()
}
