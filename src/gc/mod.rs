//! Garbage collector - per-allocation reference counting with explicit sweep
//!
//! Design:
//! 1. Records: one per live allocation, holding its refcount and extent
//! 2. Registry: per-element-type table of records, shared by handles
//! 3. Collector: synchronous sweep after every release, exit-time teardown
//!
//! No tracing over object graphs; cycles between handles are never reclaimed.

mod record;
mod registry;
mod collector;


pub use record::{Extent, RecordInfo};
pub(crate) use record::distinct_address;
pub use registry::Registry;
pub use collector::{
    config, configure, registered_types, shutdown_all, stats, Dump, DumpEntry, GcStats,
    RegistryStats, PLACEHOLDER,
};

use crate::logging::info;

/// Initialize GC subsystem: load configuration and log it
pub fn init() {
    let config = config();
    info!(
        initial_capacity = config.initial_capacity,
        exit_sweep = config.exit_sweep,
        "GC subsystem initialized"
    );
}
