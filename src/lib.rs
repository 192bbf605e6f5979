//! gcptr - reference-counted pointers over manually allocated memory
//!
//! Handles share allocations through a per-element-type registry of
//! records. Every release decrements the record and runs a synchronous
//! sweep that frees zero-count allocations. At process exit the global
//! registries are forced to zero and swept once.
//!
//! ```
//! use gcptr::{Handle, Registry};
//!
//! let registry = Registry::new();
//! let mut p = Handle::new_in(&registry, 19);
//! assert_eq!(*p.get().unwrap(), 19);
//!
//! p.assign_box(Box::new(21));
//! assert_eq!(*p.get().unwrap(), 21);
//! assert_eq!(registry.size(), 1);
//! ```

pub mod config;
pub mod error;
pub mod gc;
pub mod logging;
pub mod pointer;

// Re-export core types
pub use config::GcConfig;
pub use error::{GcError, Result};
pub use gc::{Dump, DumpEntry, Extent, GcStats, RecordInfo, Registry};
pub use pointer::{Cursor, Handle};

/// Initialize logging and the collector from the environment
pub fn init() {
    logging::init();
    gc::init();
}
