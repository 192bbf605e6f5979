//! Registry configuration
//!
//! Environment variables:
//! - `GCPTR_REGISTRY_CAPACITY`: records preallocated per registry
//! - `GCPTR_EXIT_SWEEP`: `0`/`false` disables the process-exit sweep

use crate::logging::warn;

/// Tuning for registries and the exit hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfig {
    /// Records preallocated when a registry is created
    pub initial_capacity: usize,
    /// Sweep every global registry when the process exits
    pub exit_sweep: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_capacity: Self::DEFAULT_CAPACITY,
            exit_sweep: true,
        }
    }
}

impl GcConfig {
    const DEFAULT_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("GCPTR_REGISTRY_CAPACITY") {
            match raw.trim().parse::<usize>() {
                Ok(capacity) => config.initial_capacity = capacity,
                Err(_) => warn!(
                    variable = "GCPTR_REGISTRY_CAPACITY",
                    value = %raw,
                    "Ignoring invalid registry capacity"
                ),
            }
        }

        if let Some(raw) = lookup("GCPTR_EXIT_SWEEP") {
            match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.exit_sweep = true,
                "0" | "false" | "no" | "off" => config.exit_sweep = false,
                _ => warn!(
                    variable = "GCPTR_EXIT_SWEEP",
                    value = %raw,
                    "Ignoring invalid exit sweep flag"
                ),
            }
        }

        config
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_exit_sweep(mut self, enabled: bool) -> Self {
        self.exit_sweep = enabled;
        self
    }
}
