//! Error taxonomy for handle and cursor operations
//!
//! Accessors return these as values. Cleanup paths (drop, reassignment)
//! never propagate them; they are logged instead.

/// Errors raised by handle accessors, cursors and registry bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcError {
    /// Dereferenced an empty handle
    InvalidDereference,
    /// Cursor moved or indexed outside `[lower, upper)`
    OutOfBounds { index: isize, lower: usize, upper: usize },
    /// No record is registered for the address
    RecordNotFound { address: usize },
}

impl core::fmt::Display for GcError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidDereference => write!(
                f,
                "Unable to dereference an empty handle; assign it to an allocation first"
            ),
            Self::OutOfBounds { index, lower, upper } => {
                write!(f, "Cursor offset {} outside [{}, {})", index, lower, upper)
            }
            Self::RecordNotFound { address } => {
                write!(f, "No record for address {:#x}", address)
            }
        }
    }
}

impl std::error::Error for GcError {}

pub type Result<T> = core::result::Result<T, GcError>;
