//! Pointer layer - reference-counted handles and bounds-checked cursors
//!
//! Architecture:
//! - `handle.rs` - `Handle<T>`, the counted pointer (EMPTY or BOUND)
//! - `cursor.rs` - `Cursor<'a, T>`, traversal over a handle's extent

mod handle;
mod cursor;


pub use handle::Handle;
pub use cursor::Cursor;
