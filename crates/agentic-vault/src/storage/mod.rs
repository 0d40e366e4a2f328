//! Storage primitives shared by the fact, connection, and key stores.
//!
//! - [`atomic`]: temp-file-then-rename writes, tolerant reads and removals.

pub mod atomic;

pub use atomic::{read_optional, remove_if_exists, write_atomic};
