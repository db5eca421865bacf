//! Utility types shared across the crate.
//!
//! - [`ElementType`] - Numeric element types of channel arrays
//! - [`Shape`] - Array shapes
//! - [`Error`] / [`Result`] - Error handling
//! - [`write_atomic`] - Crash-safe file replacement for cache artifacts

mod dtype;
mod error;
mod fs;
mod shape;

pub use dtype::*;
pub use error::*;
pub use fs::*;
pub use shape::*;
