//! # swapbuf-common
//!
//! Foundation layer for Swapbuf: identifiers, byte sizes, and errors.
//!
//! This crate provides the fundamental building blocks used by all other
//! Swapbuf crates. It has no internal dependencies and should be kept minimal.
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions (BufferId, ByteSize)
//! - [`utils`] - Utility functions and helpers (errors)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use types::{BufferId, ByteSize, ByteSizeError};
pub use utils::error::{Error, PreconditionError, Result, StorageError};
