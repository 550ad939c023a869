//! # swapbuf-core
//!
//! Core layer for Swapbuf: the buffer manager, dump policies, and the files
//! dumped buffers live in.
//!
//! This crate depends only on `swapbuf-common`.
//!
//! ## Modules
//!
//! - [`buffer`] - Buffer manager, buffer records, lock guards, owning handles
//! - [`policy`] - Dump policies and the registry selecting them by name
//! - [`monitor`] - System memory figures for memory-pressure policies
//! - [`storage`] - Dump folder and dump file I/O

#![warn(missing_docs)]

pub mod buffer;
pub mod monitor;
pub mod policy;
pub mod storage;

// Re-export commonly used types
pub use buffer::{
    BufferEvent, BufferInfo, BufferLock, BufferManager, BufferManagerConfig, BufferObject,
    BufferStats,
};
pub use monitor::{FixedMemoryMonitor, MemoryMonitor, SystemMemoryMonitor};
pub use policy::{AlwaysDump, BarrierDump, DumpPolicy, NeverDump, PolicyContext, PolicyRegistry, ValveDump};
