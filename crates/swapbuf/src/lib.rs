//! # Swapbuf
//!
//! Large byte buffers that can live in memory or on disk.
//!
//! If you're new here, start with [`BufferManager`] - it tracks every buffer
//! and moves unlocked ones to a private temp folder when its [`DumpPolicy`]
//! says so. Hold a [`BufferLock`] while you touch the bytes; the buffer is
//! restored first if it was dumped, and stays in memory until the lock is
//! dropped.
//!
//! ## Dump Policies
//!
//! | Name | Type | Parameters |
//! | ---- | ---- | ---------- |
//! | `never` | [`NeverDump`] | - |
//! | `always` | [`AlwaysDump`] | - |
//! | `barrier` | [`BarrierDump`] | `barrier` |
//! | `valve` | [`ValveDump`] | `min_free_mem`, `hysteresis_offset` |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use swapbuf::{BufferManager, BufferManagerConfig, BufferObject};
//!
//! # let root = tempfile::tempdir()?;
//! let config = BufferManagerConfig::default()
//! #   .with_temp_root(root.path())
//!     .with_policy("barrier")
//!     .with_policy_param("barrier", "64MiB");
//! let manager = Arc::new(BufferManager::new(config)?);
//!
//! // Owned buffer, destroyed when dropped
//! let image = BufferObject::new(Arc::clone(&manager));
//! image.allocate(1024)?;
//!
//! {
//!     let lock = image.lock()?;
//!     lock.bytes_mut()[0] = 0xFF;
//! }
//!
//! // Push it to disk by hand; the next lock brings it back
//! manager.dump_buffer(image.id());
//! assert_eq!(image.lock()?.bytes()[0], 0xFF);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export the buffer manager API
pub use swapbuf_core::buffer::{
    BufferEvent, BufferInfo, BufferLock, BufferManager, BufferManagerConfig, BufferObject,
    BufferStats,
};

// Re-export policies - pick one by name through the config, or build your own
pub use swapbuf_core::policy::{
    AlwaysDump, BarrierDump, DumpPolicy, NeverDump, PolicyContext, PolicyRegistry, ValveDump,
};

pub use swapbuf_core::monitor::{FixedMemoryMonitor, MemoryMonitor, SystemMemoryMonitor};

// Re-export common types - you'll need these for ids, sizes, and errors
pub use swapbuf_common::types::{BufferId, ByteSize};
pub use swapbuf_common::utils::error::{Error, PreconditionError, Result, StorageError};
