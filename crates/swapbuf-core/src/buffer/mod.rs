//! Managed byte buffers that can be swapped to disk.
//!
//! A [`BufferManager`] tracks buffers by [`BufferId`]. Each buffer is either
//! loaded, with its bytes in memory, or dumped, with its bytes in a file under
//! the manager's dump folder. Locking a buffer pins it in memory and restores
//! it first if needed. The active [`DumpPolicy`](crate::policy::DumpPolicy)
//! decides when unlocked buffers get dumped.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     BufferManager                        │
//! │  ┌────────────────────────┐   ┌───────────────────────┐  │
//! │  │ BufferTable            │   │ DumpPolicy            │  │
//! │  │  id → info, bytes,     │──▶│  never | always |     │  │
//! │  │        dump record     │◀──│  barrier | valve      │  │
//! │  └────────────────────────┘   └───────────────────────┘  │
//! │              │ dump / restore                            │
//! │              ▼                                           │
//! │  DumpStore: <temp>/swapbuf-XXXX/buffer-<id>-<seq>.raw    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Buffer states
//!
//! | State | Bytes | Lock count | Can be dumped |
//! | ----- | ----- | ---------- | ------------- |
//! | loaded | memory | 0 | yes, if non-empty |
//! | locked | memory | > 0 | no |
//! | dumped | file | 0 | already |
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use swapbuf_core::buffer::{BufferManager, BufferObject};
//!
//! let manager = Arc::new(BufferManager::with_defaults()?);
//! let buffer = BufferObject::new(Arc::clone(&manager));
//! buffer.set_buffer(b"hello".to_vec())?;
//!
//! manager.dump_buffer(buffer.id());
//! assert_eq!(&*buffer.lock()?.bytes(), b"hello");
//! # Ok::<(), swapbuf_common::Error>(())
//! ```
//!
//! [`BufferId`]: swapbuf_common::types::BufferId

mod config;
mod events;
mod info;
mod lock;
mod manager;
mod object;
mod table;

pub use config::{
    BufferManagerConfig, ENV_POLICY, ENV_POLICY_PARAMS, ENV_SWEEP_STALE, ENV_TEMP_DIR,
    parse_params,
};
pub use events::{BufferEvent, Listener};
pub use info::{BufferInfo, BufferStats};
pub use lock::BufferLock;
pub use manager::BufferManager;
pub use object::BufferObject;

pub(crate) use table::BufferTable;
