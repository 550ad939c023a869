//! RAII lock guards.

use super::BufferManager;
use super::table::BufferData;
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use swapbuf_common::types::BufferId;
use swapbuf_common::utils::error::Result;

/// A buffer pinned in memory.
///
/// While the guard lives the buffer is loaded and its bytes can be read and
/// written in place. Dropping the guard releases the lock; use
/// [`unlock`](BufferLock::unlock) to observe the result instead.
///
/// Several guards may exist for the same buffer. Their byte accessors
/// synchronize through a per-buffer read/write lock.
#[must_use = "dropping the guard releases the lock immediately"]
pub struct BufferLock<'a> {
    manager: &'a BufferManager,
    id: BufferId,
    data: BufferData,
    released: bool,
}

impl<'a> BufferLock<'a> {
    pub(crate) fn new(manager: &'a BufferManager, id: BufferId, data: BufferData) -> Self {
        Self {
            manager,
            id,
            data,
            released: false,
        }
    }

    /// The locked buffer.
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Current length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Shared access to the bytes.
    pub fn bytes(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.data.read(), Vec::as_slice)
    }

    /// Exclusive access to the bytes.
    pub fn bytes_mut(&self) -> MappedRwLockWriteGuard<'_, [u8]> {
        RwLockWriteGuard::map(self.data.write(), Vec::as_mut_slice)
    }

    /// Copies the bytes out.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Releases the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager no longer tracks the lock.
    pub fn unlock(mut self) -> Result<()> {
        self.released = true;
        self.manager.unlock(self.id)
    }
}

impl Drop for BufferLock<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.manager.unlock(self.id) {
            tracing::error!("Failed to release lock on buffer {}: {}", self.id, e);
        }
    }
}

impl fmt::Debug for BufferLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferLock")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}
