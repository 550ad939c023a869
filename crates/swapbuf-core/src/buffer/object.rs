//! Owning handle to a managed buffer.

use super::{BufferInfo, BufferLock, BufferManager};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use swapbuf_common::types::BufferId;
use swapbuf_common::utils::error::{Error, PreconditionError, Result};

/// A buffer owned by one value.
///
/// The handle draws a fresh id from its manager and destroys the buffer when
/// dropped. Until [`allocate`](BufferObject::allocate) or
/// [`set_buffer`](BufferObject::set_buffer) is called the handle is empty and
/// nothing is registered.
///
/// A handle only touches a buffer it registered itself: if someone else
/// registers its id first, `allocate` and `set_buffer` fail with
/// [`PreconditionError::AlreadyRegistered`] and dropping the handle leaves
/// that buffer alone.
pub struct BufferObject {
    manager: Arc<BufferManager>,
    id: BufferId,
    owned: AtomicBool,
}

impl BufferObject {
    /// Creates an empty handle.
    #[must_use]
    pub fn new(manager: Arc<BufferManager>) -> Self {
        let id = manager.next_buffer_id();
        Self {
            manager,
            id,
            owned: AtomicBool::new(false),
        }
    }

    /// The id of the underlying buffer.
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The manager tracking the buffer.
    #[must_use]
    pub fn manager(&self) -> &Arc<BufferManager> {
        &self.manager
    }

    /// Replaces the content with `size` zeroed bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the current content is locked, or if the id was
    /// registered by someone else.
    pub fn allocate(&self, size: usize) -> Result<()> {
        self.destroy()?;
        self.manager.allocate(self.id, size)?;
        self.owned.store(true, Ordering::Release);
        Ok(())
    }

    /// Replaces the content with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the current content is locked, or if the id was
    /// registered by someone else.
    pub fn set_buffer(&self, bytes: Vec<u8>) -> Result<()> {
        if self.is_owned() {
            self.manager.set_buffer(self.id, bytes)
        } else {
            self.manager.register(self.id, bytes)?;
            self.owned.store(true, Ordering::Release);
            Ok(())
        }
    }

    fn is_owned(&self) -> bool {
        self.owned.load(Ordering::Acquire)
    }

    fn owned_id(&self) -> Result<BufferId> {
        if self.is_owned() {
            Ok(self.id)
        } else {
            Err(PreconditionError::NotRegistered(self.id).into())
        }
    }

    /// Resizes the content.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is allocated, the buffer is locked, or
    /// dumped content cannot be restored.
    pub fn reallocate(&self, new_size: usize) -> Result<()> {
        self.manager.reallocate(self.owned_id()?, new_size)
    }

    /// Releases the content. Does nothing if nothing is allocated.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is locked.
    pub fn destroy(&self) -> Result<()> {
        if !self.is_owned() {
            return Ok(());
        }
        if self.manager.is_registered(self.id) {
            self.manager.destroy(self.id)?;
        }
        self.owned.store(false, Ordering::Release);
        Ok(())
    }

    /// Pins the content in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is allocated or dumped content cannot be
    /// restored.
    pub fn lock(&self) -> Result<BufferLock<'_>> {
        self.manager.lock(self.owned_id()?)
    }

    /// Logical size, 0 if nothing is allocated.
    #[must_use]
    pub fn size(&self) -> usize {
        self.info().map_or(0, |info| info.size())
    }

    /// Returns true if the size is 0.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of outstanding locks.
    #[must_use]
    pub fn lock_count(&self) -> u32 {
        self.info().map_or(0, |info| info.lock_count())
    }

    /// Snapshot of the buffer's record.
    #[must_use]
    pub fn info(&self) -> Option<BufferInfo> {
        if !self.is_owned() {
            return None;
        }
        self.manager.buffer_info(self.id)
    }

    /// Exchanges content with `other`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handles belong to different managers, or if
    /// either buffer is unregistered or locked.
    pub fn swap(&self, other: &BufferObject) -> Result<()> {
        if !Arc::ptr_eq(&self.manager, &other.manager) {
            return Err(Error::Internal(
                "cannot swap buffers of different managers".to_string(),
            ));
        }
        self.manager.swap_buffers(self.owned_id()?, other.owned_id()?)
    }
}

impl Drop for BufferObject {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            tracing::warn!("Failed to destroy buffer {}: {}", self.id, e);
        }
    }
}

impl std::fmt::Debug for BufferObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferObject")
            .field("id", &self.id)
            .field("size", &self.size())
            .finish()
    }
}
