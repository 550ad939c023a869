//! The buffer manager.

use super::events::{BufferEvent, Listener, Listeners};
use super::table::BufferTable;
use super::{BufferInfo, BufferLock, BufferManagerConfig, BufferStats};
use crate::monitor::{MemoryMonitor, SystemMemoryMonitor};
use crate::policy::{DumpPolicy, PolicyContext, PolicyRegistry};
use crate::storage::{DumpStore, TempFolder};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::iter;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use swapbuf_common::types::BufferId;
use swapbuf_common::utils::error::{PreconditionError, Result};

struct State {
    table: BufferTable,
    policy: Box<dyn DumpPolicy>,
}

impl State {
    /// Runs a policy hook, then reports the dumps it performed.
    ///
    /// Returns the buffers the hook dumped.
    fn notify<F>(&mut self, store: &DumpStore, pinned: Option<BufferId>, hook: F) -> Vec<BufferId>
    where
        F: FnOnce(&mut dyn DumpPolicy, &mut PolicyContext<'_>),
    {
        let Self { table, policy } = self;
        let mut ctx = PolicyContext::new(table, store, pinned);
        hook(policy.as_mut(), &mut ctx);
        let dumped = ctx.into_dumped();
        for &id in &dumped {
            if let Some(info) = table.info(id) {
                policy.dump_success(info, id);
            }
        }
        dumped
    }

    fn restore(&mut self, store: &DumpStore, id: BufferId) -> Result<bool> {
        let restored = self.table.restore(store, id)?;
        if restored && let Some(info) = self.table.info(id) {
            self.policy.restore_success(info, id);
        }
        Ok(restored)
    }

    fn remove(&mut self, store: &DumpStore, id: BufferId) -> Vec<BufferId> {
        let dumped = self.notify(store, Some(id), |policy, ctx| policy.destroy_request(ctx, id));
        if let Some(record) = self.table.remove(id).and_then(|entry| entry.dump) {
            store.discard(&record);
        }
        dumped
    }

    fn require_unlocked(&self, id: BufferId) -> Result<()> {
        let info = self
            .table
            .info(id)
            .ok_or(PreconditionError::NotRegistered(id))?;
        if info.is_locked() {
            return Err(PreconditionError::Locked {
                id,
                lock_count: info.lock_count(),
            }
            .into());
        }
        Ok(())
    }
}

fn dumped_events(ids: Vec<BufferId>) -> impl Iterator<Item = BufferEvent> {
    ids.into_iter().map(BufferEvent::Dumped)
}

/// Tracks byte buffers and moves them between memory and disk.
///
/// Every mutating operation takes the manager's write lock for its whole
/// duration, including the policy hook it triggers, so operations on the same
/// manager are linearizable. Queries take the read lock.
///
/// # Example
///
/// ```no_run
/// use swapbuf_core::buffer::{BufferManager, BufferManagerConfig};
///
/// let config = BufferManagerConfig::default()
///     .with_policy("barrier")
///     .with_policy_param("barrier", "256MiB");
/// let manager = BufferManager::new(config)?;
///
/// let id = manager.next_buffer_id();
/// manager.allocate(id, 4096)?;
/// {
///     let lock = manager.lock(id)?;
///     lock.bytes_mut()[0] = 42;
/// }
/// manager.destroy(id)?;
/// # Ok::<(), swapbuf_common::Error>(())
/// ```
pub struct BufferManager {
    state: RwLock<State>,
    store: DumpStore,
    registry: PolicyRegistry,
    listeners: Listeners,
    next_id: AtomicU64,
    config: BufferManagerConfig,
}

impl BufferManager {
    /// Creates a manager consulting the system memory monitor.
    ///
    /// # Errors
    ///
    /// Returns an error if the dump folder cannot be created or the configured
    /// policy is unknown.
    pub fn new(config: BufferManagerConfig) -> Result<Self> {
        Self::with_monitor(config, Arc::new(SystemMemoryMonitor::new()))
    }

    /// Creates a manager with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the dump folder cannot be created.
    pub fn with_defaults() -> Result<Self> {
        Self::new(BufferManagerConfig::default())
    }

    /// Creates a manager whose memory-pressure policies consult `monitor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dump folder cannot be created or the configured
    /// policy is unknown.
    pub fn with_monitor(
        config: BufferManagerConfig,
        monitor: Arc<dyn MemoryMonitor>,
    ) -> Result<Self> {
        if config.sweep_stale {
            match TempFolder::sweep_stale(&config.temp_root, &config.dir_prefix) {
                Ok(removed) if !removed.is_empty() => {
                    tracing::info!("Removed {} stale dump folders", removed.len());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to sweep stale dump folders: {}", e),
            }
        }

        let store = DumpStore::open(&config.temp_root, &config.dir_prefix)?;
        let registry = PolicyRegistry::new(monitor);
        let (policy, _rejected) =
            registry.create_with_params(&config.policy, &config.policy_params)?;

        tracing::info!(
            "Buffer manager started in {} with policy '{}'",
            store.dir().display(),
            policy.name()
        );

        Ok(Self {
            state: RwLock::new(State {
                table: BufferTable::new(),
                policy,
            }),
            store,
            registry,
            listeners: Listeners::new(),
            next_id: AtomicU64::new(1),
            config,
        })
    }

    /// Returns an id this manager has not handed out before and that is not
    /// registered at the time of the call.
    ///
    /// Ids chosen by callers are skipped, but nothing stops a caller from
    /// registering a handed-out id later.
    pub fn next_buffer_id(&self) -> BufferId {
        let state = self.state.read();
        loop {
            let id = BufferId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
            if !state.table.contains(id) {
                return id;
            }
        }
    }

    /// Returns the configuration the manager was built from.
    #[must_use]
    pub fn config(&self) -> &BufferManagerConfig {
        &self.config
    }

    /// Returns the directory holding this manager's dump files.
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Returns the policy registry.
    #[must_use]
    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    // === Notifications ===

    /// Registers `listener` for every [`BufferEvent`]. Returns a handle for
    /// [`unsubscribe`](Self::unsubscribe).
    ///
    /// Listeners run after the operation has released the manager's lock, on
    /// the thread that performed it.
    pub fn subscribe<F>(&self, listener: F) -> u64
    where
        F: Fn(&BufferEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        self.listeners.subscribe(listener)
    }

    /// Removes a listener. Returns false if `handle` is unknown.
    pub fn unsubscribe(&self, handle: u64) -> bool {
        self.listeners.unsubscribe(handle)
    }

    fn publish(&self, events: impl IntoIterator<Item = BufferEvent>) {
        self.listeners.emit(events);
    }

    // === Lifecycle ===

    /// Registers `id` with `size` zeroed bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::AlreadyRegistered`] if `id` is tracked.
    pub fn allocate(&self, id: BufferId, size: usize) -> Result<()> {
        let dumped = {
            let mut state = self.state.write();
            if state.table.contains(id) {
                return Err(PreconditionError::AlreadyRegistered(id).into());
            }
            state.table.insert(id, vec![0; size]);
            state.notify(&self.store, Some(id), |policy, ctx| {
                policy.allocation_request(ctx, id, size);
            })
        };
        tracing::debug!("Allocated buffer {} ({} bytes)", id, size);
        self.publish(iter::once(BufferEvent::Allocated(id)).chain(dumped_events(dumped)));
        Ok(())
    }

    /// Installs `bytes` as the content of `id`, replacing whatever it held.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::Locked`] if the existing buffer is locked.
    pub fn set_buffer(&self, id: BufferId, bytes: Vec<u8>) -> Result<()> {
        self.install(id, bytes, true)
    }

    /// Registers `id` with `bytes`, failing if `id` is already tracked.
    pub(crate) fn register(&self, id: BufferId, bytes: Vec<u8>) -> Result<()> {
        self.install(id, bytes, false)
    }

    fn install(&self, id: BufferId, bytes: Vec<u8>, replace: bool) -> Result<()> {
        let size = bytes.len();
        let dumped = {
            let mut state = self.state.write();
            let mut dumped = Vec::new();
            if state.table.contains(id) {
                if !replace {
                    return Err(PreconditionError::AlreadyRegistered(id).into());
                }
                state.require_unlocked(id)?;
                dumped = state.remove(&self.store, id);
            }
            state.table.insert(id, bytes);
            dumped.extend(state.notify(&self.store, None, |policy, ctx| {
                policy.set_request(ctx, id, size);
            }));
            dumped
        };
        tracing::debug!("Set buffer {} ({} bytes)", id, size);
        self.publish(iter::once(BufferEvent::Set(id)).chain(dumped_events(dumped)));
        Ok(())
    }

    /// Resizes `id` to `new_size`, keeping the common prefix and zero-filling
    /// any growth. A dumped buffer is restored first.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if `id` is unknown or locked, or the
    /// restore error if the dumped content cannot be read back.
    pub fn reallocate(&self, id: BufferId, new_size: usize) -> Result<()> {
        let (restored, dumped) = {
            let mut state = self.state.write();
            state.require_unlocked(id)?;
            let restored = state.restore(&self.store, id)?;
            let dumped = state.notify(&self.store, Some(id), |policy, ctx| {
                policy.reallocate_request(ctx, id, new_size);
            });

            let access = state.table.tick();
            let entry = state
                .table
                .get_mut(id)
                .ok_or(PreconditionError::NotRegistered(id))?;
            entry.data.write().resize(new_size, 0);
            entry.info.set_size(new_size);
            entry.info.touch(access);
            (restored, dumped)
        };
        tracing::debug!("Reallocated buffer {} to {} bytes", id, new_size);
        self.publish(
            restored
                .then_some(BufferEvent::Restored(id))
                .into_iter()
                .chain(dumped_events(dumped))
                .chain(iter::once(BufferEvent::Reallocated(id))),
        );
        Ok(())
    }

    /// Removes `id` and deletes its backing file.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if `id` is unknown or locked.
    pub fn destroy(&self, id: BufferId) -> Result<()> {
        let dumped = {
            let mut state = self.state.write();
            state.require_unlocked(id)?;
            state.remove(&self.store, id)
        };
        tracing::debug!("Destroyed buffer {}", id);
        self.publish(dumped_events(dumped).chain(iter::once(BufferEvent::Destroyed(id))));
        Ok(())
    }

    /// Exchanges the contents of two unlocked buffers.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if either buffer is unknown or locked.
    pub fn swap_buffers(&self, a: BufferId, b: BufferId) -> Result<()> {
        {
            let mut state = self.state.write();
            state.require_unlocked(a)?;
            state.require_unlocked(b)?;
            state.table.swap(a, b);
        }
        self.publish([BufferEvent::Swapped(a, b)]);
        Ok(())
    }

    // === Pinning ===

    /// Pins `id` in memory, restoring it first if it is dumped.
    ///
    /// The returned guard releases the lock when dropped; it is the only way
    /// to release it.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::NotRegistered`] for an unknown id, or the
    /// restore error if the dumped content cannot be read back. The lock
    /// count is unchanged on error.
    pub fn lock(&self, id: BufferId) -> Result<BufferLock<'_>> {
        let mut state = self.state.write();
        if !state.table.contains(id) {
            return Err(PreconditionError::NotRegistered(id).into());
        }
        let dumped = state.notify(&self.store, Some(id), |policy, ctx| policy.lock_request(ctx, id));
        let restored = match state.restore(&self.store, id) {
            Ok(restored) => restored,
            Err(e) => {
                drop(state);
                self.publish(dumped_events(dumped));
                return Err(e);
            }
        };

        let access = state.table.tick();
        let entry = state
            .table
            .get_mut(id)
            .ok_or(PreconditionError::NotRegistered(id))?;
        entry.info.acquire();
        entry.info.touch(access);
        let data = Arc::clone(&entry.data);
        drop(state);

        self.publish(
            dumped_events(dumped)
                .chain(restored.then_some(BufferEvent::Restored(id)))
                .chain(iter::once(BufferEvent::Locked(id))),
        );
        Ok(BufferLock::new(self, id, data))
    }

    /// Releases one lock on `id`. Called by [`BufferLock`] only, so a count
    /// is never released while its guard is alive.
    pub(crate) fn unlock(&self, id: BufferId) -> Result<()> {
        let dumped = {
            let mut state = self.state.write();
            let access = state.table.tick();
            let entry = state
                .table
                .get_mut(id)
                .ok_or(PreconditionError::NotRegistered(id))?;
            if !entry.info.is_locked() {
                return Err(PreconditionError::NotLocked(id).into());
            }
            entry.info.release();
            entry.info.touch(access);
            state.notify(&self.store, None, |policy, ctx| policy.unlock_request(ctx, id))
        };
        self.publish(iter::once(BufferEvent::Unlocked(id)).chain(dumped_events(dumped)));
        Ok(())
    }

    // === Dump and restore ===

    /// Writes `id` to disk and releases its memory.
    ///
    /// Returns false if `id` is unknown, locked, already dumped, or empty, or
    /// if writing fails. A failed write leaves the buffer loaded.
    pub fn dump_buffer(&self, id: BufferId) -> bool {
        let dumped = {
            let mut state = self.state.write();
            let State { table, policy } = &mut *state;
            let dumped = table.dump(&self.store, id);
            if dumped && let Some(info) = table.info(id) {
                policy.dump_success(info, id);
            }
            dumped
        };
        if dumped {
            self.publish([BufferEvent::Dumped(id)]);
        }
        dumped
    }

    /// Reads a dumped buffer back into memory.
    ///
    /// Returns `Ok(false)` if `id` was already loaded.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::NotRegistered`] for an unknown id, or the
    /// storage error if the backing file is missing or corrupt.
    pub fn restore_buffer(&self, id: BufferId) -> Result<bool> {
        let restored = {
            let mut state = self.state.write();
            if !state.table.contains(id) {
                return Err(PreconditionError::NotRegistered(id).into());
            }
            state.restore(&self.store, id)?
        };
        if restored {
            self.publish([BufferEvent::Restored(id)]);
        }
        Ok(restored)
    }

    // === Policy ===

    /// Installs a new policy and lets it evaluate every buffer.
    pub fn set_dump_policy(&self, policy: Box<dyn DumpPolicy>) {
        let dumped = {
            let mut state = self.state.write();
            tracing::info!(
                "Switching dump policy from '{}' to '{}'",
                state.policy.name(),
                policy.name()
            );
            state.policy = policy;
            state.notify(&self.store, None, |policy, ctx| policy.refresh(ctx))
        };
        self.publish(iter::once(BufferEvent::PolicyChanged).chain(dumped_events(dumped)));
    }

    /// Creates the registered policy `name`, applies `params`, and installs
    /// it. Returns the names of rejected parameters.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `name` is unknown; the active policy
    /// is kept.
    pub fn configure_policy(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Vec<String>> {
        let (policy, rejected) = self.registry.create_with_params(name, params)?;
        self.set_dump_policy(policy);
        Ok(rejected)
    }

    /// Sets a parameter on the active policy and re-evaluates every buffer.
    ///
    /// Returns false, leaving the policy unchanged, if the policy rejects the
    /// parameter.
    pub fn set_policy_param(&self, name: &str, value: &str) -> bool {
        let dumped = {
            let mut state = self.state.write();
            if !state.policy.set_param(name, value) {
                tracing::warn!(
                    "Policy '{}' rejected parameter {}={}",
                    state.policy.name(),
                    name,
                    value
                );
                return false;
            }
            state.notify(&self.store, None, |policy, ctx| policy.refresh(ctx))
        };
        self.publish(iter::once(BufferEvent::PolicyChanged).chain(dumped_events(dumped)));
        true
    }

    /// Lets the active policy re-evaluate every buffer.
    pub fn refresh(&self) {
        let dumped = self
            .state
            .write()
            .notify(&self.store, None, |policy, ctx| policy.refresh(ctx));
        self.publish(dumped_events(dumped));
    }

    /// Name of the active policy.
    #[must_use]
    pub fn policy_name(&self) -> &'static str {
        self.state.read().policy.name()
    }

    /// Parameters of the active policy with their current values.
    #[must_use]
    pub fn policy_params(&self) -> Vec<(String, String)> {
        let state = self.state.read();
        state
            .policy
            .param_names()
            .iter()
            .filter_map(|name| {
                state
                    .policy
                    .param(name)
                    .map(|value| ((*name).to_string(), value))
            })
            .collect()
    }

    // === Queries ===

    /// Returns true if `id` is tracked.
    #[must_use]
    pub fn is_registered(&self, id: BufferId) -> bool {
        self.state.read().table.contains(id)
    }

    /// Snapshot of one buffer's record.
    #[must_use]
    pub fn buffer_info(&self, id: BufferId) -> Option<BufferInfo> {
        self.state.read().table.info(id).cloned()
    }

    /// Snapshot of every buffer's record. May be stale by the time it is
    /// read.
    #[must_use]
    pub fn buffer_infos(&self) -> HashMap<BufferId, BufferInfo> {
        self.state
            .read()
            .table
            .infos()
            .map(|(id, info)| (id, info.clone()))
            .collect()
    }

    /// Number of tracked buffers.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.state.read().table.len()
    }

    /// Aggregate figures over every tracked buffer.
    #[must_use]
    pub fn buffer_stats(&self) -> BufferStats {
        let state = self.state.read();
        let mut stats = BufferStats::default();
        for (_, info) in state.table.infos() {
            stats.record(info);
        }
        stats
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let remaining = state.table.len();
        let records = state.table.drain_records();
        for record in &records {
            self.store.discard(record);
        }
        if remaining > 0 {
            tracing::debug!(
                "Buffer manager dropped with {} buffers ({} dumped)",
                remaining,
                records.len()
            );
        }
    }
}

impl fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferManager")
            .field("temp_dir", &self.store.dir())
            .field("policy", &self.policy_name())
            .field("buffers", &self.buffer_count())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Text dump of every tracked buffer, ordered by id.
impl fmt::Display for BufferManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        let mut rows: Vec<_> = state.table.infos().collect();
        rows.sort_by_key(|(id, _)| *id);

        writeln!(f, "policy = {}, buffers = {}", state.policy.name(), rows.len())?;
        writeln!(
            f,
            "{:>10} {:>12} {:>8} {:>4} {:<6} File",
            "Buffer", "Size", "Access", "Lock", "State"
        )?;
        for (id, info) in rows {
            let file = info
                .file_path()
                .map_or_else(|| "-".to_string(), |path| path.display().to_string());
            writeln!(
                f,
                "{:>10} {:>12} {:>8} {:>4} {:<6} {}",
                id.to_string(),
                info.size(),
                info.last_access(),
                info.lock_count(),
                if info.is_loaded() { "loaded" } else { "dumped" },
                file
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::FixedMemoryMonitor;
    use swapbuf_common::utils::error::{Error, StorageError};
    use tempfile::TempDir;

    fn manager_with(policy: &str, params: &[(&str, &str)]) -> (TempDir, BufferManager) {
        let root = tempfile::tempdir().unwrap();
        let mut config = BufferManagerConfig::default()
            .with_temp_root(root.path())
            .with_policy(policy);
        for (k, v) in params {
            config = config.with_policy_param(*k, *v);
        }
        let monitor = Arc::new(FixedMemoryMonitor::new(u64::MAX / 2, u64::MAX));
        let manager = BufferManager::with_monitor(config, monitor).unwrap();
        (root, manager)
    }

    fn manager() -> (TempDir, BufferManager) {
        manager_with("never", &[])
    }

    #[test]
    fn test_allocate() {
        let (_root, manager) = manager();
        let id = manager.next_buffer_id();
        manager.allocate(id, 10).unwrap();

        let info = manager.buffer_info(id).unwrap();
        assert_eq!(info.size(), 10);
        assert!(info.is_loaded());
        assert_eq!(info.lock_count(), 0);
        assert_eq!(*manager.lock(id).unwrap().bytes(), [0; 10]);
    }

    #[test]
    fn test_allocate_twice() {
        let (_root, manager) = manager();
        let id = manager.next_buffer_id();
        manager.allocate(id, 10).unwrap();

        let err = manager.allocate(id, 5).unwrap_err();
        assert!(matches!(
            err,
            Error::Precondition(PreconditionError::AlreadyRegistered(_))
        ));
        assert_eq!(manager.buffer_info(id).unwrap().size(), 10);
    }

    #[test]
    fn test_set_buffer_replaces() {
        let (_root, manager) = manager();
        let id = manager.next_buffer_id();
        manager.set_buffer(id, b"first".to_vec()).unwrap();
        manager.set_buffer(id, b"second!".to_vec()).unwrap();

        assert_eq!(manager.buffer_info(id).unwrap().size(), 7);
        assert_eq!(&*manager.lock(id).unwrap().bytes(), b"second!");
    }

    #[test]
    fn test_dump_restore_roundtrip() {
        let (_root, manager) = manager();
        let id = manager.next_buffer_id();
        manager.set_buffer(id, (0..=255).collect()).unwrap();

        assert!(manager.dump_buffer(id));
        let info = manager.buffer_info(id).unwrap();
        assert!(info.is_dumped());
        assert_eq!(info.size(), 256);
        let path = info.file_path().unwrap().to_path_buf();
        assert!(path.starts_with(manager.temp_dir()));

        assert!(manager.restore_buffer(id).unwrap());
        assert!(!path.exists());
        assert_eq!(manager.lock(id).unwrap().to_vec(), (0..=255).collect::<Vec<u8>>());
    }

    #[test]
    fn test_dump_refusals() {
        let (_root, manager) = manager();
        let empty = manager.next_buffer_id();
        manager.allocate(empty, 0).unwrap();
        assert!(!manager.dump_buffer(empty));

        let locked = manager.next_buffer_id();
        manager.allocate(locked, 8).unwrap();
        let guard = manager.lock(locked).unwrap();
        assert!(!manager.dump_buffer(locked));
        drop(guard);
        assert!(manager.dump_buffer(locked));
        assert!(!manager.dump_buffer(locked));

        assert!(!manager.dump_buffer(BufferId::new(999)));
    }

    #[test]
    fn test_lock_restores() {
        let (_root, manager) = manager();
        let id = manager.next_buffer_id();
        manager.set_buffer(id, b"payload".to_vec()).unwrap();
        manager.dump_buffer(id);

        let lock = manager.lock(id).unwrap();
        assert_eq!(&*lock.bytes(), b"payload");
        let info = manager.buffer_info(id).unwrap();
        assert!(info.is_loaded());
        assert_eq!(info.lock_count(), 1);
    }

    #[test]
    fn test_unlock_without_lock() {
        let (_root, manager) = manager();
        let id = manager.next_buffer_id();
        manager.allocate(id, 1).unwrap();
        assert!(matches!(
            manager.unlock(id).unwrap_err(),
            Error::Precondition(PreconditionError::NotLocked(_))
        ));
    }

    #[test]
    fn test_locked_buffer_refuses_changes() {
        let (_root, manager) = manager();
        let id = manager.next_buffer_id();
        manager.allocate(id, 4).unwrap();
        let _lock = manager.lock(id).unwrap();

        assert!(manager.destroy(id).is_err());
        assert!(manager.reallocate(id, 8).is_err());
        assert!(manager.set_buffer(id, vec![1]).is_err());
        assert_eq!(manager.buffer_info(id).unwrap().size(), 4);
    }

    #[test]
    fn test_reallocate() {
        let (_root, manager) = manager();
        let id = manager.next_buffer_id();
        manager.set_buffer(id, vec![9; 4]).unwrap();

        manager.reallocate(id, 6).unwrap();
        assert_eq!(manager.lock(id).unwrap().to_vec(), [9, 9, 9, 9, 0, 0]);

        manager.reallocate(id, 2).unwrap();
        assert_eq!(manager.lock(id).unwrap().to_vec(), [9, 9]);
    }

    #[test]
    fn test_reallocate_dumped() {
        let (_root, manager) = manager();
        let id = manager.next_buffer_id();
        manager.set_buffer(id, vec![3; 4]).unwrap();
        manager.dump_buffer(id);

        manager.reallocate(id, 5).unwrap();
        let info = manager.buffer_info(id).unwrap();
        assert!(info.is_loaded());
        assert_eq!(info.size(), 5);
        assert_eq!(manager.lock(id).unwrap().to_vec(), [3, 3, 3, 3, 0]);
    }

    #[test]
    fn test_destroy_removes_file() {
        let (_root, manager) = manager();
        let id = manager.next_buffer_id();
        manager.allocate(id, 16).unwrap();
        manager.dump_buffer(id);
        let path = manager.buffer_info(id).unwrap().file_path().unwrap().to_path_buf();

        manager.destroy(id).unwrap();
        assert!(!manager.is_registered(id));
        assert!(!path.exists());
        assert!(manager.destroy(id).is_err());
    }

    #[test]
    fn test_swap() {
        let (_root, manager) = manager();
        let a = manager.next_buffer_id();
        let b = manager.next_buffer_id();
        manager.set_buffer(a, b"aa".to_vec()).unwrap();
        manager.set_buffer(b, b"bbbb".to_vec()).unwrap();
        manager.dump_buffer(b);

        manager.swap_buffers(a, b).unwrap();
        assert!(manager.buffer_info(a).unwrap().is_dumped());
        assert_eq!(&*manager.lock(a).unwrap().bytes(), b"bbbb");
        assert_eq!(&*manager.lock(b).unwrap().bytes(), b"aa");
    }

    #[test]
    fn test_missing_backing_file() {
        let (_root, manager) = manager();
        let id = manager.next_buffer_id();
        manager.allocate(id, 8).unwrap();
        manager.dump_buffer(id);
        let path = manager.buffer_info(id).unwrap().file_path().unwrap().to_path_buf();
        std::fs::remove_file(path).unwrap();

        let err = manager.lock(id).unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::MissingBackingFile(_))
        ));
        let info = manager.buffer_info(id).unwrap();
        assert!(info.is_dumped());
        assert_eq!(info.lock_count(), 0);
    }

    #[test]
    fn test_stats() {
        let (_root, manager) = manager();
        let a = manager.next_buffer_id();
        let b = manager.next_buffer_id();
        manager.allocate(a, 100).unwrap();
        manager.allocate(b, 50).unwrap();
        manager.dump_buffer(b);
        let _lock = manager.lock(a).unwrap();

        let stats = manager.buffer_stats();
        assert_eq!(stats.buffer_count, 2);
        assert_eq!(stats.locked_count, 1);
        assert_eq!(stats.total_managed, 150);
        assert_eq!(stats.total_loaded, 100);
        assert_eq!(stats.total_dumped, 50);
    }

    #[test]
    fn test_unknown_policy_fails_startup() {
        let root = tempfile::tempdir().unwrap();
        let config = BufferManagerConfig::default()
            .with_temp_root(root.path())
            .with_policy("sometimes");
        assert!(matches!(
            BufferManager::new(config).unwrap_err(),
            Error::Configuration(_)
        ));
    }

    #[test]
    fn test_configure_policy() {
        let (_root, manager) = manager();
        let a = manager.next_buffer_id();
        manager.allocate(a, 10).unwrap();

        let mut params = BTreeMap::new();
        params.insert("barrier".to_string(), "1B".to_string());
        let rejected = manager.configure_policy("barrier", &params).unwrap();
        assert!(rejected.is_empty());
        assert_eq!(manager.policy_name(), "barrier");
        assert_eq!(manager.policy_params(), [("barrier".to_string(), "1".to_string())]);
        // Refresh on install enforces the new barrier
        assert!(manager.buffer_info(a).unwrap().is_dumped());

        assert!(manager.configure_policy("sometimes", &params).is_err());
        assert_eq!(manager.policy_name(), "barrier");
    }

    #[test]
    fn test_set_policy_param() {
        let (_root, manager) = manager_with("barrier", &[("barrier", "1KiB")]);
        let a = manager.next_buffer_id();
        manager.allocate(a, 512).unwrap();
        assert!(manager.buffer_info(a).unwrap().is_loaded());

        assert!(!manager.set_policy_param("barrier", "-1B"));
        assert!(!manager.set_policy_param("", "1B"));
        assert!(manager.set_policy_param("barrier", "256B"));
        assert!(manager.buffer_info(a).unwrap().is_dumped());
    }

    #[test]
    fn test_drop_removes_folder() {
        let root = tempfile::tempdir().unwrap();
        let config = BufferManagerConfig::default().with_temp_root(root.path());
        let manager = BufferManager::new(config).unwrap();
        let dir = manager.temp_dir().to_path_buf();
        let id = manager.next_buffer_id();
        manager.allocate(id, 8).unwrap();
        manager.dump_buffer(id);

        drop(manager);
        assert!(!dir.exists());
    }

    #[test]
    fn test_events() {
        let (_root, manager) = manager_with("always", &[]);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = manager.subscribe(move |event| sink.lock().push(*event));

        let id = manager.next_buffer_id();
        manager.set_buffer(id, vec![1; 16]).unwrap();
        assert_eq!(
            std::mem::take(&mut *seen.lock()),
            [BufferEvent::Set(id), BufferEvent::Dumped(id)]
        );

        let lock = manager.lock(id).unwrap();
        assert_eq!(
            std::mem::take(&mut *seen.lock()),
            [BufferEvent::Restored(id), BufferEvent::Locked(id)]
        );
        drop(lock);
        assert_eq!(
            std::mem::take(&mut *seen.lock()),
            [BufferEvent::Unlocked(id), BufferEvent::Dumped(id)]
        );

        manager.destroy(id).unwrap();
        assert_eq!(
            std::mem::take(&mut *seen.lock()),
            [BufferEvent::Destroyed(id)]
        );

        assert!(manager.unsubscribe(handle));
        manager.allocate(id, 4).unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_listener_can_query_manager() {
        let (_root, manager) = manager();
        let manager = Arc::new(manager);
        let sizes = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        let weak = Arc::downgrade(&manager);
        manager.subscribe(move |event| {
            if let (BufferEvent::Allocated(id), Some(manager)) = (event, weak.upgrade()) {
                sink.lock().push(manager.buffer_info(*id).map(|info| info.size()));
            }
        });

        let id = manager.next_buffer_id();
        manager.allocate(id, 12).unwrap();
        assert_eq!(*sizes.lock(), [Some(12)]);
    }

    #[test]
    fn test_guard_outlives_sibling_release() {
        let (_root, manager) = manager_with("always", &[]);
        let id = manager.next_buffer_id();
        manager.allocate(id, 4).unwrap();

        let first = manager.lock(id).unwrap();
        let second = manager.lock(id).unwrap();
        first.bytes_mut()[0] = 9;
        first.unlock().unwrap();

        // The remaining guard still pins the content
        assert!(manager.buffer_info(id).unwrap().is_loaded());
        assert_eq!(second.to_vec(), [9, 0, 0, 0]);
        drop(second);
        assert!(manager.buffer_info(id).unwrap().is_dumped());
    }

    #[test]
    fn test_display() {
        let (_root, manager) = manager();
        let a = manager.next_buffer_id();
        let b = manager.next_buffer_id();
        manager.allocate(a, 10).unwrap();
        manager.allocate(b, 20).unwrap();
        assert!(manager.dump_buffer(b));

        let text = manager.to_string();
        assert!(text.starts_with("policy = never, buffers = 2\n"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains(&a.to_string()) && lines[2].contains("loaded"));
        assert!(lines[3].contains("dumped"));
        let path = manager.buffer_info(b).unwrap().file_path().unwrap().display().to_string();
        assert!(lines[3].ends_with(&path));
    }
}
