//! Dump policies.
//!
//! The [`BufferManager`](crate::buffer::BufferManager) records what happens to
//! each buffer; a [`DumpPolicy`] decides what should be written to disk. The
//! manager forwards every lifecycle event to the active policy while holding
//! its write lock, so a policy sees a consistent registry and never races with
//! another event.
//!
//! | Policy | Dumps when |
//! | ------ | ---------- |
//! | [`NeverDump`] | never (default) |
//! | [`AlwaysDump`] | content is set, the last lock is released, or on refresh |
//! | [`BarrierDump`] | loaded managed bytes exceed a fixed barrier |
//! | [`ValveDump`] | free system memory drops below a minimum |
//!
//! Policies pick victims through [`PolicyContext::dump_candidates`], which
//! orders unlocked loaded buffers by least recent access.

mod always;
mod barrier;
mod never;
mod registry;
mod valve;

pub use always::AlwaysDump;
pub use barrier::BarrierDump;
pub use never::NeverDump;
pub use registry::{PolicyDescriptor, PolicyFactory, PolicyRegistry};
pub use valve::ValveDump;

use crate::buffer::{BufferInfo, BufferTable};
use crate::storage::DumpStore;
use swapbuf_common::types::BufferId;

/// Strategy deciding which buffers get dumped.
///
/// Hooks that can trigger dumps receive a [`PolicyContext`]. Dumps performed
/// through the context are reported back through
/// [`dump_success`](DumpPolicy::dump_success) once the hook returns.
///
/// Policies must not panic. Bad configuration is reported through the
/// return value of [`set_param`](DumpPolicy::set_param).
pub trait DumpPolicy: Send + Sync {
    /// Registry name of the policy.
    fn name(&self) -> &'static str;

    /// A buffer was registered with `size` zeroed bytes. The new buffer is
    /// pinned.
    fn allocation_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId, size: usize) {
        let _ = (ctx, id, size);
    }

    /// A buffer's content was installed. The buffer is not pinned.
    fn set_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId, size: usize) {
        let _ = (ctx, id, size);
    }

    /// A loaded buffer is about to be resized. The buffer is pinned and the
    /// context still reports its old size.
    fn reallocate_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId, new_size: usize) {
        let _ = (ctx, id, new_size);
    }

    /// A buffer is about to be removed. The buffer is pinned.
    fn destroy_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId) {
        let _ = (ctx, id);
    }

    /// A buffer is about to be locked (and restored if dumped). The buffer
    /// is pinned.
    fn lock_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId) {
        let _ = (ctx, id);
    }

    /// A buffer's lock count was decremented. The buffer is not pinned.
    fn unlock_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId) {
        let _ = (ctx, id);
    }

    /// A buffer was written to disk and its memory released.
    fn dump_success(&mut self, info: &BufferInfo, id: BufferId) {
        let _ = (info, id);
    }

    /// A buffer was read back into memory.
    fn restore_success(&mut self, info: &BufferInfo, id: BufferId) {
        let _ = (info, id);
    }

    /// Re-evaluates every tracked buffer.
    fn refresh(&mut self, ctx: &mut PolicyContext<'_>) {
        let _ = ctx;
    }

    /// Names of the parameters this policy understands.
    fn param_names(&self) -> &'static [&'static str] {
        &[]
    }

    /// Sets a parameter. Returns false if the name is unknown or the value
    /// is invalid; the previous value is kept in that case.
    fn set_param(&mut self, name: &str, value: &str) -> bool {
        let _ = (name, value);
        false
    }

    /// Returns the current value of a parameter.
    fn param(&self, name: &str) -> Option<String> {
        let _ = name;
        None
    }
}

/// View of the registry handed to policy hooks.
pub struct PolicyContext<'a> {
    table: &'a mut BufferTable,
    store: &'a DumpStore,
    pinned: Option<BufferId>,
    dumped: Vec<BufferId>,
}

impl<'a> PolicyContext<'a> {
    pub(crate) fn new(
        table: &'a mut BufferTable,
        store: &'a DumpStore,
        pinned: Option<BufferId>,
    ) -> Self {
        Self {
            table,
            store,
            pinned,
            dumped: Vec::new(),
        }
    }

    /// The buffer being serviced, which cannot be dumped from this hook.
    #[must_use]
    pub fn pinned(&self) -> Option<BufferId> {
        self.pinned
    }

    /// Returns the record of one buffer.
    #[must_use]
    pub fn info(&self, id: BufferId) -> Option<&BufferInfo> {
        self.table.info(id)
    }

    /// Iterates over every tracked buffer.
    pub fn infos(&self) -> impl Iterator<Item = (BufferId, &BufferInfo)> + '_ {
        self.table.infos()
    }

    /// Buffers that could be dumped right now, least recently accessed
    /// first. Ties go to the lower id.
    ///
    /// Excludes the pinned buffer, locked buffers, dumped buffers, and empty
    /// buffers.
    #[must_use]
    pub fn dump_candidates(&self) -> Vec<(BufferId, usize)> {
        let mut candidates: Vec<_> = self
            .table
            .infos()
            .filter(|(id, info)| Some(*id) != self.pinned && info.is_dumpable())
            .map(|(id, info)| (info.last_access(), id, info.size()))
            .collect();
        candidates.sort_unstable_by_key(|&(access, id, _)| (access, id));
        candidates
            .into_iter()
            .map(|(_, id, size)| (id, size))
            .collect()
    }

    /// Dumps a buffer now. Returns false if the buffer is pinned, cannot be
    /// dumped, or writing failed.
    pub fn dump(&mut self, id: BufferId) -> bool {
        if Some(id) == self.pinned {
            return false;
        }
        let dumped = self.table.dump(self.store, id);
        if dumped {
            self.dumped.push(id);
        }
        dumped
    }

    /// Buffers dumped through this context, in order.
    pub(crate) fn into_dumped(self) -> Vec<BufferId> {
        self.dumped
    }
}
