//! Fixed ceiling on loaded bytes.

use super::{DumpPolicy, PolicyContext};
use crate::buffer::BufferInfo;
use swapbuf_common::types::{BufferId, ByteSize};

/// Default ceiling: 512 MiB.
pub const DEFAULT_BARRIER: u64 = 512 * 1024 * 1024;

const PARAMS: &[&str] = &["barrier"];

/// Keeps the bytes held in memory by loaded buffers at or below a barrier.
///
/// The policy tracks loaded and dumped bytes from the events it receives.
/// Whenever the loaded total exceeds the barrier it dumps unlocked buffers,
/// least recently accessed first, until the total is back under the barrier
/// or nothing else can be dumped.
///
/// Parameters:
///
/// | Name | Value |
/// | ---- | ----- |
/// | `barrier` | byte size greater than zero, e.g. `512MiB` |
#[derive(Debug, Clone)]
pub struct BarrierDump {
    barrier: u64,
    loaded_bytes: u64,
    dumped_bytes: u64,
}

impl BarrierDump {
    /// Creates the policy with the default barrier.
    #[must_use]
    pub fn new() -> Self {
        Self::with_barrier(DEFAULT_BARRIER)
    }

    /// Creates the policy with a specific barrier in bytes.
    #[must_use]
    pub fn with_barrier(barrier: u64) -> Self {
        Self {
            barrier,
            loaded_bytes: 0,
            dumped_bytes: 0,
        }
    }

    /// Returns the barrier in bytes.
    #[must_use]
    pub fn barrier(&self) -> u64 {
        self.barrier
    }

    /// Bytes currently accounted as loaded.
    #[must_use]
    pub fn loaded_bytes(&self) -> u64 {
        self.loaded_bytes
    }

    /// Bytes currently accounted as dumped.
    #[must_use]
    pub fn dumped_bytes(&self) -> u64 {
        self.dumped_bytes
    }

    fn enforce(&self, ctx: &mut PolicyContext<'_>) {
        if self.loaded_bytes <= self.barrier {
            return;
        }

        let mut excess = self.loaded_bytes - self.barrier;
        for (id, size) in ctx.dump_candidates() {
            if excess == 0 {
                break;
            }
            if ctx.dump(id) {
                excess = excess.saturating_sub(size as u64);
            }
        }

        if excess > 0 {
            tracing::debug!(
                "Barrier of {} exceeded by {} with nothing left to dump",
                ByteSize::new(self.barrier),
                ByteSize::new(excess)
            );
        }
    }
}

impl Default for BarrierDump {
    fn default() -> Self {
        Self::new()
    }
}

impl DumpPolicy for BarrierDump {
    fn name(&self) -> &'static str {
        "barrier"
    }

    fn allocation_request(&mut self, ctx: &mut PolicyContext<'_>, _id: BufferId, size: usize) {
        self.loaded_bytes += size as u64;
        self.enforce(ctx);
    }

    fn set_request(&mut self, ctx: &mut PolicyContext<'_>, _id: BufferId, size: usize) {
        self.loaded_bytes += size as u64;
        self.enforce(ctx);
    }

    fn reallocate_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId, new_size: usize) {
        let old_size = ctx.info(id).map_or(0, BufferInfo::size) as u64;
        let new_size = new_size as u64;
        if new_size >= old_size {
            self.loaded_bytes += new_size - old_size;
        } else {
            self.loaded_bytes = self.loaded_bytes.saturating_sub(old_size - new_size);
        }
        self.enforce(ctx);
    }

    fn destroy_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId) {
        if let Some(info) = ctx.info(id) {
            let size = info.size() as u64;
            if info.is_loaded() {
                self.loaded_bytes = self.loaded_bytes.saturating_sub(size);
            } else {
                self.dumped_bytes = self.dumped_bytes.saturating_sub(size);
            }
        }
    }

    fn unlock_request(&mut self, ctx: &mut PolicyContext<'_>, _id: BufferId) {
        self.enforce(ctx);
    }

    fn dump_success(&mut self, info: &BufferInfo, _id: BufferId) {
        let size = info.size() as u64;
        self.loaded_bytes = self.loaded_bytes.saturating_sub(size);
        self.dumped_bytes += size;
    }

    fn restore_success(&mut self, info: &BufferInfo, _id: BufferId) {
        let size = info.size() as u64;
        self.dumped_bytes = self.dumped_bytes.saturating_sub(size);
        self.loaded_bytes += size;
    }

    fn refresh(&mut self, ctx: &mut PolicyContext<'_>) {
        let (loaded, dumped) = ctx.infos().fold((0u64, 0u64), |(loaded, dumped), (_, info)| {
            if info.is_loaded() {
                (loaded + info.size() as u64, dumped)
            } else {
                (loaded, dumped + info.size() as u64)
            }
        });
        self.loaded_bytes = loaded;
        self.dumped_bytes = dumped;
        self.enforce(ctx);
    }

    fn param_names(&self) -> &'static [&'static str] {
        PARAMS
    }

    fn set_param(&mut self, name: &str, value: &str) -> bool {
        match name {
            "barrier" => match value.parse::<ByteSize>() {
                Ok(size) if size.as_u64() > 0 => {
                    self.barrier = size.as_u64();
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn param(&self, name: &str) -> Option<String> {
        match name {
            "barrier" => Some(self.barrier.to_string()),
            _ => None,
        }
    }
}
