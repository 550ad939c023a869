//! Free-memory floor.

use super::{DumpPolicy, PolicyContext};
use crate::monitor::MemoryMonitor;
use std::fmt;
use std::sync::Arc;
use swapbuf_common::types::{BufferId, ByteSize};

/// Default floor: 512 MiB of free system memory.
pub const DEFAULT_MIN_FREE_MEM: u64 = 512 * 1024 * 1024;

const PARAMS: &[&str] = &["min_free_mem", "hysteresis_offset"];

/// Dumps buffers when free system memory runs low.
///
/// Before memory is committed the policy asks its [`MemoryMonitor`] how much
/// is free. If the figure minus the pending request falls below
/// `min_free_mem`, unlocked buffers are dumped in least recently accessed
/// order until free memory plus the reclaimed bytes reaches
/// `min_free_mem + hysteresis_offset`. The offset keeps the policy from
/// dumping one buffer per request once it sits near the floor.
///
/// Parameters:
///
/// | Name | Value |
/// | ---- | ----- |
/// | `min_free_mem` | byte size, default 512 MiB |
/// | `hysteresis_offset` | byte size, default 0 |
pub struct ValveDump {
    monitor: Arc<dyn MemoryMonitor>,
    min_free_mem: u64,
    hysteresis_offset: u64,
}

impl ValveDump {
    /// Creates the policy with default thresholds.
    #[must_use]
    pub fn new(monitor: Arc<dyn MemoryMonitor>) -> Self {
        Self {
            monitor,
            min_free_mem: DEFAULT_MIN_FREE_MEM,
            hysteresis_offset: 0,
        }
    }

    /// Returns the free-memory floor in bytes.
    #[must_use]
    pub fn min_free_mem(&self) -> u64 {
        self.min_free_mem
    }

    /// Returns the hysteresis offset in bytes.
    #[must_use]
    pub fn hysteresis_offset(&self) -> u64 {
        self.hysteresis_offset
    }

    fn enforce(&self, ctx: &mut PolicyContext<'_>, pending: u64) {
        let free = self.monitor.free_system_memory().saturating_sub(pending);
        if free >= self.min_free_mem {
            return;
        }

        let target = self.min_free_mem.saturating_add(self.hysteresis_offset);
        let mut reclaimed = 0u64;
        for (id, size) in ctx.dump_candidates() {
            if free.saturating_add(reclaimed) >= target {
                break;
            }
            if ctx.dump(id) {
                reclaimed += size as u64;
            }
        }

        tracing::debug!(
            "Free memory {} below floor {}; reclaimed {}",
            ByteSize::new(free),
            ByteSize::new(self.min_free_mem),
            ByteSize::new(reclaimed)
        );
    }
}

impl fmt::Debug for ValveDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValveDump")
            .field("min_free_mem", &self.min_free_mem)
            .field("hysteresis_offset", &self.hysteresis_offset)
            .finish_non_exhaustive()
    }
}

impl DumpPolicy for ValveDump {
    fn name(&self) -> &'static str {
        "valve"
    }

    fn allocation_request(&mut self, ctx: &mut PolicyContext<'_>, _id: BufferId, size: usize) {
        self.enforce(ctx, size as u64);
    }

    fn set_request(&mut self, ctx: &mut PolicyContext<'_>, _id: BufferId, size: usize) {
        self.enforce(ctx, size as u64);
    }

    fn reallocate_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId, new_size: usize) {
        let old_size = ctx.info(id).map_or(0, |info| info.size());
        let growth = new_size.saturating_sub(old_size) as u64;
        self.enforce(ctx, growth);
    }

    fn lock_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId) {
        let pending = ctx
            .info(id)
            .filter(|info| !info.is_loaded())
            .map_or(0, |info| info.size() as u64);
        self.enforce(ctx, pending);
    }

    fn unlock_request(&mut self, ctx: &mut PolicyContext<'_>, _id: BufferId) {
        self.enforce(ctx, 0);
    }

    fn refresh(&mut self, ctx: &mut PolicyContext<'_>) {
        self.enforce(ctx, 0);
    }

    fn param_names(&self) -> &'static [&'static str] {
        PARAMS
    }

    fn set_param(&mut self, name: &str, value: &str) -> bool {
        let slot = match name {
            "min_free_mem" => &mut self.min_free_mem,
            "hysteresis_offset" => &mut self.hysteresis_offset,
            _ => return false,
        };
        match value.parse::<ByteSize>() {
            Ok(size) => {
                *slot = size.as_u64();
                true
            }
            Err(_) => false,
        }
    }

    fn param(&self, name: &str) -> Option<String> {
        match name {
            "min_free_mem" => Some(self.min_free_mem.to_string()),
            "hysteresis_offset" => Some(self.hysteresis_offset.to_string()),
            _ => None,
        }
    }
}
