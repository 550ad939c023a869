//! Policy that keeps as little as possible in memory.

use super::{DumpPolicy, PolicyContext};
use swapbuf_common::types::BufferId;

/// Dumps a buffer as soon as nobody holds it.
///
/// Content that was just set is dumped immediately, a buffer whose last lock
/// is released is dumped again, and a refresh dumps every unlocked buffer.
/// Buffers are not dumped on allocation: freshly allocated content is about to
/// be written by its owner.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysDump;

impl AlwaysDump {
    /// Creates the policy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DumpPolicy for AlwaysDump {
    fn name(&self) -> &'static str {
        "always"
    }

    fn set_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId, _size: usize) {
        ctx.dump(id);
    }

    fn unlock_request(&mut self, ctx: &mut PolicyContext<'_>, id: BufferId) {
        if ctx.info(id).is_some_and(|info| info.lock_count() == 0) {
            ctx.dump(id);
        }
    }

    fn refresh(&mut self, ctx: &mut PolicyContext<'_>) {
        for (id, _) in ctx.dump_candidates() {
            ctx.dump(id);
        }
    }
}
