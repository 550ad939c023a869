//! Policy that keeps everything in memory.

use super::DumpPolicy;

/// Never dumps anything. Explicit [`dump_buffer`] calls still work.
///
/// [`dump_buffer`]: crate::buffer::BufferManager::dump_buffer
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverDump;

impl NeverDump {
    /// Creates the policy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DumpPolicy for NeverDump {
    fn name(&self) -> &'static str {
        "never"
    }
}
