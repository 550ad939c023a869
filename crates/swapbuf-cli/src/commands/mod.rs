//! CLI command implementations.

use std::path::PathBuf;

use anyhow::Result;
use swapbuf_core::buffer::BufferManagerConfig;

pub mod meminfo;
pub mod policies;
pub mod simulate;
pub mod status;
pub mod sweep;

/// Resolve the temp root: explicit flag, then environment, then system default.
fn temp_root(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(root) => Ok(root.clone()),
        None => Ok(BufferManagerConfig::from_env()?.temp_root),
    }
}
